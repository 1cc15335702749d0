// Phone number normalization for numbers typed into menus

const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// Normalize a typed phone number to `+<country><subscriber>` form.
///
/// Accepts `+254...`, `00254...`, `254...` and local `07...` forms; the local
/// form needs `country_code` (digits, optional leading `+`). Returns `None`
/// for anything that is not a plausible number.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let country = country_code.trim().trim_start_matches('+');

    let international = if let Some(rest) = compact.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix('0') {
        if country.is_empty() {
            return None;
        }
        format!("{country}{rest}")
    } else if !country.is_empty() && compact.starts_with(country) {
        compact
    } else {
        return None;
    };

    let plausible = (MIN_DIGITS..=MAX_DIGITS).contains(&international.len())
        && international.chars().all(|c| c.is_ascii_digit());
    plausible.then(|| format!("+{international}"))
}
