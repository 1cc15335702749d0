//! Three-page list display shared by every flow that presents a list.
//!
//! Pages hold at most [`PAGE_SIZE`] items, there are always exactly
//! [`PAGE_COUNT`] pages, and anything past the ninth item is not shown.
//! Paging codes (`11` next, `22` back, `00` exit) belong to the flows.

pub const PAGE_SIZE: usize = 3;
pub const PAGE_COUNT: usize = 3;

/// Separator used when a page is joined for display.
pub const LINE_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page<T> {
    Items(Vec<T>),
    Placeholder(T),
}

impl<T: AsRef<str>> Page<T> {
    /// Render the page as display lines.
    pub fn join(&self) -> String {
        match self {
            Page::Items(items) => items
                .iter()
                .map(|item| item.as_ref())
                .collect::<Vec<_>>()
                .join(LINE_SEPARATOR),
            Page::Placeholder(placeholder) => placeholder.as_ref().to_string(),
        }
    }
}

/// Split `items` into exactly three pages, using `placeholder` for empty ones.
pub fn paginate<T: Clone>(items: &[T], placeholder: T) -> [Page<T>; PAGE_COUNT] {
    std::array::from_fn(|index| {
        let start = index * PAGE_SIZE;
        if start >= items.len() {
            return Page::Placeholder(placeholder.clone());
        }
        let end = (start + PAGE_SIZE).min(items.len());
        Page::Items(items[start..end].to_vec())
    })
}

/// Paginate and join in one step; this is what flows store in session data.
pub fn paginate_for_display<T: AsRef<str> + Clone>(items: &[T], placeholder: T) -> [String; PAGE_COUNT] {
    let pages = paginate(items, placeholder);
    std::array::from_fn(|index| pages[index].join())
}

/// Prefix each item with its 1-based option number.
pub fn numbered<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}", index + 1, item.as_ref()))
        .collect()
}

/// Number of items that can actually be selected from the three pages.
pub fn selectable_count(total: usize) -> usize {
    total.min(PAGE_SIZE * PAGE_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_three_placeholders() {
        let pages = paginate::<&str>(&[], "-");
        assert_eq!(
            pages,
            [Page::Placeholder("-"), Page::Placeholder("-"), Page::Placeholder("-")]
        );
    }

    #[test]
    fn four_items_fill_one_page_and_spill_one() {
        let pages = paginate(&["a", "b", "c", "d"], "-");
        assert_eq!(pages[0], Page::Items(vec!["a", "b", "c"]));
        assert_eq!(pages[1], Page::Items(vec!["d"]));
        assert_eq!(pages[2], Page::Placeholder("-"));
    }

    #[test]
    fn display_pages_are_joined_lines() {
        let items = numbered(["SRF", "MUU", "KIB", "TRE"]);
        let pages = paginate_for_display(&items, "-".to_string());
        assert_eq!(pages[0], "1. SRF\n2. MUU\n3. KIB");
        assert_eq!(pages[1], "4. TRE");
        assert_eq!(pages[2], "-");
    }

    #[test]
    fn items_past_the_ninth_are_dropped() {
        let items: Vec<String> = (1..=12).map(|n| n.to_string()).collect();
        let pages = paginate(&items, String::new());
        assert_eq!(pages[2], Page::Items(vec!["7".into(), "8".into(), "9".into()]));
        assert_eq!(selectable_count(items.len()), 9);
    }
}
