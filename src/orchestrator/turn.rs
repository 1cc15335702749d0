use serde::{Deserialize, Serialize};

/// Separator between keypresses in a gateway trail such as `1*0712345678*50`.
pub const TRAIL_SEPARATOR: char = '*';

/// One inbound request, already reduced to the caller's latest keypress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundTurn {
    pub session_id: String,
    pub phone_number: String,
    pub input: String,
    pub service_code: String,
    pub country_code: String,
}

impl InboundTurn {
    pub fn new(
        session_id: impl Into<String>,
        phone_number: impl Into<String>,
        input: impl Into<String>,
        service_code: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            phone_number: phone_number.into(),
            input: input.into().trim().to_string(),
            service_code: service_code.into(),
            country_code: country_code.into(),
        }
    }

    /// Build a turn from the full keypress trail, keeping only its last token.
    pub fn from_trail(
        session_id: impl Into<String>,
        phone_number: impl Into<String>,
        trail: &str,
        service_code: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self::new(session_id, phone_number, last_token(trail), service_code, country_code)
    }
}

/// Last `*`-separated token of `trail`; empty for an empty trail.
pub fn last_token(trail: &str) -> &str {
    trail
        .trim()
        .rsplit(TRAIL_SEPARATOR)
        .next()
        .unwrap_or_default()
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trails_reduce_to_their_last_keypress() {
        assert_eq!(last_token("1*0712345678*50"), "50");
        assert_eq!(last_token("3"), "3");
        assert_eq!(last_token(""), "");
        assert_eq!(last_token("1*"), "");
    }

    #[test]
    fn from_trail_trims_input() {
        let turn = InboundTurn::from_trail("S1", "+254700000001", "1* 2 ", "*384#", "254");
        assert_eq!(turn.input, "2");
        assert_eq!(turn.session_id, "S1");
        assert_eq!(turn.country_code, "254");
    }
}
