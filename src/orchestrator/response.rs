use serde::{Deserialize, Serialize};
use std::fmt;

/// Outbound text for the gateway. `Con` keeps the dialogue open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UssdResponse {
    Con(String),
    End(String),
}

impl UssdResponse {
    pub fn con(text: impl Into<String>) -> Self {
        UssdResponse::Con(text.into())
    }

    pub fn end(text: impl Into<String>) -> Self {
        UssdResponse::End(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            UssdResponse::Con(text) | UssdResponse::End(text) => text,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, UssdResponse::End(_))
    }
}

impl fmt::Display for UssdResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UssdResponse::Con(text) => write!(f, "CON {text}"),
            UssdResponse::End(text) => write!(f, "END {text}"),
        }
    }
}
