// Core identifiers for menu machines, events and state tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every conversational flow the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MachineId {
    Registration,
    Auth,
    Main,
    Transfer,
    Voucher,
    Settings,
    Profile,
    Language,
    Balances,
    Statement,
    PinManagement,
    SocialRecovery,
}

impl MachineId {
    pub const ALL: [MachineId; 12] = [
        MachineId::Registration,
        MachineId::Auth,
        MachineId::Main,
        MachineId::Transfer,
        MachineId::Voucher,
        MachineId::Settings,
        MachineId::Profile,
        MachineId::Language,
        MachineId::Balances,
        MachineId::Statement,
        MachineId::PinManagement,
        MachineId::SocialRecovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineId::Registration => "registration",
            MachineId::Auth => "auth",
            MachineId::Main => "main",
            MachineId::Transfer => "transfer",
            MachineId::Voucher => "voucher",
            MachineId::Settings => "settings",
            MachineId::Profile => "profile",
            MachineId::Language => "language",
            MachineId::Balances => "balances",
            MachineId::Statement => "statement",
            MachineId::PinManagement => "pinManagement",
            MachineId::SocialRecovery => "socialRecovery",
        }
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MachineId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown machine '{s}'"))
    }
}

/// Event types a state can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Transit,
    Retry,
    Back,
}

/// One user keypress applied to a machine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub input: String,
}

impl Event {
    pub fn transit(input: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Transit,
            input: input.into(),
        }
    }

    pub fn retry(input: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Retry,
            input: input.into(),
        }
    }

    pub fn back(input: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Back,
            input: input.into(),
        }
    }

    /// Classify raw input for a state carrying `tags`.
    ///
    /// `"0"` goes back, `"1"` on an error state retries, everything else is a
    /// plain transit. The interpreter falls back to `Transit` when the
    /// classified kind has no matching candidate.
    pub fn classify(input: &str, tags: &[Tag]) -> Self {
        if input == "0" {
            Event::back(input)
        } else if input == "1" && tags.contains(&Tag::Error) {
            Event::retry(input)
        } else {
            Event::transit(input)
        }
    }
}

/// Labels the orchestrator uses to decide whether a turn has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tag {
    Invoked,
    Resolved,
    Error,
    Final,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tag::Invoked => "invoked",
            Tag::Resolved => "resolved",
            Tag::Error => "error",
            Tag::Final => "final",
        };
        f.write_str(label)
    }
}

/// Last segment of a dotted state path.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Parent path of a dotted state path, if any.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('.').map(|(parent, _)| parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_ids_round_trip_through_their_names() {
        for id in MachineId::ALL {
            assert_eq!(id.as_str().parse::<MachineId>().unwrap(), id);
        }
        assert!("nope".parse::<MachineId>().is_err());
    }

    #[test]
    fn classify_maps_back_and_retry() {
        assert_eq!(Event::classify("0", &[]).kind, EventKind::Back);
        assert_eq!(Event::classify("1", &[Tag::Error]).kind, EventKind::Retry);
        assert_eq!(Event::classify("1", &[]).kind, EventKind::Transit);
        assert_eq!(Event::classify("00", &[Tag::Error]).kind, EventKind::Transit);
    }

    #[test]
    fn path_helpers() {
        assert_eq!(leaf_name("confirmingTransfer.retryingPin"), "retryingPin");
        assert_eq!(leaf_name("enteringPin"), "enteringPin");
        assert_eq!(parent_path("a.b.c"), Some("a.b"));
        assert_eq!(parent_path("a"), None);
    }
}
