// Facts owned by external collaborators and consumed read-mostly by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// Registered, no PIN chosen yet
    Pending,
    /// Fully usable account
    Active,
    /// Locked after too many PIN failures
    Blocked,
    /// Guardians approved a reset; user must choose a new PIN
    ResettingPin,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            AccountStatus::Pending => "PENDING",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Blocked => "BLOCKED",
            AccountStatus::ResettingPin => "RESETTING_PIN",
        };
        f.write_str(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub phone_number: String,
    pub status: AccountStatus,
    pub pin_hash: Option<String>,
    pub pin_attempts: u8,
    pub language: String,
    pub guardians: Vec<String>,
    /// Wallet address on the ledger
    pub address: String,
    pub given_names: Option<String>,
    pub family_name: Option<String>,
    /// Symbol of the voucher used for transfers and balances
    pub active_voucher: Option<String>,
}

impl Account {
    pub fn new(phone_number: impl Into<String>, address: impl Into<String>, language: &str) -> Self {
        Self {
            phone_number: phone_number.into(),
            status: AccountStatus::Pending,
            pin_hash: None,
            pin_attempts: 0,
            language: language.to_string(),
            guardians: Vec::new(),
            address: address.into(),
            given_names: None,
            family_name: None,
            active_voucher: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == AccountStatus::Blocked
    }

    pub fn display_name(&self) -> String {
        match (&self.given_names, &self.family_name) {
            (Some(given), Some(family)) => format!("{given} {family}"),
            (Some(given), None) => given.clone(),
            _ => self.phone_number.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub symbol: String,
    pub address: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub counterparty: String,
    /// Positive for credits, negative for debits
    pub amount: f64,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// One display line of a statement page.
    pub fn summary(&self) -> String {
        let direction = if self.amount < 0.0 { "Sent" } else { "Received" };
        format!(
            "{} {:.2} {} {} {}",
            direction,
            self.amount.abs(),
            self.symbol,
            self.counterparty,
            self.timestamp.format("%Y-%m-%d")
        )
    }
}
