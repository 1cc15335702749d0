use serde_json::{Map, Value};

use super::errors::EngineError;
use crate::collaborators::{Account, Voucher};

/// Data key holding the detail of the last routed machine error.
pub const ERROR_KEY: &str = "error";

/// Turn-scoped context every guard, action and step works against.
///
/// Rebuilt on each turn from the persisted session data plus freshly loaded
/// account and voucher facts; owned by exactly one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineContext {
    pub ussd_input: String,
    pub phone_number: String,
    pub service_code: String,
    pub country_code: String,
    /// Flow-owned data, persisted with the session
    pub data: Map<String, Value>,
    pub account: Option<Account>,
    pub active_voucher: Option<Voucher>,
    pub error_messages: Vec<String>,
}

impl MachineContext {
    pub fn new(phone_number: impl Into<String>, service_code: impl Into<String>) -> Self {
        Self {
            ussd_input: String::new(),
            phone_number: phone_number.into(),
            service_code: service_code.into(),
            country_code: String::new(),
            data: Map::new(),
            account: None,
            active_voucher: None,
            error_messages: Vec::new(),
        }
    }

    pub fn with_account(mut self, account: Option<Account>) -> Self {
        self.account = account;
        self
    }

    pub fn with_voucher(mut self, voucher: Option<Voucher>) -> Self {
        self.active_voucher = voucher;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn input(&self) -> &str {
        self.ussd_input.trim()
    }

    pub fn account(&self) -> Result<&Account, EngineError> {
        self.account
            .as_ref()
            .ok_or_else(|| EngineError::malformed("account", "is required but not loaded"))
    }

    pub fn account_mut(&mut self) -> Result<&mut Account, EngineError> {
        self.account
            .as_mut()
            .ok_or_else(|| EngineError::malformed("account", "is required but not loaded"))
    }

    pub fn voucher(&self) -> Result<&Voucher, EngineError> {
        self.active_voucher
            .as_ref()
            .ok_or_else(|| EngineError::malformed("activeVoucher", "is required but not loaded"))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&str, EngineError> {
        match self.data.get(key) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(EngineError::malformed(key, "is not a string")),
            None => Err(EngineError::malformed(key, "is missing")),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, EngineError> {
        self.data
            .get(key)
            .ok_or_else(|| EngineError::malformed(key, "is missing"))?
            .as_f64()
            .ok_or_else(|| EngineError::malformed(key, "is not a number"))
    }

    pub fn get_usize(&self, key: &str) -> Result<usize, EngineError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| EngineError::malformed(key, "is missing"))?
            .as_u64()
            .ok_or_else(|| EngineError::malformed(key, "is not a count"))?;
        usize::try_from(value).map_err(|_| EngineError::malformed(key, "is out of range"))
    }

    pub fn get_strings(&self, key: &str) -> Result<Vec<String>, EngineError> {
        let values = self
            .data
            .get(key)
            .ok_or_else(|| EngineError::malformed(key, "is missing"))?
            .as_array()
            .ok_or_else(|| EngineError::malformed(key, "is not a list"))?;
        values
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| EngineError::malformed(key, "holds a non-string entry"))
            })
            .collect()
    }

    /// Language for rendering: the account's, then one chosen mid-flow.
    pub fn language(&self) -> Option<&str> {
        self.account
            .as_ref()
            .map(|account| account.language.as_str())
            .or_else(|| self.data.get("language").and_then(Value::as_str))
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.error_messages.push(message.into());
    }

    /// Keep a routed error's detail in flow data so a later re-render of the
    /// error state shows the same text.
    pub fn record_error(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        self.set(ERROR_KEY, detail.clone());
        self.push_error(detail);
    }

    pub fn clear_error(&mut self) {
        self.remove(ERROR_KEY);
    }
}
