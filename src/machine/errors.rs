use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::MachineId;
use crate::session::StoreError;

/// Classified, flow-local failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineErrorCode {
    InvalidPin,
    AccountBlocked,
    Unauthorized,
    SelfTransfer,
    AlreadyAdded,
    NotFound,
    InvalidRecipient,
    InsufficientBalance,
    LoadError,
    TransferFailed,
    UpdateFailed,
}

impl fmt::Display for MachineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            MachineErrorCode::InvalidPin => "INVALID_PIN",
            MachineErrorCode::AccountBlocked => "ACCOUNT_BLOCKED",
            MachineErrorCode::Unauthorized => "UNAUTHORIZED",
            MachineErrorCode::SelfTransfer => "SELF_TRANSFER",
            MachineErrorCode::AlreadyAdded => "ALREADY_ADDED",
            MachineErrorCode::NotFound => "NOT_FOUND",
            MachineErrorCode::InvalidRecipient => "INVALID_RECIPIENT",
            MachineErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            MachineErrorCode::LoadError => "LOAD_ERROR",
            MachineErrorCode::TransferFailed => "TRANSFER_FAILED",
            MachineErrorCode::UpdateFailed => "UPDATE_FAILED",
        };
        f.write_str(code)
    }
}

/// Expected failure raised by an invoked step and routed by `onError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {detail}")]
pub struct MachineError {
    pub code: MachineErrorCode,
    pub detail: String,
}

impl MachineError {
    pub fn new(code: MachineErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// Infrastructure or integration failure. Always fatal to the current turn.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error("malformed context: '{key}' {reason}")]
    MalformedContext { key: String, reason: String },

    #[error("unhandled machine error in {machine}.{state}: {error}")]
    UnhandledMachineError {
        machine: MachineId,
        state: String,
        error: MachineError,
    },

    #[error("invoked step '{step}' in {machine}.{state} did not settle within {timeout_ms}ms")]
    StepTimeout {
        machine: MachineId,
        state: String,
        step: String,
        timeout_ms: u64,
    },

    #[error("state '{state}' is not legal for machine {machine}")]
    IllegalState { machine: MachineId, state: String },

    #[error("no onDone transition matched after '{step}' in {machine}.{state}")]
    UnroutedStep {
        machine: MachineId,
        state: String,
        step: String,
    },

    #[error("{machine}.{state} did not reach a stable state within {hops} hops")]
    SettleLimit {
        machine: MachineId,
        state: String,
        hops: usize,
    },

    #[error("machine {0} is not registered")]
    UnknownMachine(MachineId),

    #[error("registry definition error: {0}")]
    Registry(String),

    #[error("collaborator failure: {0}")]
    Collaborator(String),

    #[error("missing translation for {machine}.{state} ({language})")]
    Translation {
        language: String,
        machine: String,
        state: String,
    },

    #[error("could not acquire session lease for {session_id} within {timeout_ms}ms")]
    LeaseTimeout { session_id: String, timeout_ms: u64 },
}

impl EngineError {
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::MalformedContext {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn collaborator(reason: impl fmt::Display) -> Self {
        EngineError::Collaborator(reason.to_string())
    }
}

/// Outcome of an invoked step that did not succeed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    System(#[from] EngineError),
}

impl StepError {
    pub fn machine(code: MachineErrorCode, detail: impl Into<String>) -> Self {
        StepError::Machine(MachineError::new(code, detail))
    }
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        StepError::System(EngineError::Store(err))
    }
}
