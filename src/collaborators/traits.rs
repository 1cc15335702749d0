// Collaborator contracts - implemented elsewhere, injected into the engine

use async_trait::async_trait;

use super::types::{Account, AccountStatus, Transaction, Voucher};
use crate::machine::EngineError;

pub type CollaboratorResult<T> = Result<T, EngineError>;

/// Account fact base keyed by phone number.
#[async_trait]
pub trait AccountFacts: Send + Sync {
    async fn get_by_phone(&self, phone: &str) -> CollaboratorResult<Option<Account>>;

    /// Create a PENDING account for `phone`.
    async fn create(&self, phone: &str, language: &str) -> CollaboratorResult<Account>;

    /// Persist the attempt counter after a failed PIN.
    async fn record_attempt(&self, phone: &str, attempts: u8) -> CollaboratorResult<()>;

    async fn block(&self, phone: &str) -> CollaboratorResult<()>;

    /// Clear the attempt counter after a successful PIN.
    async fn reset(&self, phone: &str) -> CollaboratorResult<()>;

    async fn set_pin(&self, phone: &str, pin_hash: &str) -> CollaboratorResult<()>;

    async fn set_status(&self, phone: &str, status: AccountStatus) -> CollaboratorResult<()>;

    async fn set_language(&self, phone: &str, language: &str) -> CollaboratorResult<()>;

    async fn set_names(&self, phone: &str, given: &str, family: &str) -> CollaboratorResult<()>;

    async fn set_active_voucher(&self, phone: &str, symbol: &str) -> CollaboratorResult<()>;

    async fn add_guardian(&self, phone: &str, guardian: &str) -> CollaboratorResult<()>;

    async fn remove_guardian(&self, phone: &str, guardian: &str) -> CollaboratorResult<()>;
}

/// Token balances on the ledger.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get(&self, address: &str, voucher_address: &str) -> CollaboratorResult<f64>;
}

/// Voucher catalogue and holdings.
#[async_trait]
pub trait VoucherDirectory: Send + Sync {
    async fn by_symbol(&self, symbol: &str) -> CollaboratorResult<Option<Voucher>>;

    async fn held_by(&self, address: &str) -> CollaboratorResult<Vec<Voucher>>;
}

/// Transfers and transaction history.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a transfer, returning the transaction reference.
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        voucher_address: &str,
    ) -> CollaboratorResult<String>;

    async fn statement(&self, address: &str) -> CollaboratorResult<Vec<Transaction>>;
}

/// Outbound SMS.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, message: &str, recipients: &[String]) -> CollaboratorResult<()>;
}
