// Collaborator contracts consumed by the engine, plus in-memory fakes

pub mod memory;
pub mod pin;
pub mod traits;
pub mod types;

use std::sync::Arc;

pub use memory::{InMemoryAccounts, InMemoryLedger, RecordingNotifier};
pub use pin::{is_valid_pin, PinHasher};
pub use traits::{AccountFacts, BalanceProvider, Ledger, NotificationService, VoucherDirectory};
pub use types::{Account, AccountStatus, Transaction, Voucher};

use crate::attempts::AttemptTracker;

/// Everything an invoked step may call out to.
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<dyn AccountFacts>,
    pub balances: Arc<dyn BalanceProvider>,
    pub vouchers: Arc<dyn VoucherDirectory>,
    pub ledger: Arc<dyn Ledger>,
    pub notifier: Arc<dyn NotificationService>,
    pub hasher: PinHasher,
    pub attempts: AttemptTracker,
}

impl Services {
    pub fn new(
        accounts: Arc<dyn AccountFacts>,
        balances: Arc<dyn BalanceProvider>,
        vouchers: Arc<dyn VoucherDirectory>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn NotificationService>,
        max_pin_attempts: u8,
    ) -> Self {
        let attempts = AttemptTracker::new(accounts.clone(), max_pin_attempts);
        Self {
            accounts,
            balances,
            vouchers,
            ledger,
            notifier,
            hasher: PinHasher,
            attempts,
        }
    }

    /// Wire every collaborator to the in-memory fakes.
    pub fn in_memory(
        accounts: &InMemoryAccounts,
        ledger: &InMemoryLedger,
        notifier: &RecordingNotifier,
        max_pin_attempts: u8,
    ) -> Self {
        Self::new(
            Arc::new(accounts.clone()),
            Arc::new(ledger.clone()),
            Arc::new(ledger.clone()),
            Arc::new(ledger.clone()),
            Arc::new(notifier.clone()),
            max_pin_attempts,
        )
    }
}
