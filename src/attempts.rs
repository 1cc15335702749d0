//! PIN attempt counting and account lockout.
//!
//! Every flow that authorizes with a PIN goes through [`AttemptTracker::authorize`],
//! which records exactly one success or failure per submitted PIN. A PIN that
//! is not four digits counts as a failure just like a wrong PIN.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::collaborators::{is_valid_pin, Account, AccountFacts, AccountStatus, PinHasher};
use crate::machine::EngineError;
use crate::observability::turn_metrics;

pub const DEFAULT_MAX_PIN_ATTEMPTS: u8 = 3;

/// Result of checking one submitted PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCheck {
    Authorized,
    Rejected { remaining: u8 },
    Blocked,
}

#[derive(Clone)]
pub struct AttemptTracker {
    accounts: Arc<dyn AccountFacts>,
    max_attempts: u8,
}

impl fmt::Debug for AttemptTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptTracker")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl AttemptTracker {
    pub fn new(accounts: Arc<dyn AccountFacts>, max_attempts: u8) -> Self {
        Self {
            accounts,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Count a failed PIN; blocks the account once the threshold is reached.
    pub async fn record_failure(&self, account: &mut Account) -> Result<PinCheck, EngineError> {
        let attempts = account.pin_attempts.saturating_add(1);
        self.accounts
            .record_attempt(&account.phone_number, attempts)
            .await?;
        account.pin_attempts = attempts;

        if attempts >= self.max_attempts {
            self.accounts.block(&account.phone_number).await?;
            account.status = AccountStatus::Blocked;
            turn_metrics().record_lockout();
            warn!(
                phone = %account.phone_number,
                attempts = attempts,
                "Account blocked after repeated PIN failures"
            );
            return Ok(PinCheck::Blocked);
        }

        info!(phone = %account.phone_number, attempts = attempts, "PIN attempt failed");
        Ok(PinCheck::Rejected {
            remaining: self.max_attempts - attempts,
        })
    }

    /// Clear the attempt counter after a correct PIN.
    pub async fn record_success(&self, account: &mut Account) -> Result<(), EngineError> {
        self.accounts.reset(&account.phone_number).await?;
        account.pin_attempts = 0;
        Ok(())
    }

    /// Check `pin` against the account's stored hash, recording the outcome.
    pub async fn authorize(
        &self,
        account: &mut Account,
        pin: &str,
        hasher: &PinHasher,
    ) -> Result<PinCheck, EngineError> {
        if account.is_blocked() {
            return Ok(PinCheck::Blocked);
        }

        let matches = is_valid_pin(pin)
            && account
                .pin_hash
                .as_deref()
                .is_some_and(|stored| hasher.verify(pin, stored));

        if matches {
            self.record_success(account).await?;
            Ok(PinCheck::Authorized)
        } else {
            self.record_failure(account).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryAccounts;

    const PHONE: &str = "+254700000001";

    fn setup(attempts: u8) -> (InMemoryAccounts, AttemptTracker, Account) {
        let accounts = InMemoryAccounts::new();
        let mut account = Account::new(PHONE, "0xabc", "eng");
        account.status = AccountStatus::Active;
        account.pin_hash = Some(PinHasher.hash("1234"));
        account.pin_attempts = attempts;
        accounts.insert(account.clone());
        let tracker = AttemptTracker::new(Arc::new(accounts.clone()), DEFAULT_MAX_PIN_ATTEMPTS);
        (accounts, tracker, account)
    }

    #[tokio::test]
    async fn third_failure_blocks_the_account() {
        let (accounts, tracker, mut account) = setup(0);

        assert_eq!(
            tracker.authorize(&mut account, "0000", &PinHasher).await.unwrap(),
            PinCheck::Rejected { remaining: 2 }
        );
        assert_eq!(
            tracker.authorize(&mut account, "12", &PinHasher).await.unwrap(),
            PinCheck::Rejected { remaining: 1 }
        );
        assert_eq!(
            tracker.authorize(&mut account, "9999", &PinHasher).await.unwrap(),
            PinCheck::Blocked
        );

        let stored = accounts.snapshot(PHONE).unwrap();
        assert_eq!(stored.status, AccountStatus::Blocked);
        assert_eq!(stored.pin_attempts, 3);
    }

    #[tokio::test]
    async fn correct_pin_resets_attempts() {
        let (accounts, tracker, mut account) = setup(2);

        let check = tracker.authorize(&mut account, "1234", &PinHasher).await.unwrap();

        assert_eq!(check, PinCheck::Authorized);
        assert_eq!(account.pin_attempts, 0);
        assert_eq!(accounts.snapshot(PHONE).unwrap().pin_attempts, 0);
    }

    #[tokio::test]
    async fn blocked_accounts_do_not_accumulate_attempts() {
        let (accounts, tracker, mut account) = setup(3);
        account.status = AccountStatus::Blocked;

        let check = tracker.authorize(&mut account, "1234", &PinHasher).await.unwrap();

        assert_eq!(check, PinCheck::Blocked);
        assert_eq!(accounts.snapshot(PHONE).unwrap().pin_attempts, 3);
    }
}
