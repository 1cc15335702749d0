// In-memory collaborators used by the simulator and the test harness

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use super::traits::*;
use super::types::*;
use crate::machine::EngineError;

fn lock<T>(mutex: &Mutex<T>) -> CollaboratorResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| EngineError::collaborator("in-memory collaborator lock poisoned"))
}

/// Account store backed by a shared map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccounts {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(account.phone_number.clone(), account);
        }
    }

    /// Snapshot of an account, for assertions.
    pub fn snapshot(&self, phone: &str) -> Option<Account> {
        self.accounts.lock().ok()?.get(phone).cloned()
    }

    fn modify<F>(&self, phone: &str, change: F) -> CollaboratorResult<()>
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = lock(&self.accounts)?;
        let account = accounts
            .get_mut(phone)
            .ok_or_else(|| EngineError::collaborator(format!("no account for {phone}")))?;
        change(account);
        Ok(())
    }
}

#[async_trait]
impl AccountFacts for InMemoryAccounts {
    async fn get_by_phone(&self, phone: &str) -> CollaboratorResult<Option<Account>> {
        Ok(lock(&self.accounts)?.get(phone).cloned())
    }

    async fn create(&self, phone: &str, language: &str) -> CollaboratorResult<Account> {
        let address = format!("0x{}", hex::encode(rand::random::<[u8; 20]>()));
        let account = Account::new(phone, address, language);
        lock(&self.accounts)?.insert(phone.to_string(), account.clone());
        info!(phone = %phone, "Created pending account");
        Ok(account)
    }

    async fn record_attempt(&self, phone: &str, attempts: u8) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.pin_attempts = attempts)
    }

    async fn block(&self, phone: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.status = AccountStatus::Blocked)
    }

    async fn reset(&self, phone: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.pin_attempts = 0)
    }

    async fn set_pin(&self, phone: &str, pin_hash: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.pin_hash = Some(pin_hash.to_string()))
    }

    async fn set_status(&self, phone: &str, status: AccountStatus) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.status = status)
    }

    async fn set_language(&self, phone: &str, language: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.language = language.to_string())
    }

    async fn set_names(&self, phone: &str, given: &str, family: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| {
            account.given_names = Some(given.to_string());
            account.family_name = Some(family.to_string());
        })
    }

    async fn set_active_voucher(&self, phone: &str, symbol: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.active_voucher = Some(symbol.to_string()))
    }

    async fn add_guardian(&self, phone: &str, guardian: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.guardians.push(guardian.to_string()))
    }

    async fn remove_guardian(&self, phone: &str, guardian: &str) -> CollaboratorResult<()> {
        self.modify(phone, |account| account.guardians.retain(|g| g != guardian))
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    vouchers: Vec<Voucher>,
    holdings: HashMap<String, Vec<String>>,
    balances: HashMap<(String, String), f64>,
    statements: HashMap<String, Vec<Transaction>>,
    fail_transfers: bool,
    latency: Option<Duration>,
}

/// Ledger, voucher directory and balance provider in one shared fake.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_voucher(&self, voucher: Voucher) {
        if let Ok(mut state) = self.state.lock() {
            state.vouchers.push(voucher);
        }
    }

    /// Give `address` a holding of `symbol` with `balance`.
    pub fn credit(&self, address: &str, symbol: &str, balance: f64) {
        if let Ok(mut state) = self.state.lock() {
            let Some(voucher) = state.vouchers.iter().find(|v| v.symbol == symbol).cloned() else {
                return;
            };
            let held = state.holdings.entry(address.to_string()).or_default();
            if !held.contains(&voucher.symbol) {
                held.push(voucher.symbol.clone());
            }
            state
                .balances
                .insert((address.to_string(), voucher.address), balance);
        }
    }

    pub fn balance_of(&self, address: &str, voucher_address: &str) -> f64 {
        self.state
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .balances
                    .get(&(address.to_string(), voucher_address.to_string()))
                    .copied()
            })
            .unwrap_or(0.0)
    }

    pub fn fail_transfers(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_transfers = fail;
        }
    }

    /// Delay every ledger call, to exercise settle timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.latency = latency;
        }
    }

    async fn simulate_latency(&self) -> CollaboratorResult<()> {
        let latency = lock(&self.state)?.latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceProvider for InMemoryLedger {
    async fn get(&self, address: &str, voucher_address: &str) -> CollaboratorResult<f64> {
        self.simulate_latency().await?;
        Ok(self.balance_of(address, voucher_address))
    }
}

#[async_trait]
impl VoucherDirectory for InMemoryLedger {
    async fn by_symbol(&self, symbol: &str) -> CollaboratorResult<Option<Voucher>> {
        Ok(lock(&self.state)?
            .vouchers
            .iter()
            .find(|v| v.symbol == symbol)
            .cloned())
    }

    async fn held_by(&self, address: &str) -> CollaboratorResult<Vec<Voucher>> {
        self.simulate_latency().await?;
        let state = lock(&self.state)?;
        let symbols = state.holdings.get(address).cloned().unwrap_or_default();
        Ok(state
            .vouchers
            .iter()
            .filter(|v| symbols.contains(&v.symbol))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        voucher_address: &str,
    ) -> CollaboratorResult<String> {
        self.simulate_latency().await?;
        let mut state = lock(&self.state)?;
        if state.fail_transfers {
            return Err(EngineError::collaborator("ledger rejected transfer"));
        }
        let symbol = state
            .vouchers
            .iter()
            .find(|v| v.address == voucher_address)
            .map(|v| v.symbol.clone())
            .unwrap_or_default();

        let from_key = (from.to_string(), voucher_address.to_string());
        let to_key = (to.to_string(), voucher_address.to_string());
        *state.balances.entry(from_key).or_insert(0.0) -= amount;
        *state.balances.entry(to_key).or_insert(0.0) += amount;

        let now = Utc::now();
        state.statements.entry(from.to_string()).or_default().push(Transaction {
            counterparty: to.to_string(),
            amount: -amount,
            symbol: symbol.clone(),
            timestamp: now,
        });
        state.statements.entry(to.to_string()).or_default().push(Transaction {
            counterparty: from.to_string(),
            amount,
            symbol,
            timestamp: now,
        });

        let reference = format!("0x{}", hex::encode(rand::random::<[u8; 32]>()));
        debug!(reference = %reference, "Recorded in-memory transfer");
        Ok(reference)
    }

    async fn statement(&self, address: &str) -> CollaboratorResult<Vec<Transaction>> {
        self.simulate_latency().await?;
        let state = lock(&self.state)?;
        let mut history = state.statements.get(address).cloned().unwrap_or_default();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }
}

/// Notification sink that keeps every message it was asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Vec<String>)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send(&self, message: &str, recipients: &[String]) -> CollaboratorResult<()> {
        info!(recipients = ?recipients, "SMS: {}", message);
        lock(&self.sent)?.push((message.to_string(), recipients.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sarafu() -> Voucher {
        Voucher {
            symbol: "SRF".to_string(),
            address: "0xsrf".to_string(),
            name: "Sarafu".to_string(),
        }
    }

    #[tokio::test]
    async fn transfer_moves_balance_and_records_statements() {
        let ledger = InMemoryLedger::new();
        ledger.add_voucher(sarafu());
        ledger.credit("0xa", "SRF", 100.0);

        ledger.transfer("0xa", "0xb", 40.0, "0xsrf").await.unwrap();

        assert_eq!(ledger.balance_of("0xa", "0xsrf"), 60.0);
        assert_eq!(ledger.balance_of("0xb", "0xsrf"), 40.0);
        let statement = ledger.statement("0xb").await.unwrap();
        assert_eq!(statement.len(), 1);
        assert!(statement[0].summary().starts_with("Received 40.00 SRF 0xa"));
    }

    #[tokio::test]
    async fn failing_transfers_surface_as_collaborator_errors() {
        let ledger = InMemoryLedger::new();
        ledger.add_voucher(sarafu());
        ledger.fail_transfers(true);

        let result = ledger.transfer("0xa", "0xb", 1.0, "0xsrf").await;
        assert!(matches!(result, Err(EngineError::Collaborator(_))));
    }

    #[tokio::test]
    async fn accounts_are_created_pending() {
        let accounts = InMemoryAccounts::new();
        let account = accounts.create("+254700000001", "eng").await.unwrap();
        assert_eq!(account.status, AccountStatus::Pending);
        assert!(account.address.starts_with("0x"));
        assert_eq!(
            accounts.get_by_phone("+254700000001").await.unwrap(),
            Some(account)
        );
    }
}
