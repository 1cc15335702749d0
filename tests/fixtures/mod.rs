/// Test harness: an orchestrator wired to in-memory collaborators and journal
#[allow(dead_code)]
pub mod harness {
    use std::sync::Arc;

    use ussd_menu_engine::collaborators::{
        Account, AccountStatus, InMemoryAccounts, InMemoryLedger, PinHasher, RecordingNotifier, Services, Voucher,
    };
    use ussd_menu_engine::orchestrator::{
        BuiltinTranslator, EngineSettings, InboundTurn, TurnOrchestrator, TurnOutcome, UssdResponse,
    };
    use ussd_menu_engine::registry::MachineRegistry;
    use ussd_menu_engine::session::{MemoryJournal, Session, SessionSettings, SessionStore, TieredSessionStore};

    pub const ALICE: &str = "+254700000001";
    pub const BOB: &str = "+254700000002";
    pub const NEWCOMER: &str = "+254700000009";
    /// Bob's number as a caller would type it
    pub const BOB_LOCAL: &str = "0700000002";
    pub const PIN: &str = "1234";
    pub const WRONG_PIN: &str = "9999";
    pub const SERVICE_CODE: &str = "*384#";
    pub const COUNTRY_CODE: &str = "254";

    pub struct Harness {
        pub orchestrator: TurnOrchestrator,
        pub accounts: InMemoryAccounts,
        pub ledger: InMemoryLedger,
        pub notifier: RecordingNotifier,
        pub journal: MemoryJournal,
        pub store: Arc<TieredSessionStore>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_settings(EngineSettings::default())
        }

        pub fn with_settings(engine: EngineSettings) -> Self {
            let accounts = InMemoryAccounts::new();
            let ledger = InMemoryLedger::new();
            let notifier = RecordingNotifier::new();
            let journal = MemoryJournal::new();
            let session_settings = SessionSettings::default();
            let store = Arc::new(TieredSessionStore::new(Arc::new(journal.clone()), &session_settings));

            seed(&accounts, &ledger);

            let orchestrator = TurnOrchestrator::new(
                Arc::new(MachineRegistry::standard().expect("standard registry is valid")),
                store.clone(),
                Services::in_memory(&accounts, &ledger, &notifier, engine.max_pin_attempts),
                Arc::new(BuiltinTranslator::new(&engine.fallback_language).expect("builtin locales load")),
                engine,
                &session_settings,
            );

            Self {
                orchestrator,
                accounts,
                ledger,
                notifier,
                journal,
                store,
            }
        }

        pub fn turn_for(session_id: &str, phone: &str, input: &str) -> InboundTurn {
            InboundTurn::new(session_id, phone, input, SERVICE_CODE, COUNTRY_CODE)
        }

        /// Process a turn that must not fail.
        pub async fn send(&self, session_id: &str, phone: &str, input: &str) -> TurnOutcome {
            self.orchestrator
                .process(&Self::turn_for(session_id, phone, input))
                .await
                .unwrap_or_else(|err| panic!("turn '{input}' failed: {err}"))
        }

        /// Process a turn through the gateway entry point.
        pub async fn respond(&self, session_id: &str, phone: &str, input: &str) -> UssdResponse {
            self.orchestrator
                .handle_turn(&Self::turn_for(session_id, phone, input))
                .await
        }

        /// Feed `inputs` in order, returning the last outcome.
        pub async fn walk(&self, session_id: &str, phone: &str, inputs: &[&str]) -> TurnOutcome {
            let mut last = None;
            for input in inputs {
                last = Some(self.send(session_id, phone, input).await);
            }
            last.expect("walk needs at least one input")
        }

        pub async fn stored(&self, session_id: &str) -> Option<Session> {
            self.store.get(session_id).await.expect("store is readable")
        }

        pub fn account(&self, phone: &str) -> Account {
            self.accounts.snapshot(phone).expect("account exists")
        }

        pub fn set_attempts(&self, phone: &str, attempts: u8) {
            let mut account = self.account(phone);
            account.pin_attempts = attempts;
            self.accounts.insert(account);
        }
    }

    pub fn active_account(phone: &str, address: &str, given: &str) -> Account {
        let mut account = Account::new(phone, address, "eng");
        account.status = AccountStatus::Active;
        account.pin_hash = Some(PinHasher.hash(PIN));
        account.given_names = Some(given.to_string());
        account.active_voucher = Some("SRF".to_string());
        account
    }

    /// Alice and Bob are active SRF holders; Bob lists Alice as a guardian.
    fn seed(accounts: &InMemoryAccounts, ledger: &InMemoryLedger) {
        ledger.add_voucher(Voucher {
            symbol: "SRF".to_string(),
            address: "0xsrf".to_string(),
            name: "Sarafu".to_string(),
        });
        ledger.add_voucher(Voucher {
            symbol: "MUU".to_string(),
            address: "0xmuu".to_string(),
            name: "Muungano".to_string(),
        });

        accounts.insert(active_account(ALICE, "0xalice", "Alice"));
        let mut bob = active_account(BOB, "0xbob", "Bob");
        bob.guardians = vec![ALICE.to_string()];
        accounts.insert(bob);

        for address in ["0xalice", "0xbob"] {
            ledger.credit(address, "SRF", 100.0);
            ledger.credit(address, "MUU", 25.0);
        }
    }
}
