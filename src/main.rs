use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use ussd_menu_engine::collaborators::{InMemoryAccounts, InMemoryLedger, PinHasher, RecordingNotifier};
use ussd_menu_engine::config::{config, UssdEngineConfig};
use ussd_menu_engine::machine::Tag;
use ussd_menu_engine::observability::turn_metrics;
use ussd_menu_engine::session::{JsonlJournal, SessionJournal, TieredSessionStore};
use ussd_menu_engine::telemetry::{generate_correlation_id, init_telemetry};
use ussd_menu_engine::{
    Account, AccountStatus, BuiltinTranslator, InboundTurn, MachineRegistry, Services, TurnOrchestrator, Voucher,
};

#[derive(Parser)]
#[command(name = "ussd-menu-engine")]
#[command(about = "Session-driven USSD menu engine")]
#[command(long_about = "Runs USSD dialogues as hierarchical menu state machines. Use 'simulate' to \
                       talk to the engine from a terminal against in-memory demo accounts.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive dialogue over stdin, one line per keypress
    Simulate {
        /// Caller's phone number in international form
        #[arg(long, help = "Caller MSISDN, e.g. +254700000001")]
        phone: String,
        /// Session id to use (a fresh one is generated otherwise)
        #[arg(long, help = "Resume or start this session id")]
        session: Option<String>,
        /// USSD service code dialled
        #[arg(long, default_value = "*384#")]
        service_code: String,
    },
    /// List every registered machine with its states and tags
    Machines,
    /// Print the latest durable snapshot of a session
    Session {
        /// Session id to look up
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = UssdEngineConfig::load_env_file();
    let settings = config()?;
    init_telemetry(&settings.observability.log_level, settings.observability.json_logs)?;

    match cli.command {
        Commands::Simulate {
            phone,
            session,
            service_code,
        } => tokio::runtime::Runtime::new()?
            .block_on(async { simulate_command(settings, phone, session, service_code).await }),
        Commands::Machines => machines_command(settings),
        Commands::Session { id } => {
            tokio::runtime::Runtime::new()?.block_on(async { session_command(settings, &id).await })
        }
    }
}

fn machines_command(settings: &UssdEngineConfig) -> Result<()> {
    let registry = MachineRegistry::standard()?;
    let translator = BuiltinTranslator::new(&settings.engine.fallback_language)?;
    let mut languages: Vec<&str> = translator.languages().collect();
    languages.sort_unstable();
    println!("Languages: {}", languages.join(", "));

    for definition in registry.definitions() {
        println!("{} (initial: {})", definition.id, definition.initial);
        for node in definition.nodes() {
            let tags: Vec<String> = node.tags.iter().map(Tag::to_string).collect();
            if tags.is_empty() {
                println!("  {}", node.path);
            } else {
                println!("  {} [{}]", node.path, tags.join(", "));
            }
        }
    }
    Ok(())
}

async fn session_command(settings: &UssdEngineConfig, id: &str) -> Result<()> {
    let journal = build_journal(settings).await?;
    match journal.latest(id).await? {
        Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
        None => println!("No session '{id}' in the journal"),
    }
    Ok(())
}

async fn simulate_command(
    settings: &UssdEngineConfig,
    phone: String,
    session: Option<String>,
    service_code: String,
) -> Result<()> {
    let engine = settings.engine_settings();
    let session_settings = settings.session_settings();

    let accounts = InMemoryAccounts::new();
    let ledger = InMemoryLedger::new();
    let notifier = RecordingNotifier::new();
    seed_demo(&accounts, &ledger);

    let journal = build_journal(settings).await?;
    let store = Arc::new(TieredSessionStore::new(journal, &session_settings));
    let orchestrator = TurnOrchestrator::new(
        Arc::new(MachineRegistry::standard()?),
        store,
        Services::in_memory(&accounts, &ledger, &notifier, engine.max_pin_attempts),
        Arc::new(BuiltinTranslator::new(&engine.fallback_language)?),
        engine.clone(),
        &session_settings,
    );

    let session_id = session.unwrap_or_else(generate_correlation_id);
    println!("📱 Session {session_id} for {phone} on {service_code}");
    println!("   Type a keypress (or a '*'-separated trail) per line, Ctrl-D to hang up.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // The gateway opens every dialogue with an empty input
    let mut input = String::new();
    loop {
        let turn = InboundTurn::from_trail(&session_id, &phone, &input, &service_code, &engine.country_code);
        let response = orchestrator.handle_turn(&turn).await;
        println!("{response}");
        println!();

        if response.is_end() {
            break;
        }
        match lines.next_line().await? {
            Some(line) => input = line,
            None => break,
        }
    }

    for (message, recipients) in notifier.sent() {
        println!("✉️  SMS to {}: {}", recipients.join(", "), message);
    }
    turn_metrics().log_stats();
    Ok(())
}

async fn build_journal(settings: &UssdEngineConfig) -> Result<Arc<dyn SessionJournal>> {
    #[cfg(feature = "database")]
    if let Some(database) = &settings.database {
        let journal = ussd_menu_engine::database::SqliteJournal::connect(
            &database.url,
            database.max_connections,
            database.auto_migrate,
        )
        .await?;
        return Ok(Arc::new(journal));
    }

    Ok(Arc::new(JsonlJournal::new(&settings.journal.path)))
}

/// Demo fixtures: two active accounts holding SRF, one with a guardian.
fn seed_demo(accounts: &InMemoryAccounts, ledger: &InMemoryLedger) {
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

    for (phone, address, given, guardians) in [
        ("+254700000001", "0xalice", "Alice", vec!["+254700000002".to_string()]),
        ("+254700000002", "0xbob", "Bob", Vec::new()),
    ] {
        let mut account = Account::new(phone, address, "eng");
        account.status = AccountStatus::Active;
        account.pin_hash = Some(PinHasher.hash("1234"));
        account.given_names = Some(given.to_string());
        account.active_voucher = Some("SRF".to_string());
        account.guardians = guardians;
        accounts.insert(account);
        ledger.credit(address, "SRF", 100.0);
        ledger.credit(address, "MUU", 25.0);
    }
}
