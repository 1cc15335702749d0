// USSD Menu Engine Library - session-driven menu state machines
// This exposes the core components for testing and integration

pub mod attempts;
pub mod collaborators;
pub mod config;
pub mod database;
pub mod flows;
pub mod machine;
pub mod observability;
pub mod orchestrator;
pub mod pagination;
pub mod phone;
pub mod registry;
pub mod session;
pub mod telemetry;

// Re-export key types for easy access
pub use attempts::{AttemptTracker, PinCheck};
pub use collaborators::{Account, AccountStatus, Services, Voucher};
pub use config::{config, init_config, UssdEngineConfig};
pub use machine::{EngineError, Interpreter, MachineError, MachineErrorCode, MachineId};
pub use observability::{turn_metrics, OperationTimer, TurnMetrics};
pub use orchestrator::{
    BuiltinTranslator, EngineSettings, InboundTurn, Translator, TurnOrchestrator, TurnOutcome, UssdResponse,
};
pub use pagination::{paginate, Page};
pub use registry::{MachineRegistry, Resolution};
pub use session::{Session, SessionSettings, SessionStore, StoreError, TieredSessionStore};
pub use telemetry::{create_turn_span, generate_correlation_id, init_telemetry};

#[cfg(feature = "database")]
pub use database::SqliteJournal;
