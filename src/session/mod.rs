// Session layer - versioned session records, cache + journal storage, leases

pub mod errors;
pub mod journal;
pub mod lease;
pub mod store;
pub mod types;

pub use errors::StoreError;
pub use journal::{JsonlJournal, MemoryJournal, SessionJournal};
pub use lease::{SessionLease, SessionLeases};
pub use store::{SessionSettings, SessionStore, TieredSessionStore, DEFAULT_CACHE_CAPACITY};
pub use types::{Session, SessionHistory, SessionUpdate, DEFAULT_TTL_SECONDS};
