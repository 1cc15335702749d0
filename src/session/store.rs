//! Versioned, TTL-bound session storage.
//!
//! [`TieredSessionStore`] keeps sessions in a moka cache (the read path used
//! for same-turn resumption) and appends every write to a durable
//! [`SessionJournal`]. A write only succeeds once both paths have it; if the
//! journal fails the cache is restored to its pre-turn value.

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use super::errors::StoreError;
use super::journal::SessionJournal;
use super::types::{Session, SessionUpdate, DEFAULT_TTL_SECONDS};

pub const DEFAULT_CACHE_CAPACITY: u64 = 100_000;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session for `session_id`; `None` when absent or expired.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    async fn create(&self, session: Session) -> Result<Session, StoreError>;

    /// Apply one effective turn, bumping the version and re-applying the TTL.
    async fn update(&self, session_id: &str, update: SessionUpdate) -> Result<Session, StoreError>;
}

/// Explicit session-layer settings, normally taken from the `[session]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub ttl_seconds: u64,
    pub cache_capacity: u64,
    pub lease_enabled: bool,
    pub lease_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            lease_enabled: true,
            lease_timeout: Duration::from_millis(2_000),
        }
    }
}

/// Per-entry expiry taken from the session's own TTL, reset on every write.
struct SessionExpiry;

impl Expiry<String, Session> for SessionExpiry {
    fn expire_after_create(&self, _key: &String, session: &Session, _created_at: Instant) -> Option<Duration> {
        Some(Duration::from_secs(session.ttl_seconds))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        session: &Session,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(Duration::from_secs(session.ttl_seconds))
    }
}

pub struct TieredSessionStore {
    cache: Cache<String, Session>,
    journal: Arc<dyn SessionJournal>,
}

impl TieredSessionStore {
    pub fn new(journal: Arc<dyn SessionJournal>, settings: &SessionSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(settings.cache_capacity)
            .expire_after(SessionExpiry)
            .build();
        Self { cache, journal }
    }

    /// Drop the cached copy only, as after a process restart.
    pub async fn evict(&self, session_id: &str) {
        self.cache.invalidate(session_id).await;
    }

    /// Journal write; on failure put the cache back the way it was.
    async fn commit(&self, session: &Session, previous: Option<Session>) -> Result<(), StoreError> {
        let Err(err) = self.journal.append(session).await else {
            return Ok(());
        };

        error!(session.id = %session.id, version = session.version, error = %err, "Durable session write failed");
        match previous {
            Some(previous) => self.cache.insert(session.id.clone(), previous).await,
            None => self.cache.invalidate(&session.id).await,
        }
        Err(match err {
            StoreError::Unavailable(reason) => StoreError::Unavailable(reason),
            other => StoreError::unavailable(other),
        })
    }
}

#[async_trait]
impl SessionStore for TieredSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        if let Some(session) = self.cache.get(session_id).await {
            return Ok(Some(session));
        }

        let Some(session) = self.journal.latest(session_id).await? else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            debug!(session.id = %session_id, "Journaled session has expired");
            return Ok(None);
        }

        debug!(session.id = %session_id, version = session.version, "Re-warmed session from journal");
        self.cache.insert(session_id.to_string(), session.clone()).await;
        Ok(Some(session))
    }

    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        if self.get(&session.id).await?.is_some() {
            return Err(StoreError::DuplicateSession(session.id));
        }

        self.cache.insert(session.id.clone(), session.clone()).await;
        self.commit(&session, None).await?;
        debug!(session.id = %session.id, machine = %session.machine_id, "Created session");
        Ok(session)
    }

    async fn update(&self, session_id: &str, update: SessionUpdate) -> Result<Session, StoreError> {
        let current = self
            .get(session_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        if let Some(expected) = update.expected_version {
            if expected != current.version {
                return Err(StoreError::VersionConflict {
                    session_id: session_id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }

        let mut next = current.clone();
        next.apply(update);
        self.cache.insert(session_id.to_string(), next.clone()).await;
        self.commit(&next, Some(current)).await?;
        debug!(session.id = %session_id, version = next.version, state = %next.state, "Updated session");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineId;
    use crate::session::journal::MemoryJournal;
    use serde_json::Map;

    fn store() -> (MemoryJournal, TieredSessionStore) {
        let journal = MemoryJournal::new();
        let store = TieredSessionStore::new(Arc::new(journal.clone()), &SessionSettings::default());
        (journal, store)
    }

    fn session(id: &str) -> Session {
        Session::new(id, "+254700000001", "*384#", MachineId::Main, "mainMenu", 180)
    }

    fn update(expected_version: Option<u64>) -> SessionUpdate {
        SessionUpdate {
            machine_id: MachineId::Transfer,
            state: "enteringRecipient".to_string(),
            data: Map::new(),
            input: "1".to_string(),
            response: "CON Enter recipient".to_string(),
            expected_version,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let (_, store) = store();
        store.create(session("S1")).await.unwrap();

        let err = store.create(session("S1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSession(id) if id == "S1"));
    }

    #[tokio::test]
    async fn update_bumps_version_and_checks_expectations() {
        let (_, store) = store();
        store.create(session("S1")).await.unwrap();

        let updated = store.update("S1", update(Some(1))).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.machine_id, MachineId::Transfer);

        let err = store.update("S1", update(Some(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, actual: 2, .. }));

        let err = store.update("missing", update(None)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn journal_failure_rolls_the_cache_back() {
        let (journal, store) = store();
        store.create(session("S1")).await.unwrap();

        journal.set_outage(true);
        let err = store.update("S1", update(Some(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        journal.set_outage(false);
        let stored = store.get("S1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.state, "mainMenu");
    }

    #[tokio::test]
    async fn failed_create_leaves_nothing_behind() {
        let (journal, store) = store();
        journal.set_outage(true);
        assert!(store.create(session("S1")).await.is_err());

        journal.set_outage(false);
        assert!(store.get("S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cache_misses_fall_back_to_the_journal() {
        let (_, store) = store();
        store.create(session("S1")).await.unwrap();
        store.update("S1", update(None)).await.unwrap();

        store.evict("S1").await;
        let restored = store.get("S1").await.unwrap().unwrap();
        assert_eq!(restored.version, 2);
    }

    #[tokio::test]
    async fn expired_journal_snapshots_are_ignored() {
        let (journal, store) = store();
        let mut stale = session("S1");
        stale.updated_at = Utc::now() - chrono::Duration::seconds(600);
        journal.append(&stale).await.unwrap();

        assert!(store.get("S1").await.unwrap().is_none());
    }
}
