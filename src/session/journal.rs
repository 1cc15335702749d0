// Durable session journal - append-only snapshots behind the cache

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::errors::StoreError;
use super::types::Session;

/// Durable append path for session snapshots.
#[async_trait]
pub trait SessionJournal: Send + Sync {
    /// Append a snapshot; every create and update writes one.
    async fn append(&self, session: &Session) -> Result<(), StoreError>;

    /// Most recent snapshot of a session, regardless of expiry.
    async fn latest(&self, session_id: &str) -> Result<Option<Session>, StoreError>;
}

/// In-process journal with a switchable outage, for tests and the simulator.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<Mutex<HashMap<String, Vec<Session>>>>,
    outage: Arc<AtomicBool>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with `Unavailable`.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Every snapshot written for `session_id`, oldest first.
    pub fn snapshots(&self, session_id: &str) -> Vec<Session> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(session_id).cloned())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("journal outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionJournal for MemoryJournal {
    async fn append(&self, session: &Session) -> Result<(), StoreError> {
        self.check_available()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::unavailable("journal lock poisoned"))?;
        entries
            .entry(session.id.clone())
            .or_default()
            .push(session.clone());
        Ok(())
    }

    async fn latest(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.check_available()?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::unavailable("journal lock poisoned"))?;
        Ok(entries
            .get(session_id)
            .and_then(|snapshots| snapshots.last().cloned()))
    }
}

/// JSON-lines journal: one serialized snapshot per line.
#[derive(Debug)]
pub struct JsonlJournal {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionJournal for JsonlJournal {
    async fn append(&self, session: &Session) -> Result<(), StoreError> {
        let line = format!("{}\n", serde_json::to_string(session)?);

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(session.id = %session.id, version = session.version, "Journaled session snapshot");
        Ok(())
    }

    async fn latest(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest = None;
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<Session>(line) {
                Ok(session) if session.id == session_id => latest = Some(session),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable journal line: {}", e),
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineId;
    use tempfile::TempDir;

    fn session(id: &str, version: u64) -> Session {
        let mut session = Session::new(id, "+254700000001", "*384#", MachineId::Main, "mainMenu", 180);
        session.version = version;
        session
    }

    #[tokio::test]
    async fn jsonl_journal_returns_the_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        let journal = JsonlJournal::new(dir.path().join("nested").join("sessions.jsonl"));

        journal.append(&session("S1", 1)).await.unwrap();
        journal.append(&session("S2", 1)).await.unwrap();
        journal.append(&session("S1", 2)).await.unwrap();

        assert_eq!(journal.latest("S1").await.unwrap().unwrap().version, 2);
        assert_eq!(journal.latest("S2").await.unwrap().unwrap().version, 1);
        assert!(journal.latest("S3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_journal_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let journal = JsonlJournal::new(dir.path().join("absent.jsonl"));
        assert!(journal.latest("S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_journal_outage_fails_calls() {
        let journal = MemoryJournal::new();
        journal.append(&session("S1", 1)).await.unwrap();

        journal.set_outage(true);
        assert!(matches!(
            journal.append(&session("S1", 2)).await,
            Err(StoreError::Unavailable(_))
        ));

        journal.set_outage(false);
        assert_eq!(journal.snapshots("S1").len(), 1);
    }
}
