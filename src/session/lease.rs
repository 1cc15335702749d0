// Per-session mutual exclusion for at-least-once gateways

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::machine::EngineError;

/// Idle leases are forgotten after this long.
const LEASE_IDLE: Duration = Duration::from_secs(300);

/// In-process, short-lived exclusive lease per session id.
#[derive(Clone)]
pub struct SessionLeases {
    locks: Cache<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Held for the duration of one turn.
pub type SessionLease = OwnedMutexGuard<()>;

impl SessionLeases {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Cache::builder().time_to_idle(LEASE_IDLE).build(),
            timeout,
        }
    }

    pub async fn acquire(&self, session_id: &str) -> Result<SessionLease, EngineError> {
        let lock = self
            .locks
            .get_with(session_id.to_string(), async { Arc::new(Mutex::new(())) })
            .await;

        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                warn!(session.id = %session_id, "Timed out waiting for session lease");
                EngineError::LeaseTimeout {
                    session_id: session_id.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_times_out() {
        let leases = SessionLeases::new(Duration::from_millis(20));
        let held = leases.acquire("S1").await.unwrap();

        let err = leases.acquire("S1").await.unwrap_err();
        assert!(matches!(err, EngineError::LeaseTimeout { .. }));
        assert!(leases.acquire("S2").await.is_ok());

        drop(held);
        assert!(leases.acquire("S1").await.is_ok());
    }
}
