use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Turn engine counters
#[derive(Debug, Default)]
pub struct TurnMetrics {
    pub turns: AtomicU64,
    pub no_op_turns: AtomicU64,
    pub machine_jumps: AtomicU64,
    pub sessions_created: AtomicU64,
    pub system_errors: AtomicU64,
    pub lockouts: AtomicU64,
}

impl TurnMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_turn(&self) {
        self.turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_op(&self) {
        self.no_op_turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_jump(&self) {
        self.machine_jumps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_system_error(&self) {
        self.system_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lockout(&self) {
        self.lockouts.fetch_add(1, Ordering::Relaxed);
        warn!("Account locked out");
    }

    pub fn get_stats(&self) -> TurnStats {
        TurnStats {
            turns: self.turns.load(Ordering::Relaxed),
            no_op_turns: self.no_op_turns.load(Ordering::Relaxed),
            machine_jumps: self.machine_jumps.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            system_errors: self.system_errors.load(Ordering::Relaxed),
            lockouts: self.lockouts.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Turn metrics: turns={}, no_ops={}, jumps={}, sessions={}, system_errors={}, lockouts={}",
            stats.turns,
            stats.no_op_turns,
            stats.machine_jumps,
            stats.sessions_created,
            stats.system_errors,
            stats.lockouts
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnStats {
    pub turns: u64,
    pub no_op_turns: u64,
    pub machine_jumps: u64,
    pub sessions_created: u64,
    pub system_errors: u64,
    pub lockouts: u64,
}

/// Global metrics instance
static TURN_METRICS: std::sync::LazyLock<TurnMetrics> = std::sync::LazyLock::new(TurnMetrics::new);

pub fn turn_metrics() -> &'static TurnMetrics {
    &TURN_METRICS
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = TurnMetrics::new();
        metrics.record_turn();
        metrics.record_turn();
        metrics.record_no_op();
        metrics.record_lockout();

        let stats = metrics.get_stats();
        assert_eq!(stats.turns, 2);
        assert_eq!(stats.no_op_turns, 1);
        assert_eq!(stats.lockouts, 1);
        assert_eq!(stats.machine_jumps, 0);
    }
}
