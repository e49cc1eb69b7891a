//! Cooldown ledger implementation

use safety_config::{OperationType, SafetyConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Ledger key: one cooldown per (operation type, target id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpKey {
    pub op: OperationType,
    pub target_id: String,
}

impl OpKey {
    pub fn new(op: OperationType, target_id: impl Into<String>) -> Self {
        Self {
            op,
            target_id: target_id.into(),
        }
    }
}

/// Cooldown gate errors
#[derive(Debug, Clone, Error)]
pub enum CooldownError {
    /// The key is still inside its cooldown window
    #[error("cooldown active: {remaining_ms}ms remaining")]
    Active { remaining_ms: u64 },
}

/// Aggregate ledger diagnostics, recomputed on demand
#[derive(Debug, Clone, Serialize)]
pub struct CooldownStats {
    pub total_executions: u64,
    pub active_cooldowns: usize,
    pub executions_by_type: HashMap<OperationType, u64>,
}

#[derive(Debug, Clone)]
struct CooldownEntry {
    last_executed_at: Instant,
    execution_count: u64,
}

/// Execution-time ledger guarding repeated operations
///
/// Purely in-memory: a process restart resets all cooldowns, which is
/// acceptable because a fresh process has no knowledge of in-flight
/// real-world operations either.
pub struct CooldownLimiter {
    config: Arc<SafetyConfig>,
    entries: Mutex<HashMap<OpKey, CooldownEntry>>,
}

impl CooldownLimiter {
    pub fn new(config: Arc<SafetyConfig>) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<OpKey, CooldownEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remaining_for(&self, entry: &CooldownEntry, op: OperationType, now: Instant) -> Duration {
        let cooldown = self.config.cooldown(op);
        let elapsed = now.saturating_duration_since(entry.last_executed_at);
        cooldown.saturating_sub(elapsed)
    }

    /// Whether the key is currently allowed to execute
    ///
    /// Read-only check. Callers that intend to execute must use
    /// [`try_acquire`](Self::try_acquire) instead, which closes the
    /// check-then-act race under concurrent callers.
    pub fn can_execute(&self, key: &OpKey) -> bool {
        let entries = self.entries();
        match entries.get(key) {
            Some(entry) => self.remaining_for(entry, key.op, Instant::now()).is_zero(),
            None => true,
        }
    }

    /// Atomically check the cooldown and record an execution
    ///
    /// Exactly one of N concurrent callers for the same key can win;
    /// the rest receive [`CooldownError::Active`] with the remaining
    /// duration.
    pub fn try_acquire(&self, key: &OpKey) -> Result<(), CooldownError> {
        let now = Instant::now();
        let mut entries = self.entries();

        if let Some(entry) = entries.get(key) {
            let remaining = self.remaining_for(entry, key.op, now);
            if !remaining.is_zero() {
                debug!(
                    op = %key.op,
                    target = %key.target_id,
                    remaining_ms = remaining.as_millis() as u64,
                    "Execution gated by cooldown"
                );
                return Err(CooldownError::Active {
                    remaining_ms: remaining.as_millis() as u64,
                });
            }
        }

        let entry = entries.entry(key.clone()).or_insert(CooldownEntry {
            last_executed_at: now,
            execution_count: 0,
        });
        entry.last_executed_at = now;
        entry.execution_count += 1;
        Ok(())
    }

    /// Record an execution without checking the cooldown
    pub fn record_execution(&self, key: &OpKey) {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert(CooldownEntry {
            last_executed_at: now,
            execution_count: 0,
        });
        entry.last_executed_at = now;
        entry.execution_count += 1;
    }

    /// Remaining cooldown for a key, zero when executable
    ///
    /// Computed on query, never via a background timer: UI countdowns
    /// must re-poll rather than assume a fixed decrement.
    pub fn cooldown_remaining(&self, key: &OpKey) -> Duration {
        let entries = self.entries();
        match entries.get(key) {
            Some(entry) => self.remaining_for(entry, key.op, Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Drop the ledger entry for one key (administrative override)
    pub fn reset(&self, key: &OpKey) {
        if self.entries().remove(key).is_some() {
            info!(op = %key.op, target = %key.target_id, "Cooldown reset");
        }
    }

    /// Drop all ledger entries for a target
    pub fn clear_target(&self, target_id: &str) {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|k, _| k.target_id != target_id);
        if entries.len() < before {
            info!(target = target_id, "Cleared cooldowns for target");
        }
    }

    /// Drop all ledger entries for an operation type
    pub fn clear_operation_type(&self, op: OperationType) {
        self.entries().retain(|k, _| k.op != op);
    }

    /// Drop the entire ledger
    pub fn clear_all(&self) {
        self.entries().clear();
    }

    /// Aggregate diagnostics, recomputed on demand (not cached)
    pub fn stats(&self) -> CooldownStats {
        let entries = self.entries();
        let now = Instant::now();

        let mut executions_by_type: HashMap<OperationType, u64> = HashMap::new();
        let mut total_executions = 0u64;
        let mut active_cooldowns = 0usize;

        for (key, entry) in entries.iter() {
            total_executions += entry.execution_count;
            *executions_by_type.entry(key.op).or_insert(0) += entry.execution_count;
            if !self.remaining_for(entry, key.op, now).is_zero() {
                active_cooldowns += 1;
            }
        }

        CooldownStats {
            total_executions,
            active_cooldowns,
            executions_by_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn limiter_with_restart_cooldown(ms: u64) -> CooldownLimiter {
        let mut config = SafetyConfig::default();
        config.restart.cooldown_ms = ms;
        CooldownLimiter::new(Arc::new(config))
    }

    #[test]
    fn test_first_execution_allowed() {
        let limiter = limiter_with_restart_cooldown(30_000);
        let key = OpKey::new(OperationType::Restart, "c1");

        assert!(limiter.can_execute(&key));
        assert_eq!(limiter.cooldown_remaining(&key), Duration::ZERO);
    }

    #[test]
    fn test_gated_immediately_after_execution() {
        let limiter = limiter_with_restart_cooldown(30_000);
        let key = OpKey::new(OperationType::Restart, "c1");

        limiter.record_execution(&key);
        assert!(!limiter.can_execute(&key));

        let remaining = limiter.cooldown_remaining(&key);
        assert!(remaining > Duration::ZERO);
        assert!(remaining <= Duration::from_millis(30_000));
    }

    #[test]
    fn test_allowed_again_after_cooldown_elapses() {
        let limiter = limiter_with_restart_cooldown(10);
        let key = OpKey::new(OperationType::Restart, "c1");

        limiter.record_execution(&key);
        assert!(!limiter.can_execute(&key));

        thread::sleep(Duration::from_millis(20));
        assert!(limiter.can_execute(&key));
        assert_eq!(limiter.cooldown_remaining(&key), Duration::ZERO);
    }

    #[test]
    fn test_remaining_is_non_increasing() {
        let limiter = limiter_with_restart_cooldown(30_000);
        let key = OpKey::new(OperationType::Restart, "c1");

        limiter.record_execution(&key);
        let first = limiter.cooldown_remaining(&key);
        thread::sleep(Duration::from_millis(5));
        let second = limiter.cooldown_remaining(&key);
        assert!(second <= first);
    }

    #[test]
    fn test_try_acquire_single_winner_under_contention() {
        let limiter = Arc::new(limiter_with_restart_cooldown(30_000));
        let key = OpKey::new(OperationType::Restart, "c1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let key = key.clone();
            handles.push(thread::spawn(move || limiter.try_acquire(&key).is_ok()));
        }

        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_try_acquire_error_carries_remaining() {
        let limiter = limiter_with_restart_cooldown(30_000);
        let key = OpKey::new(OperationType::Restart, "c1");

        limiter.try_acquire(&key).unwrap();
        let err = limiter.try_acquire(&key).unwrap_err();
        let CooldownError::Active { remaining_ms } = err;
        assert!(remaining_ms > 0 && remaining_ms <= 30_000);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter_with_restart_cooldown(30_000);
        let c1 = OpKey::new(OperationType::Restart, "c1");
        let c2 = OpKey::new(OperationType::Restart, "c2");

        limiter.record_execution(&c1);
        assert!(!limiter.can_execute(&c1));
        assert!(limiter.can_execute(&c2));

        // Same target, different operation type
        let stop_c1 = OpKey::new(OperationType::Stop, "c1");
        assert!(limiter.can_execute(&stop_c1));
    }

    #[test]
    fn test_reset_and_clears() {
        let limiter = limiter_with_restart_cooldown(30_000);
        let c1 = OpKey::new(OperationType::Restart, "c1");
        let c2 = OpKey::new(OperationType::Restart, "c2");

        limiter.record_execution(&c1);
        limiter.record_execution(&c2);

        limiter.reset(&c1);
        assert!(limiter.can_execute(&c1));
        assert!(!limiter.can_execute(&c2));

        limiter.clear_target("c2");
        assert!(limiter.can_execute(&c2));

        limiter.record_execution(&c1);
        limiter.clear_operation_type(OperationType::Restart);
        assert!(limiter.can_execute(&c1));

        limiter.record_execution(&c1);
        limiter.clear_all();
        assert_eq!(limiter.stats().total_executions, 0);
    }

    #[test]
    fn test_stats_aggregation() {
        let limiter = limiter_with_restart_cooldown(30_000);

        limiter.record_execution(&OpKey::new(OperationType::Restart, "c1"));
        limiter.record_execution(&OpKey::new(OperationType::Stop, "vm-1"));

        let stats = limiter.stats();
        assert_eq!(stats.total_executions, 2);
        assert_eq!(stats.active_cooldowns, 2);
        assert_eq!(stats.executions_by_type[&OperationType::Restart], 1);
        assert_eq!(stats.executions_by_type[&OperationType::Stop], 1);
    }
}
