//! Operation state machine implementation

use crate::error::AuthorizerError;
use crate::operation::{Operation, OperationInput, OperationResult, OperationStatus};
use chrono::Utc;
use cooldown_limiter::{CooldownError, CooldownLimiter, OpKey};
use risk_assessor::assess_risk;
use safety_config::{RiskLevel, SafetyConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Dispatches an authorized operation to real infrastructure
///
/// Injected by the embedding process; the engine itself does not know
/// how to start, stop, reboot, or delete anything.
pub trait OperationExecutor: Send + Sync {
    fn execute(&self, operation: &Operation) -> OperationResult;
}

/// Executor stand-in for callers that dispatch out-of-band
pub struct NoopExecutor;

impl OperationExecutor for NoopExecutor {
    fn execute(&self, operation: &Operation) -> OperationResult {
        OperationResult::ok(format!(
            "{} {} dispatched",
            operation.op_type, operation.target.id
        ))
    }
}

/// Aggregate authorizer diagnostics, recomputed on demand
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizerStats {
    pub total: usize,
    pub pending_by_risk: HashMap<RiskLevel, usize>,
    pub by_status: HashMap<OperationStatus, usize>,
}

/// The operation lifecycle state machine
pub struct OperationAuthorizer {
    config: Arc<SafetyConfig>,
    cooldowns: Arc<CooldownLimiter>,
    operations: Mutex<HashMap<Uuid, Operation>>,
    executor: Option<Arc<dyn OperationExecutor>>,
}

impl OperationAuthorizer {
    pub fn new(config: Arc<SafetyConfig>, cooldowns: Arc<CooldownLimiter>) -> Self {
        Self {
            config,
            cooldowns,
            operations: Mutex::new(HashMap::new()),
            executor: None,
        }
    }

    /// Attach the executor that dispatches authorized operations
    pub fn with_executor(mut self, executor: Arc<dyn OperationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    fn operations(&self) -> MutexGuard<'_, HashMap<Uuid, Operation>> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a proposed operation
    ///
    /// Assesses risk (unless pre-supplied), fixes the confirmation
    /// requirement, and creates the record `Pending`, or directly
    /// `Approved` when no confirmation is needed (the fast path for
    /// safe/moderate operations).
    pub fn queue_operation(&self, input: OperationInput) -> Operation {
        let risk = input
            .risk_override
            .unwrap_or_else(|| assess_risk(input.op_type, &input.target, &self.config));
        let requires_confirmation = self.config.requires_confirmation(risk);
        let policy = self.config.policy(input.op_type);

        let id = Uuid::new_v4();
        let operation = Operation {
            id,
            op_type: input.op_type,
            target: input.target,
            risk_level: risk,
            status: if requires_confirmation {
                OperationStatus::Pending
            } else {
                OperationStatus::Approved
            },
            requires_confirmation,
            cooldown_ms: policy.cooldown_ms,
            max_retries: policy.max_retries,
            retry_count: 0,
            created_at: Utc::now(),
            requested_by: input.requested_by,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            executed_at: None,
            result: None,
            idempotency_key: input.idempotency_key.unwrap_or_else(|| id.to_string()),
        };

        info!(
            id = %operation.id,
            op = %operation.op_type,
            target = %operation.target.name,
            risk = %operation.risk_level,
            status = ?operation.status,
            "Operation queued"
        );

        self.operations().insert(id, operation.clone());
        operation
    }

    /// Approve a pending operation (human confirmation)
    pub fn approve_operation(
        &self,
        id: Uuid,
        approved_by: Option<&str>,
    ) -> Result<Operation, AuthorizerError> {
        let mut operations = self.operations();
        let operation = operations
            .get_mut(&id)
            .ok_or(AuthorizerError::NotFound { id })?;

        if operation.status != OperationStatus::Pending {
            return Err(AuthorizerError::InvalidTransition {
                id,
                status: operation.status,
                expected: "pending",
            });
        }

        operation.status = OperationStatus::Approved;
        operation.approved_at = Some(Utc::now());
        operation.approved_by = approved_by.map(String::from);
        info!(id = %id, approved_by = ?operation.approved_by, "Operation approved");
        Ok(operation.clone())
    }

    /// Reject a pending operation (terminal)
    pub fn reject_operation(
        &self,
        id: Uuid,
        rejected_by: Option<&str>,
    ) -> Result<Operation, AuthorizerError> {
        let mut operations = self.operations();
        let operation = operations
            .get_mut(&id)
            .ok_or(AuthorizerError::NotFound { id })?;

        if operation.status != OperationStatus::Pending {
            return Err(AuthorizerError::InvalidTransition {
                id,
                status: operation.status,
                expected: "pending",
            });
        }

        operation.status = OperationStatus::Rejected;
        operation.rejected_at = Some(Utc::now());
        operation.rejected_by = rejected_by.map(String::from);
        info!(id = %id, rejected_by = ?operation.rejected_by, "Operation rejected");
        Ok(operation.clone())
    }

    /// Execute an approved operation
    ///
    /// Authorize-then-act: the cooldown gate runs before anything is
    /// marked `Executed`, so a `RateLimited` error guarantees no real
    /// infrastructure was touched. The executor itself is invoked
    /// outside the operations lock.
    pub fn execute_operation(&self, id: Uuid) -> Result<Operation, AuthorizerError> {
        let dispatched = {
            let mut operations = self.operations();
            let operation = operations
                .get_mut(&id)
                .ok_or(AuthorizerError::NotFound { id })?;

            if operation.status != OperationStatus::Approved {
                return Err(AuthorizerError::InvalidTransition {
                    id,
                    status: operation.status,
                    expected: "approved",
                });
            }

            let key = OpKey::new(operation.op_type, operation.target.id.clone());
            match self.cooldowns.try_acquire(&key) {
                Ok(()) => {}
                Err(CooldownError::Active { remaining_ms }) => {
                    warn!(id = %id, remaining_ms, "Execution rate limited");
                    return Err(AuthorizerError::RateLimited { remaining_ms });
                }
            }

            operation.status = OperationStatus::Executed;
            operation.executed_at = Some(Utc::now());
            operation.clone()
        };

        info!(id = %id, op = %dispatched.op_type, target = %dispatched.target.id, "Operation authorized for dispatch");

        let Some(executor) = self.executor.as_ref() else {
            return Ok(dispatched);
        };

        // Dispatch outside the critical section; only the outcome is
        // written back.
        let result = executor.execute(&dispatched);

        let mut operations = self.operations();
        let operation = operations
            .get_mut(&id)
            .ok_or(AuthorizerError::NotFound { id })?;
        if !result.success {
            warn!(id = %id, message = ?result.message, "Dispatched operation failed");
            operation.status = OperationStatus::Failed;
        }
        operation.result = Some(result);
        Ok(operation.clone())
    }

    /// Remove a pending or approved operation outright
    ///
    /// A deletion, not a state transition: used when a human changes
    /// their mind before execution. Racing against an in-flight
    /// execute, exactly one of the two wins; the loser observes
    /// NotFound or an invalid-transition error.
    pub fn cancel_operation(&self, id: Uuid) -> Result<Operation, AuthorizerError> {
        let mut operations = self.operations();
        let operation = operations.get(&id).ok_or(AuthorizerError::NotFound { id })?;

        match operation.status {
            OperationStatus::Pending | OperationStatus::Approved => {
                let removed = operations.remove(&id).ok_or(AuthorizerError::NotFound { id })?;
                info!(id = %id, "Operation cancelled");
                Ok(removed)
            }
            status => Err(AuthorizerError::InvalidTransition {
                id,
                status,
                expected: "pending or approved",
            }),
        }
    }

    /// Retry a failed operation
    ///
    /// Creates a brand-new record (fresh id and timestamps,
    /// `retry_count + 1`) carrying the original idempotency key so
    /// downstream systems can deduplicate side effects. Returns
    /// `Ok(None)` when the budget is exhausted or the operation is not
    /// `Failed` (an expected, recoverable condition, not an error).
    pub fn retry_operation(&self, id: Uuid) -> Result<Option<Operation>, AuthorizerError> {
        let mut operations = self.operations();
        let original = operations.get(&id).ok_or(AuthorizerError::NotFound { id })?;

        if !original.can_retry() {
            debug!(
                id = %id,
                status = ?original.status,
                retry_count = original.retry_count,
                max_retries = original.max_retries,
                "Retry not possible"
            );
            return Ok(None);
        }

        let retry = Operation {
            id: Uuid::new_v4(),
            op_type: original.op_type,
            target: original.target.clone(),
            risk_level: original.risk_level,
            status: if original.requires_confirmation {
                OperationStatus::Pending
            } else {
                OperationStatus::Approved
            },
            requires_confirmation: original.requires_confirmation,
            cooldown_ms: original.cooldown_ms,
            max_retries: original.max_retries,
            retry_count: original.retry_count + 1,
            created_at: Utc::now(),
            requested_by: original.requested_by.clone(),
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            executed_at: None,
            result: None,
            idempotency_key: original.idempotency_key.clone(),
        };

        info!(
            original = %id,
            retry = %retry.id,
            retry_count = retry.retry_count,
            "Operation retried"
        );

        operations.insert(retry.id, retry.clone());
        Ok(Some(retry))
    }

    /// Look up a single operation
    pub fn get_operation(&self, id: Uuid) -> Option<Operation> {
        self.operations().get(&id).cloned()
    }

    /// Pending operations, optionally filtered by risk level, oldest first
    pub fn pending_operations(&self, risk: Option<RiskLevel>) -> Vec<Operation> {
        let operations = self.operations();
        let mut pending: Vec<Operation> = operations
            .values()
            .filter(|op| op.status == OperationStatus::Pending)
            .filter(|op| risk.map_or(true, |r| op.risk_level == r))
            .cloned()
            .collect();
        pending.sort_by_key(|op| op.created_at);
        pending
    }

    /// All operations in a given status, oldest first
    pub fn operations_by_status(&self, status: OperationStatus) -> Vec<Operation> {
        let operations = self.operations();
        let mut matching: Vec<Operation> = operations
            .values()
            .filter(|op| op.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|op| op.created_at);
        matching
    }

    /// Aggregate diagnostics, recomputed on demand (not cached)
    pub fn stats(&self) -> AuthorizerStats {
        let operations = self.operations();
        let mut pending_by_risk: HashMap<RiskLevel, usize> = HashMap::new();
        let mut by_status: HashMap<OperationStatus, usize> = HashMap::new();

        for op in operations.values() {
            *by_status.entry(op.status).or_insert(0) += 1;
            if op.status == OperationStatus::Pending {
                *pending_by_risk.entry(op.risk_level).or_insert(0) += 1;
            }
        }

        AuthorizerStats {
            total: operations.len(),
            pending_by_risk,
            by_status,
        }
    }

    /// Remove terminal (executed/rejected) records, returning the count
    pub fn cleanup_terminal(&self) -> usize {
        let mut operations = self.operations();
        let before = operations.len();
        operations.retain(|_, op| !op.status.is_terminal());
        let removed = before - operations.len();
        if removed > 0 {
            info!(removed, "Cleaned up terminal operations");
        }
        removed
    }

    /// All operation records, for persistence
    pub fn snapshot_operations(&self) -> Vec<Operation> {
        self.operations().values().cloned().collect()
    }

    /// Replace the operation set from a persisted snapshot
    ///
    /// The cooldown ledger is intentionally left alone: it is transient
    /// execution history, not authoritative state.
    pub fn restore_operations(&self, operations: Vec<Operation>) {
        let mut map = self.operations();
        map.clear();
        for op in operations {
            map.insert(op.id, op);
        }
        info!(count = map.len(), "Restored operations from snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safety_config::{OperationTarget, OperationType, TargetType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingExecutor {
        calls: AtomicUsize,
    }

    impl OperationExecutor for FailingExecutor {
        fn execute(&self, _operation: &Operation) -> OperationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            OperationResult::failed("connection refused")
        }
    }

    fn engine() -> OperationAuthorizer {
        let config = Arc::new(SafetyConfig::default());
        let cooldowns = Arc::new(CooldownLimiter::new(Arc::clone(&config)));
        OperationAuthorizer::new(config, cooldowns)
    }

    fn engine_with(executor: Arc<dyn OperationExecutor>) -> OperationAuthorizer {
        engine().with_executor(executor)
    }

    fn restart_container() -> OperationInput {
        OperationInput {
            op_type: OperationType::Restart,
            target: OperationTarget::new(TargetType::Container, "c1", "worker-1"),
            risk_override: None,
            requested_by: None,
            idempotency_key: None,
        }
    }

    fn delete_prod_vm() -> OperationInput {
        OperationInput {
            op_type: OperationType::Delete,
            target: OperationTarget::new(TargetType::Vm, "vm-7", "prod-db-01"),
            risk_override: None,
            requested_by: Some("alex".to_string()),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_safe_operations_skip_pending() {
        let auth = engine();
        let op = auth.queue_operation(restart_container());

        assert_eq!(op.risk_level, RiskLevel::Moderate);
        assert!(!op.requires_confirmation);
        assert_eq!(op.status, OperationStatus::Approved);
    }

    #[test]
    fn test_dangerous_operations_start_pending() {
        let auth = engine();
        let op = auth.queue_operation(delete_prod_vm());

        assert_eq!(op.risk_level, RiskLevel::Critical);
        assert!(op.requires_confirmation);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.idempotency_key, op.id.to_string());
    }

    #[test]
    fn test_approve_then_execute() {
        let auth = engine();
        let op = auth.queue_operation(delete_prod_vm());

        let approved = auth.approve_operation(op.id, Some("sam")).unwrap();
        assert_eq!(approved.status, OperationStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("sam"));
        assert!(approved.approved_at.is_some());

        let executed = auth.execute_operation(op.id).unwrap();
        assert_eq!(executed.status, OperationStatus::Executed);
        assert!(executed.executed_at.is_some());
    }

    #[test]
    fn test_reject_is_terminal() {
        let auth = engine();
        let op = auth.queue_operation(delete_prod_vm());

        auth.reject_operation(op.id, Some("sam")).unwrap();

        let err = auth.execute_operation(op.id).unwrap_err();
        assert!(matches!(err, AuthorizerError::InvalidTransition { .. }));

        // Cannot approve a rejected operation either
        let err = auth.approve_operation(op.id, None).unwrap_err();
        assert!(matches!(err, AuthorizerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_execute_requires_approved_state() {
        let auth = engine();
        let op = auth.queue_operation(delete_prod_vm());

        let err = auth.execute_operation(op.id).unwrap_err();
        assert!(matches!(
            err,
            AuthorizerError::InvalidTransition {
                status: OperationStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn test_second_execution_is_rate_limited() {
        let auth = engine();
        let first = auth.queue_operation(restart_container());
        auth.execute_operation(first.id).unwrap();

        let second = auth.queue_operation(restart_container());
        let err = auth.execute_operation(second.id).unwrap_err();
        match err {
            AuthorizerError::RateLimited { remaining_ms } => {
                assert!(remaining_ms > 0 && remaining_ms <= 30_000);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }

        // The gated operation was not marked executed
        let still_approved = auth.get_operation(second.id).unwrap();
        assert_eq!(still_approved.status, OperationStatus::Approved);
    }

    #[test]
    fn test_executor_failure_flips_to_failed() {
        let executor = Arc::new(FailingExecutor {
            calls: AtomicUsize::new(0),
        });
        let auth = engine_with(Arc::clone(&executor) as Arc<dyn OperationExecutor>);

        let op = auth.queue_operation(restart_container());
        let outcome = auth.execute_operation(op.id).unwrap();

        assert_eq!(outcome.status, OperationStatus::Failed);
        assert!(!outcome.result.as_ref().unwrap().success);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_chain_shares_idempotency_key() {
        let executor = Arc::new(FailingExecutor {
            calls: AtomicUsize::new(0),
        });
        let auth = engine_with(executor);

        let original = auth.queue_operation(restart_container());
        auth.execute_operation(original.id).unwrap();

        // restart budget is 3; walk the whole chain
        let mut current = auth.get_operation(original.id).unwrap();
        for expected_count in 1..=3u32 {
            let retry = auth.retry_operation(current.id).unwrap().unwrap();
            assert_ne!(retry.id, current.id);
            assert_eq!(retry.retry_count, expected_count);
            assert_eq!(retry.idempotency_key, original.id.to_string());
            assert_eq!(retry.status, OperationStatus::Approved);

            auth.cooldowns.clear_all();
            current = auth.execute_operation(retry.id).unwrap();
            assert_eq!(current.status, OperationStatus::Failed);
        }

        // Budget exhausted
        assert!(auth.retry_operation(current.id).unwrap().is_none());
    }

    #[test]
    fn test_retry_requires_failed_state() {
        let auth = engine();
        let op = auth.queue_operation(restart_container());

        assert!(auth.retry_operation(op.id).unwrap().is_none());

        let missing = Uuid::new_v4();
        assert!(matches!(
            auth.retry_operation(missing),
            Err(AuthorizerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_cancel_removes_record() {
        let auth = engine();
        let op = auth.queue_operation(delete_prod_vm());

        auth.cancel_operation(op.id).unwrap();
        assert!(auth.get_operation(op.id).is_none());
        assert!(matches!(
            auth.cancel_operation(op.id),
            Err(AuthorizerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_cancel_loses_to_execute() {
        let auth = engine();
        let op = auth.queue_operation(restart_container());

        auth.execute_operation(op.id).unwrap();
        let err = auth.cancel_operation(op.id).unwrap_err();
        assert!(matches!(
            err,
            AuthorizerError::InvalidTransition {
                status: OperationStatus::Executed,
                ..
            }
        ));
    }

    #[test]
    fn test_pending_filter_and_stats() {
        let auth = engine();
        auth.queue_operation(delete_prod_vm());
        auth.queue_operation(restart_container()); // auto-approved

        let mut stop_vm = delete_prod_vm();
        stop_vm.op_type = OperationType::Stop;
        auth.queue_operation(stop_vm); // vm elevates dangerous -> critical

        let pending = auth.pending_operations(None);
        assert_eq!(pending.len(), 2);

        let critical = auth.pending_operations(Some(RiskLevel::Critical));
        assert_eq!(critical.len(), 2);
        assert!(auth.pending_operations(Some(RiskLevel::Safe)).is_empty());

        let stats = auth.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending_by_risk[&RiskLevel::Critical], 2);
        assert_eq!(stats.by_status[&OperationStatus::Approved], 1);
    }

    #[test]
    fn test_cleanup_removes_only_terminal() {
        let auth = engine();
        let executed = auth.queue_operation(restart_container());
        auth.execute_operation(executed.id).unwrap();

        let rejected = auth.queue_operation(delete_prod_vm());
        auth.reject_operation(rejected.id, None).unwrap();

        let pending = auth.queue_operation(delete_prod_vm());

        assert_eq!(auth.cleanup_terminal(), 2);
        assert!(auth.get_operation(pending.id).is_some());
        assert!(auth.get_operation(executed.id).is_none());
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let auth = engine();
        auth.queue_operation(delete_prod_vm());
        auth.queue_operation(restart_container());

        let snapshot = auth.snapshot_operations();
        assert_eq!(snapshot.len(), 2);

        let fresh = engine();
        fresh.restore_operations(snapshot);
        assert_eq!(fresh.stats().total, 2);
        assert_eq!(fresh.pending_operations(None).len(), 1);
    }
}
