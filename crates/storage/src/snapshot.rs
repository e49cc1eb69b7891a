//! Engine snapshot format and save/restore glue

use crate::store::{SnapshotStore, StorageError};
use alert_correlator::{Alert, AlertCorrelator, CorrelationGroup};
use chrono::{DateTime, Utc};
use op_authorizer::{Operation, OperationAuthorizer};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The durable record: everything the engine needs to resume.
///
/// The cooldown ledger is intentionally absent; see the crate docs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub operations: Vec<Operation>,
    pub alerts: Vec<Alert>,
    pub groups: Vec<CorrelationGroup>,
    pub saved_at: DateTime<Utc>,
}

/// Capture and persist current engine state
pub fn save_engine(
    store: &dyn SnapshotStore,
    authorizer: &OperationAuthorizer,
    correlator: &AlertCorrelator,
) -> Result<(), StorageError> {
    let snapshot = EngineSnapshot {
        operations: authorizer.snapshot_operations(),
        alerts: correlator.snapshot_alerts(),
        groups: correlator.snapshot_groups(),
        saved_at: Utc::now(),
    };
    store.save(&snapshot)?;
    info!(
        operations = snapshot.operations.len(),
        alerts = snapshot.alerts.len(),
        groups = snapshot.groups.len(),
        "Engine snapshot saved"
    );
    Ok(())
}

/// Restore engine state from the store, if a snapshot exists
///
/// Cooldowns are not restored: the ledger starts empty in every fresh
/// process.
pub fn restore_engine(
    store: &dyn SnapshotStore,
    authorizer: &OperationAuthorizer,
    correlator: &AlertCorrelator,
) -> Result<bool, StorageError> {
    let Some(snapshot) = store.load()? else {
        return Ok(false);
    };

    authorizer.restore_operations(snapshot.operations);
    correlator.restore(snapshot.alerts, snapshot.groups);
    info!(saved_at = %snapshot.saved_at, "Engine state restored from snapshot");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshotStore;
    use alert_correlator::{AlertInput, AlertSource, AlertType, Severity};
    use cooldown_limiter::{CooldownLimiter, OpKey};
    use op_authorizer::OperationInput;
    use safety_config::{OperationTarget, OperationType, SafetyConfig, TargetType};
    use std::sync::Arc;

    fn build_engine() -> (Arc<SafetyConfig>, Arc<CooldownLimiter>, OperationAuthorizer, AlertCorrelator)
    {
        let config = Arc::new(SafetyConfig::default());
        let cooldowns = Arc::new(CooldownLimiter::new(Arc::clone(&config)));
        let authorizer = OperationAuthorizer::new(Arc::clone(&config), Arc::clone(&cooldowns));
        let correlator = AlertCorrelator::new(Arc::clone(&config));
        (config, cooldowns, authorizer, correlator)
    }

    #[test]
    fn test_save_and_restore_engine_state() {
        let (_, _, authorizer, correlator) = build_engine();

        authorizer.queue_operation(OperationInput {
            op_type: OperationType::Delete,
            target: OperationTarget::new(TargetType::Vm, "vm-7", "prod-db-01"),
            risk_override: None,
            requested_by: None,
            idempotency_key: None,
        });
        correlator.add_alert(AlertInput {
            source: AlertSource {
                source_type: TargetType::Service,
                id: "svc-1".to_string(),
                name: "checkout".to_string(),
                host: None,
            },
            alert_type: AlertType::ServiceDegraded,
            severity: Severity::Warning,
            message: "latency above threshold".to_string(),
        });

        let store = MemorySnapshotStore::new();
        save_engine(&store, &authorizer, &correlator).unwrap();

        let (_, _, fresh_auth, fresh_corr) = build_engine();
        assert!(restore_engine(&store, &fresh_auth, &fresh_corr).unwrap());
        assert_eq!(fresh_auth.stats().total, 1);
        assert_eq!(fresh_corr.stats().total_alerts, 1);
    }

    #[test]
    fn test_restore_without_snapshot_is_a_noop() {
        let (_, _, authorizer, correlator) = build_engine();
        let store = MemorySnapshotStore::new();
        assert!(!restore_engine(&store, &authorizer, &correlator).unwrap());
    }

    #[test]
    fn test_restore_leaves_cooldown_ledger_alone() {
        let (_, cooldowns, authorizer, correlator) = build_engine();

        let key = OpKey::new(OperationType::Restart, "c1");
        cooldowns.record_execution(&key);

        let store = MemorySnapshotStore::new();
        save_engine(&store, &authorizer, &correlator).unwrap();
        restore_engine(&store, &authorizer, &correlator).unwrap();

        // The in-flight cooldown survives restore untouched
        assert!(!cooldowns.can_execute(&key));
        assert_eq!(cooldowns.stats().total_executions, 1);
    }
}
