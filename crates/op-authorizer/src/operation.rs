//! Operation records and lifecycle states

use chrono::{DateTime, Utc};
use safety_config::{OperationTarget, OperationType, RiskLevel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an operation
///
/// Transitions: `Pending -> {Approved, Rejected}`,
/// `Approved -> {Executed, Failed}`. `Rejected` and `Executed` are
/// terminal; a `Failed` operation can only continue as a brand-new
/// retried operation with a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
}

impl OperationStatus {
    /// Whether the record can never change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Rejected | OperationStatus::Executed)
    }
}

/// Outcome reported by the executor for a dispatched operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            completed_at: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            completed_at: Utc::now(),
        }
    }
}

/// Caller-supplied request to queue an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInput {
    pub op_type: OperationType,
    pub target: OperationTarget,
    /// Pre-assessed risk; when absent the engine assesses it
    #[serde(default)]
    pub risk_override: Option<RiskLevel>,
    #[serde(default)]
    pub requested_by: Option<String>,
    /// External deduplication key; defaults to the operation id
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// The authorizable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub op_type: OperationType,
    pub target: OperationTarget,
    pub risk_level: RiskLevel,
    pub status: OperationStatus,
    /// Fixed at creation; safe/moderate operations skip `Pending`
    pub requires_confirmation: bool,
    pub cooldown_ms: u64,
    pub max_retries: u32,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<String>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<OperationResult>,
    /// Shared across an operation and all of its retries
    pub idempotency_key: String,
}

impl Operation {
    /// Whether a retry is still possible from the current state
    pub fn can_retry(&self) -> bool {
        self.status == OperationStatus::Failed && self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OperationStatus::Rejected.is_terminal());
        assert!(OperationStatus::Executed.is_terminal());
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Approved.is_terminal());
        assert!(!OperationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serde_form() {
        let json = serde_json::to_string(&OperationStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
