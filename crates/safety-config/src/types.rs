//! Core domain types shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level of an operation
///
/// Total order: `Safe < Moderate < Dangerous < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Moderate,
    Dangerous,
    Critical,
}

impl RiskLevel {
    /// Next level up, capped at `Critical`
    pub fn elevated(self) -> Self {
        match self {
            RiskLevel::Safe => RiskLevel::Moderate,
            RiskLevel::Moderate => RiskLevel::Dangerous,
            RiskLevel::Dangerous => RiskLevel::Critical,
            RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Dangerous => "dangerous",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Infrastructure operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Restart,
    Stop,
    Reboot,
    Delete,
}

impl OperationType {
    /// All operation types, for stats aggregation
    pub const ALL: [OperationType; 5] = [
        OperationType::Query,
        OperationType::Restart,
        OperationType::Stop,
        OperationType::Reboot,
        OperationType::Delete,
    ];
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Query => "query",
            OperationType::Restart => "restart",
            OperationType::Stop => "stop",
            OperationType::Reboot => "reboot",
            OperationType::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Class of infrastructure target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Vm,
    Container,
    Service,
}

/// What an operation acts on (immutable once created)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTarget {
    /// Target class
    #[serde(rename = "type")]
    pub target_type: TargetType,
    /// Stable identifier (e.g. "vm-7")
    pub id: String,
    /// Human-readable name (e.g. "prod-db-01")
    pub name: String,
}

impl OperationTarget {
    pub fn new(target_type: TargetType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            target_type,
            id: id.into(),
            name: name.into(),
        }
    }
}
