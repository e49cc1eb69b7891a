//! Risk classification rules

use safety_config::{OperationTarget, OperationType, RiskLevel, SafetyConfig, TargetType};
use std::cmp::Ordering;
use tracing::debug;

/// Name/id fragments that signal a production-critical target.
///
/// Matching is case-insensitive substring search over both the target
/// name and the target id.
const PRODUCTION_PATTERNS: &[&str] = &[
    "prod",
    "production",
    "master",
    "primary",
    "main",
    "database",
    "db-",
    "gateway",
    "load-balancer",
    "loadbalancer",
    "lb-",
];

fn matches_production_pattern(target: &OperationTarget) -> bool {
    let name = target.name.to_lowercase();
    let id = target.id.to_lowercase();
    PRODUCTION_PATTERNS
        .iter()
        .any(|p| name.contains(p) || id.contains(p))
}

/// Assess the risk of an operation against a target
///
/// 1. Base risk comes from the per-operation policy table.
/// 2. VM targets bump `Moderate -> Dangerous` and `Dangerous -> Critical`
///    (stopping a host costs more than stopping a container).
/// 3. Production-signal names/ids elevate one further level, capped
///    at `Critical`.
pub fn assess_risk(op: OperationType, target: &OperationTarget, config: &SafetyConfig) -> RiskLevel {
    let base = config.policy(op).base_risk;

    let class_adjusted = if target.target_type == TargetType::Vm {
        match base {
            RiskLevel::Moderate => RiskLevel::Dangerous,
            RiskLevel::Dangerous => RiskLevel::Critical,
            other => other,
        }
    } else {
        base
    };

    let assessed = if matches_production_pattern(target) {
        class_adjusted.elevated()
    } else {
        class_adjusted
    };

    if assessed > base {
        debug!(
            op = %op,
            target = %target.name,
            base = %base,
            assessed = %assessed,
            "Risk elevated for target"
        );
    }

    assessed
}

/// Total-order comparison over the four risk levels
pub fn compare_risk_levels(a: RiskLevel, b: RiskLevel) -> Ordering {
    a.cmp(&b)
}

/// The higher of two risk levels
pub fn max_risk_level(a: RiskLevel, b: RiskLevel) -> RiskLevel {
    a.max(b)
}

/// Whether `level` is at or above `threshold`
pub fn is_risk_at_or_above(level: RiskLevel, threshold: RiskLevel) -> bool {
    level >= threshold
}

/// Whether the assessed risk level requires human confirmation
pub fn requires_confirmation(risk: RiskLevel, config: &SafetyConfig) -> bool {
    config.requires_confirmation(risk)
}

/// Configured cooldown for an operation type (milliseconds)
pub fn cooldown_ms(op: OperationType, config: &SafetyConfig) -> u64 {
    config.policy(op).cooldown_ms
}

/// Configured retry budget for an operation type
pub fn max_retries(op: OperationType, config: &SafetyConfig) -> u32 {
    config.policy(op).max_retries
}
