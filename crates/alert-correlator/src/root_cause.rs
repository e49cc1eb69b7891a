//! Root-cause inference
//!
//! Picks the probable origin of a correlation group and derives a cause
//! type, a bounded confidence score, and suggested remediation steps.
//! Pure computation over the member alerts; cannot fail.

use crate::types::{Alert, AlertType, Severity};
use serde::{Deserialize, Serialize};

/// Confidence assigned to a group with a single, uncorroborated alert
const SINGLETON_CONFIDENCE: f64 = 0.3;

/// Inferred cause category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootCauseType {
    Network,
    Dns,
    Vm,
    Service,
    Resource,
    Unknown,
}

/// The engine's best inferred explanation for a correlation group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCause {
    pub cause_type: RootCauseType,
    pub description: String,
    /// Always in [0, 1]
    pub confidence: f64,
    pub affected_sources: Vec<String>,
    pub suggested_actions: Vec<String>,
}

/// Cause category implied by an alert type
pub(crate) fn cause_type_for(alert_type: AlertType) -> RootCauseType {
    match alert_type {
        AlertType::NetworkIssue => RootCauseType::Network,
        AlertType::DnsIssue => RootCauseType::Dns,
        AlertType::VmUnreachable => RootCauseType::Vm,
        AlertType::ServiceDegraded | AlertType::ServiceDown => RootCauseType::Service,
        AlertType::ResourceExhaustion => RootCauseType::Resource,
        AlertType::HealthCheckFailed => RootCauseType::Unknown,
    }
}

fn suggested_actions_for(cause_type: RootCauseType) -> Vec<String> {
    let actions: &[&str] = match cause_type {
        RootCauseType::Network => &[
            "Check interface and link status on the affected hosts",
            "Verify switch/router reachability along the path",
        ],
        RootCauseType::Dns => &[
            "Verify resolver reachability from the affected sources",
            "Check recent DNS zone or resolver configuration changes",
        ],
        RootCauseType::Vm => &[
            "Check hypervisor status for the affected VM",
            "Review recent VM lifecycle operations",
        ],
        RootCauseType::Service => &[
            "Inspect service logs on the affected sources",
            "Check recent deployments or configuration rollouts",
        ],
        RootCauseType::Resource => &[
            "Check CPU, memory, and disk utilization on the affected hosts",
            "Review quota and autoscaling limits",
        ],
        RootCauseType::Unknown => &[
            "Review the grouped alerts manually",
            "Check monitoring coverage for the affected sources",
        ],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

/// Infer the root cause of a group from its member alerts
///
/// Origin = highest-severity, earliest-timestamp member. Confidence
/// grows with corroborating alerts and cause-type agreement, capped at
/// 1.0; a singleton group stays below 0.5. Returns `None` only for an
/// empty member set.
pub(crate) fn infer_root_cause(alerts: &[&Alert]) -> Option<RootCause> {
    let origin = alerts
        .iter()
        .max_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        })?;

    let cause_type = cause_type_for(origin.alert_type);
    let confidence = confidence_for(alerts, cause_type);

    let mut affected_sources: Vec<String> = alerts.iter().map(|a| a.source.name.clone()).collect();
    affected_sources.sort();
    affected_sources.dedup();

    Some(RootCause {
        cause_type,
        description: format!(
            "Probable {:?} issue originating from {}: {}",
            cause_type, origin.source.name, origin.message
        ),
        confidence,
        affected_sources,
        suggested_actions: suggested_actions_for(cause_type),
    })
}

fn confidence_for(alerts: &[&Alert], cause_type: RootCauseType) -> f64 {
    let n = alerts.len();
    if n <= 1 {
        return SINGLETON_CONFIDENCE;
    }

    // Up to +0.4 from corroborating alerts
    let corroboration = 0.1 * (n - 1).min(4) as f64;

    // Up to +0.2 from cause-type agreement across the group
    let agreeing = alerts
        .iter()
        .filter(|a| cause_type_for(a.alert_type) == cause_type)
        .count();
    let agreement = 0.2 * (agreeing as f64 / n as f64);

    // +0.1 when the group has escalated to critical
    let escalation = if alerts.iter().any(|a| a.severity == Severity::Critical) {
        0.1
    } else {
        0.0
    };

    (SINGLETON_CONFIDENCE + corroboration + agreement + escalation).min(1.0)
}
