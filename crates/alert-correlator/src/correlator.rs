//! Alert ingestion, grouping, and lifecycle

use crate::root_cause::infer_root_cause;
use crate::types::{
    Alert, AlertInput, AlertType, CorrelationGroup, CorrelationGroupView, Severity,
};
use chrono::{DateTime, Duration, Utc};
use safety_config::SafetyConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Fixed causality table: (earlier condition, later condition) pairs
/// that commonly occur in one failure cascade.
const CAUSALITY: &[(AlertType, AlertType)] = &[
    (AlertType::NetworkIssue, AlertType::DnsIssue),
    (AlertType::NetworkIssue, AlertType::VmUnreachable),
    (AlertType::NetworkIssue, AlertType::ServiceDegraded),
    (AlertType::NetworkIssue, AlertType::ServiceDown),
    (AlertType::DnsIssue, AlertType::ServiceDegraded),
    (AlertType::DnsIssue, AlertType::ServiceDown),
    (AlertType::VmUnreachable, AlertType::ServiceDegraded),
    (AlertType::VmUnreachable, AlertType::ServiceDown),
    (AlertType::ResourceExhaustion, AlertType::ServiceDegraded),
    (AlertType::ResourceExhaustion, AlertType::HealthCheckFailed),
];

/// Aggregate correlator diagnostics, recomputed on demand
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatorStats {
    pub total_alerts: usize,
    pub unresolved_alerts: usize,
    pub groups: usize,
    pub by_severity: HashMap<Severity, usize>,
}

struct CorrelatorState {
    alerts: HashMap<Uuid, Alert>,
    groups: Vec<CorrelationGroup>,
}

/// Clusters alerts into correlation groups with inferred root causes
pub struct AlertCorrelator {
    config: Arc<SafetyConfig>,
    state: Mutex<CorrelatorState>,
}

fn within_window(a: &Alert, b: &Alert, window: Duration) -> bool {
    (a.timestamp - b.timestamp).abs() <= window
}

/// Whether two alerts share a correlating signal: same source, same
/// host, a topological relation (one runs on the other), or a pair in
/// the causality table ordered by timestamp.
fn correlates(a: &Alert, b: &Alert) -> bool {
    if a.source.id == b.source.id {
        return true;
    }

    if let (Some(ha), Some(hb)) = (&a.source.host, &b.source.host) {
        if ha == hb {
            return true;
        }
    }

    let a_runs_on_b = a
        .source
        .host
        .as_ref()
        .is_some_and(|h| *h == b.source.id || *h == b.source.name);
    let b_runs_on_a = b
        .source
        .host
        .as_ref()
        .is_some_and(|h| *h == a.source.id || *h == a.source.name);
    if a_runs_on_b || b_runs_on_a {
        return true;
    }

    let (earlier, later) = if a.timestamp <= b.timestamp {
        (a, b)
    } else {
        (b, a)
    };
    CAUSALITY.contains(&(earlier.alert_type, later.alert_type))
}

impl AlertCorrelator {
    pub fn new(config: Arc<SafetyConfig>) -> Self {
        Self {
            config,
            state: Mutex::new(CorrelatorState {
                alerts: HashMap::new(),
                groups: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CorrelatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn window(&self) -> Duration {
        Duration::milliseconds(self.config.correlation_window_ms)
    }

    /// Ingest an alert, correlating it into a group when a signal links
    /// it to existing alerts within the correlation window
    pub fn add_alert(&self, input: AlertInput) -> Alert {
        self.ingest_at(input, Utc::now())
    }

    fn ingest_at(&self, input: AlertInput, now: DateTime<Utc>) -> Alert {
        let window = self.window();
        let mut state = self.state();

        let mut alert = Alert {
            id: Uuid::new_v4(),
            source: input.source,
            alert_type: input.alert_type,
            severity: input.severity,
            message: input.message,
            timestamp: now,
            correlation_id: None,
            resolved: false,
            resolved_at: None,
            acknowledged_at: None,
            related_alert_ids: Vec::new(),
        };

        // Prefer joining an existing group over opening a new one.
        let joined = state.groups.iter().position(|group| {
            group.alert_ids.iter().any(|member_id| {
                state
                    .alerts
                    .get(member_id)
                    .is_some_and(|member| {
                        within_window(&alert, member, window) && correlates(&alert, member)
                    })
            })
        });

        if let Some(idx) = joined {
            let group = &mut state.groups[idx];
            alert.correlation_id = Some(group.id);
            alert.related_alert_ids = group.alert_ids.clone();
            group.alert_ids.push(alert.id);
            group.updated_at = now;
            debug!(alert = %alert.id, group = %group.id, "Alert joined existing group");
        } else {
            // Pair with a correlated ungrouped alert, or stay uncorrelated.
            let partner = state
                .alerts
                .values()
                .find(|other| {
                    other.correlation_id.is_none()
                        && within_window(&alert, other, window)
                        && correlates(&alert, other)
                })
                .map(|other| other.id);

            if let Some(partner_id) = partner {
                let group_id = Uuid::new_v4();
                state.groups.push(CorrelationGroup {
                    id: group_id,
                    alert_ids: vec![partner_id, alert.id],
                    root_cause: None,
                    created_at: now,
                    updated_at: now,
                });
                if let Some(partner) = state.alerts.get_mut(&partner_id) {
                    partner.correlation_id = Some(group_id);
                    partner.related_alert_ids = vec![alert.id];
                }
                alert.correlation_id = Some(group_id);
                alert.related_alert_ids = vec![partner_id];
                info!(group = %group_id, "Opened new correlation group");
            }
        }

        state.alerts.insert(alert.id, alert.clone());
        if let Some(group_id) = alert.correlation_id {
            Self::recompute_root_cause(&mut state, group_id);
        }

        info!(
            alert = %alert.id,
            source = %alert.source.name,
            severity = ?alert.severity,
            correlated = alert.correlation_id.is_some(),
            "Alert ingested"
        );
        alert
    }

    fn recompute_root_cause(state: &mut CorrelatorState, group_id: Uuid) {
        let CorrelatorState { alerts, groups } = state;
        let Some(group) = groups.iter_mut().find(|g| g.id == group_id) else {
            return;
        };
        let members: Vec<&Alert> = group
            .alert_ids
            .iter()
            .filter_map(|id| alerts.get(id))
            .collect();
        group.root_cause = infer_root_cause(&members);
    }

    /// Mark one alert resolved; `false` when the id is unknown
    pub fn resolve_alert(&self, id: Uuid) -> bool {
        let mut state = self.state();
        match state.alerts.get_mut(&id) {
            Some(alert) => {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now());
                info!(alert = %id, "Alert resolved");
                true
            }
            None => false,
        }
    }

    /// Mark one alert acknowledged; `false` when the id is unknown
    pub fn acknowledge_alert(&self, id: Uuid) -> bool {
        let mut state = self.state();
        match state.alerts.get_mut(&id) {
            Some(alert) => {
                alert.acknowledged_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Resolve every alert in a group under one critical section
    pub fn resolve_correlation_group(&self, group_id: Uuid) -> bool {
        let mut state = self.state();
        let Some(idx) = state.groups.iter().position(|g| g.id == group_id) else {
            return false;
        };

        let member_ids = state.groups[idx].alert_ids.clone();
        let now = Utc::now();
        for id in member_ids {
            if let Some(alert) = state.alerts.get_mut(&id) {
                alert.resolved = true;
                alert.resolved_at = Some(now);
            }
        }
        state.groups[idx].updated_at = now;
        info!(group = %group_id, "Correlation group resolved");
        true
    }

    /// Evict alerts older than the retention window
    ///
    /// Pruned alerts are removed from their groups; affected groups get
    /// their root cause recomputed, and emptied groups are deleted.
    pub fn evict_expired(&self) -> usize {
        self.evict_at(Utc::now())
    }

    fn evict_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::milliseconds(self.config.alert_retention_ms);
        let mut state = self.state();

        let expired: Vec<Uuid> = state
            .alerts
            .values()
            .filter(|a| a.timestamp < cutoff)
            .map(|a| a.id)
            .collect();
        if expired.is_empty() {
            return 0;
        }

        for id in &expired {
            state.alerts.remove(id);
        }

        let mut affected: Vec<Uuid> = Vec::new();
        for group in state.groups.iter_mut() {
            let before = group.alert_ids.len();
            group.alert_ids.retain(|id| !expired.contains(id));
            if group.alert_ids.len() < before {
                affected.push(group.id);
            }
        }
        state.groups.retain(|g| !g.alert_ids.is_empty());
        for group_id in affected {
            Self::recompute_root_cause(&mut state, group_id);
        }

        info!(evicted = expired.len(), "Evicted expired alerts");
        expired.len()
    }

    /// Look up a single alert
    pub fn get_alert(&self, id: Uuid) -> Option<Alert> {
        self.state().alerts.get(&id).cloned()
    }

    /// Unresolved alerts, oldest first
    pub fn unresolved_alerts(&self) -> Vec<Alert> {
        let state = self.state();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| !a.resolved)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.timestamp);
        alerts
    }

    /// All correlation groups with member alerts materialized
    pub fn correlation_groups(&self) -> Vec<CorrelationGroupView> {
        let state = self.state();
        state
            .groups
            .iter()
            .map(|group| CorrelationGroupView {
                id: group.id,
                alerts: group
                    .alert_ids
                    .iter()
                    .filter_map(|id| state.alerts.get(id).cloned())
                    .collect(),
                root_cause: group.root_cause.clone(),
                created_at: group.created_at,
                updated_at: group.updated_at,
            })
            .collect()
    }

    /// Aggregate diagnostics, recomputed on demand (not cached)
    pub fn stats(&self) -> CorrelatorStats {
        let state = self.state();
        let mut by_severity: HashMap<Severity, usize> = HashMap::new();
        let mut unresolved = 0usize;
        for alert in state.alerts.values() {
            *by_severity.entry(alert.severity).or_insert(0) += 1;
            if !alert.resolved {
                unresolved += 1;
            }
        }
        CorrelatorStats {
            total_alerts: state.alerts.len(),
            unresolved_alerts: unresolved,
            groups: state.groups.len(),
            by_severity,
        }
    }

    /// All alert records, for persistence
    pub fn snapshot_alerts(&self) -> Vec<Alert> {
        self.state().alerts.values().cloned().collect()
    }

    /// All group records, for persistence
    pub fn snapshot_groups(&self) -> Vec<CorrelationGroup> {
        self.state().groups.clone()
    }

    /// Replace alert and group state from a persisted snapshot
    pub fn restore(&self, alerts: Vec<Alert>, groups: Vec<CorrelationGroup>) {
        let mut state = self.state();
        state.alerts = alerts.into_iter().map(|a| (a.id, a)).collect();
        state.groups = groups;
        info!(
            alerts = state.alerts.len(),
            groups = state.groups.len(),
            "Restored correlator state from snapshot"
        );
    }
}
