//! Alert Correlation
//!
//! Clusters incoming health alerts into likely-related groups and infers
//! a best-guess root cause per group, so operators see "one network
//! issue" instead of fifty unrelated alerts.
//!
//! Correlation and inference never fail: an implausible group gets an
//! `Unknown` cause with floor confidence, never an error.

mod correlator;
mod root_cause;
mod types;

pub use correlator::{AlertCorrelator, CorrelatorStats};
pub use root_cause::{RootCause, RootCauseType};
pub use types::{
    Alert, AlertInput, AlertSource, AlertType, CorrelationGroup, CorrelationGroupView, Severity,
};
