//! Safety Types and Configuration
//!
//! Shared domain types for the operation safety engine, plus the
//! engine-wide [`SafetyConfig`] loaded once at process start.

mod config;
mod types;

pub use config::{ConfirmationPolicy, OperationPolicy, SafetyConfig};
pub use types::{OperationTarget, OperationType, RiskLevel, TargetType};
