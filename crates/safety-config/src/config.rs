//! Engine-wide safety configuration
//!
//! Loaded once at process start and treated as read-only afterwards.
//! Layering: struct defaults, then an optional config file, then
//! `OPSGATE_*` environment overrides.

use crate::types::{OperationType, RiskLevel};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Per-operation-type safety policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OperationPolicy {
    /// Base risk before target elevation
    pub base_risk: RiskLevel,
    /// Minimum gap between executions of the same (type, target) pair
    pub cooldown_ms: u64,
    /// Retry budget for failed operations
    pub max_retries: u32,
}

/// Which risk levels require a human confirmation step
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    pub safe: bool,
    pub moderate: bool,
    pub dangerous: bool,
    pub critical: bool,
}

impl ConfirmationPolicy {
    pub fn requires(&self, risk: RiskLevel) -> bool {
        match risk {
            RiskLevel::Safe => self.safe,
            RiskLevel::Moderate => self.moderate,
            RiskLevel::Dangerous => self.dangerous,
            RiskLevel::Critical => self.critical,
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            safe: false,
            moderate: false,
            dangerous: true,
            critical: true,
        }
    }
}

/// Engine-wide safety configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub query: OperationPolicy,
    pub restart: OperationPolicy,
    pub stop: OperationPolicy,
    pub reboot: OperationPolicy,
    pub delete: OperationPolicy,
    /// Confirmation requirement per risk level
    pub confirmation: ConfirmationPolicy,
    /// Window within which alerts are considered for the same group
    pub correlation_window_ms: i64,
    /// Age past which alerts become eligible for eviction
    pub alert_retention_ms: i64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            query: OperationPolicy {
                base_risk: RiskLevel::Safe,
                cooldown_ms: 5_000,
                max_retries: 3,
            },
            restart: OperationPolicy {
                base_risk: RiskLevel::Moderate,
                cooldown_ms: 30_000,
                max_retries: 3,
            },
            stop: OperationPolicy {
                base_risk: RiskLevel::Dangerous,
                cooldown_ms: 60_000,
                max_retries: 2,
            },
            reboot: OperationPolicy {
                base_risk: RiskLevel::Dangerous,
                cooldown_ms: 120_000,
                max_retries: 2,
            },
            delete: OperationPolicy {
                base_risk: RiskLevel::Critical,
                cooldown_ms: 300_000,
                max_retries: 1,
            },
            confirmation: ConfirmationPolicy::default(),
            correlation_window_ms: 300_000,  // 5 minutes
            alert_retention_ms: 86_400_000,  // 24 hours
        }
    }
}

impl SafetyConfig {
    /// Policy table lookup for an operation type
    pub fn policy(&self, op: OperationType) -> &OperationPolicy {
        match op {
            OperationType::Query => &self.query,
            OperationType::Restart => &self.restart,
            OperationType::Stop => &self.stop,
            OperationType::Reboot => &self.reboot,
            OperationType::Delete => &self.delete,
        }
    }

    /// Cooldown for an operation type as a `Duration`
    pub fn cooldown(&self, op: OperationType) -> Duration {
        Duration::from_millis(self.policy(op).cooldown_ms)
    }

    /// Whether the given risk level requires human confirmation
    pub fn requires_confirmation(&self, risk: RiskLevel) -> bool {
        self.confirmation.requires(risk)
    }

    /// Load configuration with layered sources
    ///
    /// Defaults < optional file < `OPSGATE_*` environment variables
    /// (`__` separates nesting, e.g. `OPSGATE_RESTART__COOLDOWN_MS=10000`).
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&SafetyConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("OPSGATE")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: SafetyConfig = builder.build()?.try_deserialize()?;
        info!(
            correlation_window_ms = loaded.correlation_window_ms,
            alert_retention_ms = loaded.alert_retention_ms,
            "Loaded safety configuration"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let config = SafetyConfig::default();

        assert_eq!(config.policy(OperationType::Restart).cooldown_ms, 30_000);
        assert_eq!(config.policy(OperationType::Delete).base_risk, RiskLevel::Critical);
        assert_eq!(config.policy(OperationType::Delete).max_retries, 1);
    }

    #[test]
    fn test_confirmation_gate() {
        let config = SafetyConfig::default();

        assert!(!config.requires_confirmation(RiskLevel::Safe));
        assert!(!config.requires_confirmation(RiskLevel::Moderate));
        assert!(config.requires_confirmation(RiskLevel::Dangerous));
        assert!(config.requires_confirmation(RiskLevel::Critical));
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = SafetyConfig::load(None).unwrap();
        assert_eq!(config.correlation_window_ms, 300_000);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = SafetyConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SafetyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reboot.cooldown_ms, config.reboot.cooldown_ms);
    }
}
