//! HTTP Rate Limiting Middleware using GCRA Algorithm
//!
//! Edge rate limiting by client IP via tower_governor. This guards the
//! HTTP surface against floods; the per-(operation, target) execution
//! cooldown inside the engine is a separate, domain-level gate.

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Type alias for the governor config with default settings
/// StateInformationMiddleware is used when use_headers() is called to add X-RateLimit-* headers
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per second (replenishment rate)
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 2,
            burst_size: 10,
        }
    }
}

impl RateLimitConfig {
    /// Strict config for the mutating operation endpoints
    pub fn strict() -> Self {
        Self {
            per_second: 4,
            burst_size: 2,
        }
    }

    /// Lenient config for monitoring agents that push alert bursts
    pub fn lenient() -> Self {
        Self {
            per_second: 1,
            burst_size: 30,
        }
    }
}

/// Create a rate limiting governor config
///
/// Returns an Arc wrapped config that can be used with GovernorLayer.
/// Uses PeerIpKeyExtractor by default. Requires service to use
/// `into_make_service_with_connect_info::<SocketAddr>()` for IP extraction.
///
/// Adds X-RateLimit-* headers to responses for quota visibility.
pub fn create_governor_config(config: &RateLimitConfig) -> Arc<DefaultGovernorConfig> {
    Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.per_second)
            .burst_size(config.burst_size)
            .use_headers()
            .finish()
            .expect("governor config with non-zero rates is always valid"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.per_second, 2);
        assert_eq!(config.burst_size, 10);
    }

    #[test]
    fn test_create_governor_config() {
        let config = RateLimitConfig::lenient();
        let governor = create_governor_config(&config);
        assert!(Arc::strong_count(&governor) > 0);
    }
}
