//! Operation Safety Engine API Server
//!
//! REST surface over the authorization engine and alert correlator for
//! UI sessions and automation agents.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod error;
mod rate_limit;
mod routes;

pub use error::ApiError;
pub use rate_limit::{create_governor_config, RateLimitConfig};

use alert_correlator::AlertCorrelator;
use cooldown_limiter::CooldownLimiter;
use op_authorizer::OperationAuthorizer;
use safety_config::SafetyConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SafetyConfig>,
    pub cooldowns: Arc<CooldownLimiter>,
    pub authorizer: Arc<OperationAuthorizer>,
    pub correlator: Arc<AlertCorrelator>,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire up a fresh engine around one shared configuration
    pub fn new(config: Arc<SafetyConfig>) -> Self {
        let cooldowns = Arc::new(CooldownLimiter::new(Arc::clone(&config)));
        let authorizer = Arc::new(OperationAuthorizer::new(
            Arc::clone(&config),
            Arc::clone(&cooldowns),
        ));
        let correlator = Arc::new(AlertCorrelator::new(Arc::clone(&config)));
        Self {
            config,
            cooldowns,
            authorizer,
            correlator,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Attach the executor that dispatches authorized operations
    ///
    /// Must be called before any operation is queued: it rebuilds the
    /// (still empty) authorizer around the executor.
    pub fn with_executor(mut self, executor: Arc<dyn op_authorizer::OperationExecutor>) -> Self {
        self.authorizer = Arc::new(
            OperationAuthorizer::new(Arc::clone(&self.config), Arc::clone(&self.cooldowns))
                .with_executor(executor),
        );
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub pending_operations: usize,
    pub unresolved_alerts: usize,
    pub active_cooldowns: usize,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/operations",
            post(routes::operations::queue_operation),
        )
        .route(
            "/api/v1/operations/assess",
            post(routes::operations::assess_operation),
        )
        .route(
            "/api/v1/operations/pending",
            get(routes::operations::pending_operations),
        )
        .route("/api/v1/operations/:id", get(routes::operations::get_operation))
        .route(
            "/api/v1/operations/:id/approve",
            post(routes::operations::approve_operation),
        )
        .route(
            "/api/v1/operations/:id/reject",
            post(routes::operations::reject_operation),
        )
        .route(
            "/api/v1/operations/:id/execute",
            post(routes::operations::execute_operation),
        )
        .route(
            "/api/v1/operations/:id/cancel",
            post(routes::operations::cancel_operation),
        )
        .route(
            "/api/v1/operations/:id/retry",
            post(routes::operations::retry_operation),
        )
        .route("/api/v1/alerts", post(routes::alerts::add_alert))
        .route("/api/v1/alerts", get(routes::alerts::list_alerts))
        .route(
            "/api/v1/alerts/:id/acknowledge",
            post(routes::alerts::acknowledge_alert),
        )
        .route("/api/v1/alerts/:id/resolve", post(routes::alerts::resolve_alert))
        .route(
            "/api/v1/correlation-groups",
            get(routes::alerts::list_correlation_groups),
        )
        .route(
            "/api/v1/correlation-groups/:id/resolve",
            post(routes::alerts::resolve_correlation_group),
        )
        .route(
            "/api/v1/cooldowns/:op_type/:target_id",
            get(routes::cooldowns::get_cooldown),
        )
        .route(
            "/api/v1/cooldowns/:op_type/:target_id",
            axum::routing::delete(routes::cooldowns::reset_cooldown),
        )
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        pending_operations: state.authorizer.pending_operations(None).len(),
        unresolved_alerts: state.correlator.unresolved_alerts().len(),
        active_cooldowns: state.cooldowns.stats().active_cooldowns,
    };
    Json(response)
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    // Ignore the error when a subscriber is already installed (tests)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Run the server
pub async fn run_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let governor_config = create_governor_config(&RateLimitConfig::default());

    let app = create_router(state)
        .layer(GovernorLayer {
            config: governor_config,
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
