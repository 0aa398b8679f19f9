//! Clinical Triage Failover API Server
//!
//! REST surface over the failover orchestrator: evaluation endpoints, the
//! stored audit trail, tier health and Prometheus metrics.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clinical_protocol::Tier;
use failover::{ConfigError, FailoverOrchestrator};
use health_probe::BreakerState;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use model_adapter::{PrimaryModelAdapter, ProviderConfig, SecondaryModelAdapter};
use response_validator::ResponseNormalizer;
use rule_engine::{RuleEngine, RuleSet, RuleSetError};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod config;
pub mod error;
pub mod rate_limit;

mod routes {
    pub mod evaluate;
    pub mod evaluations;
}

pub use self::config::{AppConfig, LoggingConfig, ServerConfig};
pub use error::ApiError;
pub use rate_limit::{create_governor_config, RateLimitConfig};

use storage::Repository;

/// Startup failures, reported by `main`
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid failover config: {0}")]
    Failover(#[from] ConfigError),

    #[error("Invalid rule tables: {0}")]
    Rules(#[from] RuleSetError),

    #[error("Logging init failed: {0}")]
    Logging(String),

    #[error("Metrics recorder install failed: {0}")]
    Metrics(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: FailoverOrchestrator,
    pub repository: Repository,
    /// Present when a Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// State around an already built orchestrator
    pub fn new(orchestrator: FailoverOrchestrator, repository: Repository) -> Self {
        Self {
            orchestrator,
            repository,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Build the full pipeline from configuration.
    ///
    /// Remote tiers are wired only when enabled and their credential
    /// variable is set; the others are skipped at evaluation time.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        Self::from_config_with_rules(config, RuleSet::standard())
    }

    /// As `from_config`, over the given rule tables
    pub fn from_config_with_rules(config: &AppConfig, rules: RuleSet) -> Result<Self, StartupError> {
        config.failover.validate()?;
        let rules = RuleEngine::try_with_rules(rules)?;

        let mut orchestrator = FailoverOrchestrator::new(config.failover.clone(), rules)
            .with_normalizer(ResponseNormalizer::new(config.normalizer.clone()));

        match provider_key(&config.primary) {
            Some(key) => {
                orchestrator = orchestrator
                    .with_primary(Arc::new(PrimaryModelAdapter::new(config.primary.clone(), key)))?;
            }
            None => warn!(env = %config.primary.api_key_env, "Primary tier disabled or missing credential"),
        }
        match provider_key(&config.secondary) {
            Some(key) => {
                orchestrator = orchestrator
                    .with_secondary(Arc::new(SecondaryModelAdapter::new(config.secondary.clone(), key)))?;
            }
            None => warn!(env = %config.secondary.api_key_env, "Secondary tier disabled or missing credential"),
        }

        Ok(Self::new(orchestrator, Repository::new(config.storage.clone())))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

fn provider_key(config: &ProviderConfig) -> Option<String> {
    if !config.enabled {
        return None;
    }
    std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" when every configured remote tier is closed, else "degraded"
    pub status: &'static str,
    pub version: String,
    pub uptime_seconds: u64,
    pub tiers: Vec<TierHealth>,
    pub stored_evaluations: usize,
}

/// Per-tier health entry
#[derive(Debug, Serialize)]
pub struct TierHealth {
    pub tier: Tier,
    pub configured: bool,
    pub state: BreakerState,
    pub consecutive_failures: u32,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/evaluate", post(routes::evaluate::evaluate))
        .route("/api/v1/risk-check", post(routes::evaluate::risk_check))
        .route("/api/v1/medicine-info", post(routes::evaluate::medicine_info))
        .route("/api/v1/evaluations", get(routes::evaluations::list_evaluations))
        .route("/api/v1/evaluations/:id", get(routes::evaluations::get_evaluation))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let probe = state.orchestrator.health_probe();
    let now = chrono::Utc::now();

    let tiers: Vec<TierHealth> = Tier::ALL
        .iter()
        .map(|&tier| TierHealth {
            tier,
            configured: state.orchestrator.is_configured(tier),
            state: probe.state_at(tier, now),
            consecutive_failures: probe.health(tier).map_or(0, |h| h.consecutive_failures),
        })
        .collect();

    let degraded = tiers
        .iter()
        .any(|t| t.tier.is_remote() && t.configured && t.state != BreakerState::Closed);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tiers,
        stored_evaluations: state.repository.count(),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over the configured level
pub fn init_logging(config: &LoggingConfig) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| StartupError::Logging(e.to_string()))?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| StartupError::Logging(e.to_string()))
}

/// Run the server until it fails
pub async fn run_server(config: AppConfig) -> Result<(), StartupError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Metrics(e.to_string()))?;

    let state = Arc::new(AppState::from_config(&config)?.with_metrics(handle));
    let mut app = create_router(state);

    match create_governor_config(&config.server.rate_limit) {
        Some(governor) => app = app.layer(GovernorLayer { config: governor }),
        None => warn!(rate_limit = ?config.server.rate_limit, "Invalid rate limit config, rate limiting disabled"),
    }

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
