//! pyro-api library interface
//!
//! Exposes the application state, router, and pipeline components for the
//! binary and for integration testing.

pub mod api;
pub mod error;
pub mod fusion;
pub mod orchestrator;
pub mod providers;
pub mod registry;

pub use crate::error::{ApiError, ApiResult};

use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use pyro_common::config::TomlConfig;

use crate::fusion::RiskPolicy;
use crate::orchestrator::AnalysisOrchestrator;
use crate::providers::ProviderSet;
use crate::registry::AnalysisRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TomlConfig>,
    /// Keyed store of analyses plus their progress channels
    pub registry: AnalysisRegistry,
    /// Provider adapters (probed by /api/system-status)
    pub providers: Arc<ProviderSet>,
    pub orchestrator: AnalysisOrchestrator,
    /// Cancellation tokens for in-flight analyses
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: TomlConfig, providers: ProviderSet) -> Self {
        let providers = Arc::new(providers);
        let registry = AnalysisRegistry::new(config.analysis.channel_capacity);
        let orchestrator = AnalysisOrchestrator::new(
            registry.clone(),
            Arc::clone(&providers),
            RiskPolicy::from(&config.risk),
            Duration::from_secs(config.analysis.budget_secs),
        );

        Self {
            config: Arc::new(config),
            registry,
            providers,
            orchestrator,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .route(
            "/api/analyze/:analysis_id/events",
            get(api::analysis_event_stream),
        )
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        // The map client is served from a different origin in the demo
        .layer(CorsLayer::permissive())
        .with_state(state)
}
