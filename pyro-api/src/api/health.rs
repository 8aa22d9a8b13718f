//! Health and system-status endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::ProviderHealth;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// System status response with per-provider reachability
#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub system: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub providers: Vec<ProviderHealth>,
    pub overall_status: String,
    pub active_analyses: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "pyro-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
    })
}

/// GET /api/system-status
///
/// Probes every configured provider concurrently. Operator/demo surface;
/// the orchestration logic never consults this.
pub async fn system_status(State(state): State<AppState>) -> Json<SystemStatusResponse> {
    let providers = state.providers.probe_all().await;

    let degraded = providers.iter().any(|p| p.status == "error");
    let overall_status = if degraded { "degraded" } else { "operational" };

    Json(SystemStatusResponse {
        system: "PyroGuard Sentinel".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        providers,
        overall_status: overall_status.to_string(),
        active_analyses: state.registry.len().await,
    })
}

/// Build health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/system-status", get(system_status))
}
