//! Analysis API handlers
//!
//! POST /api/analyze, GET /api/analyze/:id/result,
//! POST /api/analyze/:id/cancel, GET /api/demo-locations

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pyro_common::geo::{HAWAII_MAX_LAT, HAWAII_MAX_LON, HAWAII_MIN_LAT, HAWAII_MIN_LON};
use pyro_common::model::{AnalysisRecord, AnalysisRequest, AnalysisStatus};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /api/analyze response
#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisStatus,
    pub coordinates: Coordinates,
    pub demo_mode: bool,
    pub estimated_completion_seconds: u64,
    pub progress_url: String,
    pub result_url: String,
}

#[derive(Debug, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// POST /api/analyze/:id/cancel response
#[derive(Debug, Serialize)]
pub struct CancelAnalysisResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisStatus,
    pub cancellation_requested: bool,
}

/// POST /api/analyze
///
/// Validate the coordinates, register the analysis, and kick off the
/// orchestrator in the background. Returns immediately with the id; the
/// analysis proceeds asynchronously.
pub async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Json<StartAnalysisResponse>> {
    // Synchronous precondition: no record exists for rejected coordinates
    if !request.coordinates().is_in_hawaii() {
        return Err(ApiError::Validation(format!(
            "Analysis is only supported for the Hawaiian Islands \
             ({}-{}\u{00b0}N, {}-{}\u{00b0}W)",
            HAWAII_MIN_LAT, HAWAII_MAX_LAT, HAWAII_MIN_LON, HAWAII_MAX_LON
        )));
    }

    let record = AnalysisRecord::new(request.clone());
    let analysis_id = record.id;
    state.registry.insert(record).await;

    let cancel_token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(analysis_id, cancel_token.clone());

    tracing::info!(
        %analysis_id,
        latitude = request.latitude,
        longitude = request.longitude,
        demo_mode = request.demo_mode,
        "analysis submitted"
    );

    // Background orchestration; the token map entry is cleaned up when
    // the run finishes either way.
    let orchestrator = state.orchestrator.clone();
    let tokens = state.cancellation_tokens.clone();
    tokio::spawn(async move {
        orchestrator.run(analysis_id, cancel_token).await;
        tokens.write().await.remove(&analysis_id);
    });

    Ok(Json(StartAnalysisResponse {
        analysis_id,
        status: AnalysisStatus::Processing,
        coordinates: Coordinates {
            latitude: request.latitude,
            longitude: request.longitude,
        },
        demo_mode: request.demo_mode,
        estimated_completion_seconds: if request.demo_mode { 4 } else { 12 },
        progress_url: format!("/api/analyze/{}/events", analysis_id),
        result_url: format!("/api/analyze/{}/result", analysis_id),
    }))
}

/// GET /api/analyze/:id/result
///
/// Full record snapshot, including partial observations while in flight.
pub async fn get_analysis_result(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> ApiResult<Json<AnalysisRecord>> {
    let record = state
        .registry
        .snapshot(analysis_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", analysis_id)))?;
    Ok(Json(record))
}

/// POST /api/analyze/:id/cancel
///
/// Stop awaiting outstanding providers; the analysis finishes on the
/// timeout path without waiting for them.
pub async fn cancel_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> ApiResult<Json<CancelAnalysisResponse>> {
    let record = state
        .registry
        .snapshot(analysis_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", analysis_id)))?;

    if record.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Analysis {} already in terminal state {}",
            analysis_id, record.status
        )));
    }

    let cancelled = {
        let tokens = state.cancellation_tokens.read().await;
        match tokens.get(&analysis_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    };

    tracing::info!(%analysis_id, cancelled, "analysis cancellation requested");

    Ok(Json(CancelAnalysisResponse {
        analysis_id,
        status: record.status,
        cancellation_requested: cancelled,
    }))
}

/// GET /api/demo-locations
///
/// Fixed coordinate presets for quick demos.
pub async fn get_demo_locations() -> Json<Value> {
    Json(json!({
        "locations": [
            {
                "name": "West Maui (High Risk)",
                "latitude": 20.9801,
                "longitude": -156.6927,
                "description": "Dry grasslands near power infrastructure"
            },
            {
                "name": "Big Island Volcano Area",
                "latitude": 19.7633,
                "longitude": -155.5739,
                "description": "Active volcanic region with vegetation"
            },
            {
                "name": "Oahu North Shore",
                "latitude": 21.6389,
                "longitude": -158.0001,
                "description": "Coastal area with moderate vegetation"
            },
            {
                "name": "Honolulu",
                "latitude": 21.3099,
                "longitude": -157.8581,
                "description": "Urban area with dense power grid"
            }
        ]
    }))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(start_analysis))
        .route("/api/analyze/:analysis_id/result", get(get_analysis_result))
        .route("/api/analyze/:analysis_id/cancel", post(cancel_analysis))
        .route("/api/demo-locations", get(get_demo_locations))
}
