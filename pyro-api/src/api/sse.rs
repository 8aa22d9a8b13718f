//! Server-Sent Events for analysis progress streaming
//!
//! One stream per analysis: named events with JSON payloads, a 15 second
//! heartbeat, and natural termination after the terminal `Completed`
//! event. Subscribing to an already-finished analysis replays the
//! terminal snapshot and completes immediately; it is not an error.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pyro_common::events::AnalysisEvent;

use crate::error::{ApiError, ApiResult};
use crate::registry::Subscription;
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

fn to_sse_event(event: &AnalysisEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: failed to serialize {} event: {}", event.event_type(), e);
            None
        }
    }
}

/// GET /api/analyze/:id/events - SSE progress stream for one analysis
pub async fn analysis_event_stream(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = state
        .registry
        .subscribe(analysis_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", analysis_id)))?;

    info!(%analysis_id, "new SSE client connected");

    let stream = async_stream::stream! {
        let connected = AnalysisEvent::Connected {
            analysis_id,
            timestamp: Utc::now(),
        };
        if let Some(event) = to_sse_event(&connected) {
            yield Ok(event);
        }

        match subscription {
            Subscription::Closed(record) => {
                // Late join: the channel is gone, the snapshot stands in
                // for the stream.
                let terminal = AnalysisEvent::Completed {
                    analysis_id,
                    status: record.status,
                    processing_time_seconds: record.processing_time_seconds(),
                    timestamp: Utc::now(),
                };
                if let Some(event) = to_sse_event(&terminal) {
                    yield Ok(event);
                }
                info!(%analysis_id, "SSE replayed terminal state to late subscriber");
            }
            Subscription::Live(mut rx) => {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                            debug!(%analysis_id, "SSE heartbeat");
                            yield Ok(Event::default().comment("heartbeat"));
                        }
                        received = rx.recv() => match received {
                            Ok(event) => {
                                let terminal = event.is_terminal();
                                if let Some(sse_event) = to_sse_event(&event) {
                                    yield Ok(sse_event);
                                }
                                if terminal {
                                    break;
                                }
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(%analysis_id, skipped, "SSE subscriber lagged, events dropped");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                break;
                            }
                        }
                    }
                }
                info!(%analysis_id, "SSE stream finished");
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    ))
}
