//! Progress event types for the analysis pipeline
//!
//! Events are published to a per-analysis broadcast channel and serialized
//! for SSE transmission. All events use this central enum for type safety
//! and exhaustive matching.
//!
//! Ordering guarantees within one analysis:
//! - the three `ObservationUpdated` events may arrive in any relative order;
//! - `RiskComputed` occurs only after all three `ObservationUpdated` events;
//! - `TicketCreated` (if any) occurs only after `RiskComputed`;
//! - `Completed` is always the last event on the channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AnalysisStatus, ProviderKind, ProviderObservation, RiskAssessment};

/// Progress events for one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Subscriber handshake, emitted once per SSE connection
    Connected {
        analysis_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A provider slot resolved (with data or with a failure marker)
    ObservationUpdated {
        analysis_id: Uuid,
        kind: ProviderKind,
        observation: ProviderObservation,
        timestamp: DateTime<Utc>,
    },

    /// Fusion produced the composite risk assessment
    RiskComputed {
        analysis_id: Uuid,
        assessment: RiskAssessment,
        timestamp: DateTime<Utc>,
    },

    /// The incident-automation step created a ticket
    TicketCreated {
        analysis_id: Uuid,
        ticket_url: String,
        timestamp: DateTime<Utc>,
    },

    /// Terminal event; the channel closes after this
    Completed {
        analysis_id: Uuid,
        status: AnalysisStatus,
        processing_time_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Internal orchestration fault surfaced to subscribers
    Errored {
        analysis_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl AnalysisEvent {
    /// Get event type as string for SSE event names and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "Connected",
            Self::ObservationUpdated { .. } => "ObservationUpdated",
            Self::RiskComputed { .. } => "RiskComputed",
            Self::TicketCreated { .. } => "TicketCreated",
            Self::Completed { .. } => "Completed",
            Self::Errored { .. } => "Errored",
        }
    }

    /// The analysis this event belongs to
    pub fn analysis_id(&self) -> Uuid {
        match self {
            Self::Connected { analysis_id, .. }
            | Self::ObservationUpdated { analysis_id, .. }
            | Self::RiskComputed { analysis_id, .. }
            | Self::TicketCreated { analysis_id, .. }
            | Self::Completed { analysis_id, .. }
            | Self::Errored { analysis_id, .. } => *analysis_id,
        }
    }

    /// True for the terminal event of a channel
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObservationOutcome, ProviderFailure};

    #[test]
    fn test_event_type_names() {
        let id = Uuid::new_v4();
        let event = AnalysisEvent::Completed {
            analysis_id: id,
            status: AnalysisStatus::Completed,
            processing_time_seconds: 4.2,
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "Completed");
        assert_eq!(event.analysis_id(), id);
        assert!(event.is_terminal());
    }

    #[test]
    fn test_event_serialization_is_type_tagged() {
        let event = AnalysisEvent::ObservationUpdated {
            analysis_id: Uuid::new_v4(),
            kind: ProviderKind::Weather,
            observation: ProviderObservation::Weather(ObservationOutcome::failure(
                ProviderFailure::Timeout,
            )),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ObservationUpdated\""), "json: {}", json);
        assert!(json.contains("\"kind\":\"weather\""), "json: {}", json);

        let parsed: AnalysisEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type(), "ObservationUpdated");
        assert!(!parsed.is_terminal());
    }
}
