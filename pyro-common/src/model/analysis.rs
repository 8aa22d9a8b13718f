//! Analysis request and record state machine
//!
//! An analysis progresses `processing` → `completed | failed | timed_out`.
//! Transitions are forward-only: no record re-enters `processing`, and
//! terminal states are final.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;
use crate::model::{ObservationSet, RiskAssessment};

/// Immutable input for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Use cached/synthetic provider responses for deterministic, fast demos
    #[serde(default)]
    pub demo_mode: bool,
}

impl AnalysisRequest {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Analysis lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Providers in flight or fusion pending
    Processing,
    /// Terminal: assessment produced (ticket step may have been skipped)
    Completed,
    /// Terminal: internal orchestration fault, not a single provider failure
    Failed,
    /// Terminal: overall wall-clock budget exceeded or analysis cancelled
    TimedOut,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable aggregate root for one in-flight or completed analysis.
///
/// Mutated only by the orchestrator; adapters return values rather than
/// touching the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub request: AnalysisRequest,
    pub status: AnalysisStatus,
    pub observations: ObservationSet,
    pub risk_assessment: Option<RiskAssessment>,
    pub ticket_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl AnalysisRecord {
    /// Create a fresh record in `processing` with a generated id
    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            status: AnalysisStatus::Processing,
            observations: ObservationSet::default(),
            risk_assessment: None,
            ticket_url: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    /// Transition to a new status, enforcing forward-only movement.
    ///
    /// Returns false (and leaves the record untouched) if the record is
    /// already terminal or the target would re-enter `processing`.
    pub fn transition_to(&mut self, new_status: AnalysisStatus) -> bool {
        if self.status.is_terminal() || new_status == AnalysisStatus::Processing {
            return false;
        }
        self.status = new_status;
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed seconds from start to completion (or to now while in flight)
    pub fn processing_time_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> AnalysisRecord {
        AnalysisRecord::new(AnalysisRequest {
            latitude: 20.8783,
            longitude: -156.6825,
            demo_mode: true,
        })
    }

    #[test]
    fn test_new_record_is_processing() {
        let record = test_record();
        assert_eq!(record.status, AnalysisStatus::Processing);
        assert!(!record.is_terminal());
        assert!(record.completed_at.is_none());
        assert!(record.risk_assessment.is_none());
        assert!(record.ticket_url.is_none());
    }

    #[test]
    fn test_transition_to_terminal_sets_completed_at() {
        let mut record = test_record();
        assert!(record.transition_to(AnalysisStatus::Completed));
        assert!(record.is_terminal());
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn test_terminal_record_rejects_further_transitions() {
        let mut record = test_record();
        assert!(record.transition_to(AnalysisStatus::TimedOut));
        assert!(!record.transition_to(AnalysisStatus::Completed));
        assert!(!record.transition_to(AnalysisStatus::Failed));
        assert_eq!(record.status, AnalysisStatus::TimedOut);
    }

    #[test]
    fn test_cannot_reenter_processing() {
        let mut record = test_record();
        assert!(!record.transition_to(AnalysisStatus::Processing));
        assert_eq!(record.status, AnalysisStatus::Processing);
    }

    #[test]
    fn test_status_wire_format_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&AnalysisStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
    }

    #[test]
    fn test_demo_mode_defaults_to_false() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"latitude": 21.0, "longitude": -157.0}"#).unwrap();
        assert!(!request.demo_mode);
    }
}
