//! Fused risk assessment types

use serde::{Deserialize, Serialize};

/// Ordinal severity classification derived from the numeric risk level.
///
/// Bucketing is monotone: a higher risk level never yields a lower bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Extreme => "EXTREME",
        }
    }

    /// Short operator-facing description, used in rationale text
    pub fn description(self) -> &'static str {
        match self {
            Self::Low => "minimal concern",
            Self::Medium => "routine monitoring sufficient",
            Self::High => "elevated monitoring needed",
            Self::Extreme => "immediate attention required",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider contributions to the composite risk level
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentRisks {
    pub vegetation: f64,
    pub weather: f64,
    pub infrastructure: f64,
}

/// The fused wildfire-risk assessment for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Composite risk level, clamped to 0.0-1.0
    pub risk_level: f64,
    pub severity: Severity,
    /// Deterministic explanation referencing the dominant components
    pub rationale: String,
    /// Assessment confidence (0.0-1.0); reduced when observation slots
    /// resolved as failures
    pub confidence: f64,
    /// Named conditions that elevated the score
    pub risk_factors: Vec<String>,
    pub component_risks: ComponentRisks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Extreme);
    }

    #[test]
    fn test_severity_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Extreme).unwrap(), "\"EXTREME\"");
        let parsed: Severity = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(parsed, Severity::High);
    }
}
