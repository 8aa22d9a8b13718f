//! Risk fusion engine
//!
//! Pure, total, deterministic: the three observation slots (each data or a
//! failure marker) fuse into one composite risk level, a severity bucket,
//! a rationale string, and a confidence score. A failed slot contributes a
//! neutral mid-range component and lowers confidence instead of blocking
//! the assessment, so the pipeline degrades rather than stalls when a
//! provider is down.

use pyro_common::config::RiskConfig;
use pyro_common::geo::Coordinates;
use pyro_common::model::{
    ComponentRisks, InfrastructureObservation, ObservationOutcome, ObservationSet,
    RiskAssessment, Severity, VegetationObservation, WeatherObservation,
};

/// Neutral defaults substituted for failed observation slots
const NEUTRAL_DRYNESS: f64 = 0.5;
const NEUTRAL_TEMPERATURE_F: f64 = 75.0;
const NEUTRAL_HUMIDITY_PERCENT: f64 = 65.0;
const NEUTRAL_WIND_SPEED_MPH: f64 = 10.0;

/// Slot confidence contributions when the provider delivered data.
/// Vegetation carries its own reported confidence, capped here.
const VEGETATION_CONFIDENCE_CAP: f64 = 0.95;
const WEATHER_SLOT_CONFIDENCE: f64 = 0.90;
const INFRASTRUCTURE_SLOT_CONFIDENCE: f64 = 0.85;

/// Fusion policy values, resolved from `[risk]` config.
///
/// The numbers are demo policy, not physical constants; the binding
/// contracts are monotone severity, graceful degradation, and
/// deterministic output.
#[derive(Debug, Clone, Copy)]
pub struct RiskPolicy {
    pub vegetation_weight: f64,
    pub weather_weight: f64,
    pub infrastructure_weight: f64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub extreme_threshold: f64,
    pub ticket_threshold: f64,
    pub confidence_floor: f64,
}

impl From<&RiskConfig> for RiskPolicy {
    fn from(config: &RiskConfig) -> Self {
        Self {
            vegetation_weight: config.vegetation_weight,
            weather_weight: config.weather_weight,
            infrastructure_weight: config.infrastructure_weight,
            medium_threshold: config.medium_threshold,
            high_threshold: config.high_threshold,
            extreme_threshold: config.extreme_threshold,
            ticket_threshold: config.ticket_threshold,
            confidence_floor: config.confidence_floor,
        }
    }
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::from(&RiskConfig::default())
    }
}

impl RiskPolicy {
    /// Monotone severity bucketing over the ascending thresholds
    pub fn severity_for(&self, risk_level: f64) -> Severity {
        if risk_level >= self.extreme_threshold {
            Severity::Extreme
        } else if risk_level >= self.high_threshold {
            Severity::High
        } else if risk_level >= self.medium_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Fuse the three observation slots into a risk assessment.
///
/// Never fails: absent or failed slots fall back to neutral defaults with
/// a proportional confidence reduction.
pub fn fuse(
    coordinates: Coordinates,
    observations: &ObservationSet,
    policy: &RiskPolicy,
) -> RiskAssessment {
    let mut risk_factors = Vec::new();

    let vegetation = observations.vegetation.as_ref().and_then(outcome_data);
    let weather = observations.weather.as_ref().and_then(outcome_data);
    let infrastructure = observations.infrastructure.as_ref().and_then(outcome_data);

    let vegetation_risk = vegetation_component(vegetation, policy, &mut risk_factors);
    let weather_risk = weather_component(weather, policy, &mut risk_factors);
    let infrastructure_risk = infrastructure_component(infrastructure, policy, &mut risk_factors);

    let risk_level = (vegetation_risk + weather_risk + infrastructure_risk).clamp(0.0, 1.0);
    let severity = policy.severity_for(risk_level);
    let confidence = fused_confidence(observations, policy);

    let component_risks = ComponentRisks {
        vegetation: vegetation_risk,
        weather: weather_risk,
        infrastructure: infrastructure_risk,
    };

    let rationale = build_rationale(
        coordinates,
        severity,
        risk_level,
        &risk_factors,
        &component_risks,
        vegetation,
        weather,
        infrastructure,
        observations,
        policy,
    );

    RiskAssessment {
        risk_level,
        severity,
        rationale,
        confidence,
        risk_factors,
        component_risks,
    }
}

fn outcome_data<T>(outcome: &ObservationOutcome<T>) -> Option<&T> {
    outcome.data()
}

/// Vegetation dryness maps near-linearly onto its component score
fn vegetation_component(
    vegetation: Option<&VegetationObservation>,
    policy: &RiskPolicy,
    risk_factors: &mut Vec<String>,
) -> f64 {
    let dryness = match vegetation {
        Some(observation) => {
            if observation.dryness_score > 0.8 {
                risk_factors.push("critically dry vegetation".to_string());
            } else if observation.dryness_score > 0.6 {
                risk_factors.push("moderately dry vegetation".to_string());
            } else if observation.dryness_score > 0.4 {
                risk_factors.push("slightly dry vegetation".to_string());
            }
            observation.dryness_score
        }
        None => NEUTRAL_DRYNESS,
    };

    dryness.clamp(0.0, 1.0) * policy.vegetation_weight
}

/// Temperature, humidity, and wind combine into a fire-weather component.
/// The weather weight splits 3:2:2 across the three factors.
fn weather_component(
    weather: Option<&WeatherObservation>,
    policy: &RiskPolicy,
    risk_factors: &mut Vec<String>,
) -> f64 {
    let (temperature_f, humidity_percent, wind_speed_mph) = match weather {
        Some(observation) => {
            if observation.temperature_f > 85.0 {
                risk_factors.push("high temperature".to_string());
            }
            if observation.humidity_percent < 40.0 {
                risk_factors.push("low humidity".to_string());
            }
            if observation.wind_speed_mph > 20.0 {
                risk_factors.push("strong winds".to_string());
            }
            let conditions = observation.conditions.to_lowercase();
            if conditions.contains("dry") || conditions.contains("clear") {
                risk_factors.push("dry weather conditions".to_string());
            }
            (
                observation.temperature_f,
                observation.humidity_percent,
                observation.wind_speed_mph,
            )
        }
        None => (
            NEUTRAL_TEMPERATURE_F,
            NEUTRAL_HUMIDITY_PERCENT,
            NEUTRAL_WIND_SPEED_MPH,
        ),
    };

    // Risk increases above 70 degF, below 80% humidity, and with wind
    let temperature_factor = ((temperature_f - 70.0) / 40.0).max(0.0);
    let humidity_factor = ((80.0 - humidity_percent) / 80.0).max(0.0);
    let wind_factor = (wind_speed_mph / 30.0).min(1.0);

    temperature_factor * policy.weather_weight * 3.0 / 7.0
        + humidity_factor * policy.weather_weight * 2.0 / 7.0
        + wind_factor * policy.weather_weight * 2.0 / 7.0
}

/// Infrastructure proximity under the search radius contributes an
/// elevated component, decaying to zero with distance; no lines in range
/// contributes nothing
fn infrastructure_component(
    infrastructure: Option<&InfrastructureObservation>,
    policy: &RiskPolicy,
    risk_factors: &mut Vec<String>,
) -> f64 {
    let Some(observation) = infrastructure else {
        return 0.0;
    };
    if observation.line_count == 0 {
        return 0.0;
    }

    if observation.nearest_distance_m < 100.0 {
        risk_factors.push("very close power lines".to_string());
    } else if observation.nearest_distance_m < 300.0 {
        risk_factors.push("nearby power infrastructure".to_string());
    }
    if observation.line_count > 5 {
        risk_factors.push("dense power line network".to_string());
    }

    let radius = observation.search_radius_m.max(1.0);
    let proximity_factor = ((radius - observation.nearest_distance_m) / radius).max(0.0);
    let density_factor = (observation.line_count as f64 / 10.0).min(1.0);

    (proximity_factor + density_factor) / 2.0 * policy.infrastructure_weight
}

/// Weight-proportional confidence: each successful slot contributes its
/// confidence share; failed or absent slots contribute nothing. The floor
/// keeps the all-failed assessment from reading as certainty-zero.
fn fused_confidence(observations: &ObservationSet, policy: &RiskPolicy) -> f64 {
    let vegetation_confidence = observations
        .vegetation
        .as_ref()
        .and_then(outcome_data)
        .map(|o| o.confidence.min(VEGETATION_CONFIDENCE_CAP))
        .unwrap_or(0.0);
    let weather_confidence = observations
        .weather
        .as_ref()
        .and_then(outcome_data)
        .map(|_| WEATHER_SLOT_CONFIDENCE)
        .unwrap_or(0.0);
    let infrastructure_confidence = observations
        .infrastructure
        .as_ref()
        .and_then(outcome_data)
        .map(|_| INFRASTRUCTURE_SLOT_CONFIDENCE)
        .unwrap_or(0.0);

    let confidence = policy.vegetation_weight * vegetation_confidence
        + policy.weather_weight * weather_confidence
        + policy.infrastructure_weight * infrastructure_confidence;

    confidence.max(policy.confidence_floor)
}

#[allow(clippy::too_many_arguments)]
fn build_rationale(
    coordinates: Coordinates,
    severity: Severity,
    risk_level: f64,
    risk_factors: &[String],
    components: &ComponentRisks,
    vegetation: Option<&VegetationObservation>,
    weather: Option<&WeatherObservation>,
    infrastructure: Option<&InfrastructureObservation>,
    observations: &ObservationSet,
    policy: &RiskPolicy,
) -> String {
    let severity_lower = severity.as_str().to_lowercase();
    let mut rationale = if risk_factors.is_empty() {
        format!(
            "Wildfire risk assessment shows {} danger with standard environmental conditions. ",
            severity_lower
        )
    } else {
        format!(
            "Wildfire risk assessment indicates {} danger due to {}. ",
            severity_lower,
            risk_factors.join(", ")
        )
    };

    if components.vegetation > 0.3 {
        if let Some(observation) = vegetation {
            rationale.push_str(&format!(
                "Satellite imagery shows {:.0}% vegetation dryness (analyzed via {}). ",
                observation.dryness_score * 100.0,
                observation.analysis_method
            ));
        }
    }
    if components.weather > 0.2 {
        if let Some(observation) = weather {
            rationale.push_str(&format!(
                "Weather conditions contribute to fire risk with {:.0}\u{00b0}F temperature, \
                 {:.0}% humidity, and {:.0} mph winds. ",
                observation.temperature_f,
                observation.humidity_percent,
                observation.wind_speed_mph
            ));
        }
    }
    if components.infrastructure > 0.1 {
        if let Some(observation) = infrastructure {
            rationale.push_str(&format!(
                "Power infrastructure poses ignition risk with {} lines within {:.0}m, \
                 nearest at {:.0}m. ",
                observation.line_count,
                observation.search_radius_m,
                observation.nearest_distance_m
            ));
        }
    }

    let failed_slots = 3 - observations.success_count();
    if failed_slots > 0 {
        rationale.push_str(&format!(
            "{} of 3 data sources were unavailable; neutral defaults were used for the \
             missing inputs. ",
            failed_slots
        ));
    }

    rationale.push_str(&format!(
        "Analysis performed for Hawaiian Islands location {:.4}\u{00b0}N, {:.4}\u{00b0}W. ",
        coordinates.latitude,
        coordinates.longitude.abs()
    ));

    if risk_level >= policy.high_threshold {
        rationale.push_str("Recommend increased monitoring and fire prevention measures.");
    } else if risk_level >= policy.medium_threshold {
        rationale.push_str("Standard fire safety protocols advised.");
    } else {
        rationale.push_str("Current conditions pose minimal fire risk.");
    }

    rationale
}
