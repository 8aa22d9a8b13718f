//! Normalized provider observations
//!
//! Each external data source is normalized into one of a small closed set
//! of observation shapes before fusion sees it. A provider that fails
//! still resolves its slot, with a [`ProviderFailure`] marker instead of
//! data, so fusion can degrade gracefully rather than stall.

use serde::{Deserialize, Serialize};

/// The three observation-producing providers.
///
/// Ticketing is a downstream action, not an observation, so it is not a
/// member of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Vegetation,
    Weather,
    Infrastructure,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vegetation => "vegetation",
            Self::Weather => "weather",
            Self::Infrastructure => "infrastructure",
        }
    }

    /// All observation slots, in fusion-weight order
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Vegetation,
        ProviderKind::Weather,
        ProviderKind::Infrastructure,
    ];
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized failure marker for a provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailure {
    /// The call did not complete within the provider's timeout budget
    Timeout,
    /// The upstream service returned an error or was unreachable
    Upstream(String),
    /// The upstream response could not be parsed into the normalized shape
    Malformed(String),
    /// The coordinates fall outside the provider's coverage area
    OutOfCoverage,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Upstream(detail) => write!(f, "upstream error: {}", detail),
            Self::Malformed(detail) => write!(f, "malformed response: {}", detail),
            Self::OutOfCoverage => write!(f, "outside coverage area"),
        }
    }
}

/// Result of a single provider call: normalized data or a failure marker.
///
/// Adapters never raise across this boundary; every call resolves to one
/// of these two variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ObservationOutcome<T> {
    Success { data: T },
    Failure { reason: ProviderFailure },
}

impl<T> ObservationOutcome<T> {
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    pub fn failure(reason: ProviderFailure) -> Self {
        Self::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&ProviderFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(reason),
        }
    }
}

/// Satellite vegetation-dryness analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationObservation {
    /// Vegetation dryness fraction: 0.0 = very moist, 1.0 = extremely dry
    pub dryness_score: f64,
    /// Provider-reported analysis confidence (0.0-1.0)
    pub confidence: f64,
    /// Date of the satellite tile the analysis was derived from
    pub tile_date: String,
    /// Which analysis tier produced the result (e.g. "ndvi", "vision_fallback")
    pub analysis_method: String,
}

/// Current weather conditions near the coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temperature_f: f64,
    pub humidity_percent: f64,
    pub wind_speed_mph: f64,
    pub wind_direction: String,
    pub conditions: String,
    pub station_id: String,
    pub source: String,
}

/// Power-infrastructure proximity within the search radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureObservation {
    /// Power lines (including minor lines) within the search radius
    pub line_count: u32,
    pub transmission_towers: u32,
    pub power_poles: u32,
    /// Distance to the nearest power feature in meters; equals
    /// `search_radius_m` when nothing was found
    pub nearest_distance_m: f64,
    pub search_radius_m: f64,
    pub source: String,
}

/// One resolved observation slot, tagged by provider.
///
/// This is what adapter tasks hand back to the orchestrator and what
/// `ObservationUpdated` progress events carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderObservation {
    Vegetation(ObservationOutcome<VegetationObservation>),
    Weather(ObservationOutcome<WeatherObservation>),
    Infrastructure(ObservationOutcome<InfrastructureObservation>),
}

impl ProviderObservation {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Vegetation(_) => ProviderKind::Vegetation,
            Self::Weather(_) => ProviderKind::Weather,
            Self::Infrastructure(_) => ProviderKind::Infrastructure,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Vegetation(o) => o.is_success(),
            Self::Weather(o) => o.is_success(),
            Self::Infrastructure(o) => o.is_success(),
        }
    }
}

/// The three observation slots of an analysis.
///
/// An absent slot means "not yet resolved"; a present slot may still be a
/// provider failure. Fusion only runs once all three slots are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    pub vegetation: Option<ObservationOutcome<VegetationObservation>>,
    pub weather: Option<ObservationOutcome<WeatherObservation>>,
    pub infrastructure: Option<ObservationOutcome<InfrastructureObservation>>,
}

impl ObservationSet {
    /// Record a resolved observation into its slot
    pub fn record(&mut self, observation: ProviderObservation) {
        match observation {
            ProviderObservation::Vegetation(o) => self.vegetation = Some(o),
            ProviderObservation::Weather(o) => self.weather = Some(o),
            ProviderObservation::Infrastructure(o) => self.infrastructure = Some(o),
        }
    }

    /// True once every slot has resolved (success or failure)
    pub fn is_complete(&self) -> bool {
        self.vegetation.is_some() && self.weather.is_some() && self.infrastructure.is_some()
    }

    /// Number of slots that resolved at all
    pub fn resolved_count(&self) -> usize {
        [
            self.vegetation.is_some(),
            self.weather.is_some(),
            self.infrastructure.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Number of slots that resolved with data
    pub fn success_count(&self) -> usize {
        let mut count = 0;
        if self.vegetation.as_ref().is_some_and(|o| o.is_success()) {
            count += 1;
        }
        if self.weather.as_ref().is_some_and(|o| o.is_success()) {
            count += 1;
        }
        if self.infrastructure.as_ref().is_some_and(|o| o.is_success()) {
            count += 1;
        }
        count
    }
}
