//! Weather adapter for the National Weather Service API
//!
//! Follows the documented workflow: resolve the forecast grid for a point,
//! find the nearest observation station, then read its latest observation.
//! All measurements are normalized to the units the fusion engine expects
//! (Fahrenheit, mph, percent).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use pyro_common::geo::coordinate_variation;
use pyro_common::model::{
    AnalysisRequest, ObservationOutcome, ProviderFailure, ProviderKind, WeatherObservation,
};

use super::{map_request_error, with_timeout, ObservationProvider, ProviderHealth};

/// Neutral Hawaiian defaults used when a station omits a measurement
const DEFAULT_TEMPERATURE_F: f64 = 75.0;
const DEFAULT_HUMIDITY_PERCENT: f64 = 65.0;
const DEFAULT_WIND_SPEED_MPH: f64 = 10.0;

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    observation_stations: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    features: Vec<StationFeature>,
}

#[derive(Debug, Deserialize)]
struct StationFeature {
    properties: StationProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationProperties {
    station_identifier: String,
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    properties: ObservationProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationProperties {
    temperature: Option<Measurement>,
    relative_humidity: Option<Measurement>,
    wind_speed: Option<Measurement>,
    wind_direction: Option<Measurement>,
    text_description: Option<String>,
}

/// Measurement object: unit code plus possibly-null value
#[derive(Debug, Deserialize)]
struct Measurement {
    value: Option<f64>,
}

impl Measurement {
    fn value(measurement: &Option<Measurement>) -> Option<f64> {
        measurement.as_ref().and_then(|m| m.value)
    }
}

/// National Weather Service client
pub struct WeatherClient {
    client: Client,
    base_url: String,
    user_agent: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(base_url: String, user_agent: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            user_agent,
            timeout,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProviderFailure> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/geo+json")
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status().as_u16() == 404 {
            return Err(ProviderFailure::OutOfCoverage);
        }
        if !response.status().is_success() {
            return Err(ProviderFailure::Upstream(format!(
                "weather service returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderFailure::Malformed(e.to_string()))
    }

    async fn fetch_live(
        &self,
        request: &AnalysisRequest,
    ) -> Result<WeatherObservation, ProviderFailure> {
        // Step 1: grid metadata for the point, including the stations URL
        let points_url = format!(
            "{}/points/{:.4},{:.4}",
            self.base_url, request.latitude, request.longitude
        );
        let points: PointsResponse = self.get_json(&points_url).await?;

        let stations_url = points.properties.observation_stations.ok_or_else(|| {
            ProviderFailure::Malformed("points response carried no stations URL".to_string())
        })?;

        // Step 2: nearest observation station (features are distance-ordered)
        let stations: StationsResponse = self.get_json(&stations_url).await?;
        let station_id = stations
            .features
            .first()
            .map(|f| f.properties.station_identifier.clone())
            .ok_or_else(|| {
                ProviderFailure::Malformed("no observation stations for point".to_string())
            })?;

        // Step 3: latest observation from that station
        let observation_url = format!(
            "{}/stations/{}/observations/latest",
            self.base_url, station_id
        );
        let observation: ObservationResponse = self.get_json(&observation_url).await?;
        let props = observation.properties;

        Ok(WeatherObservation {
            temperature_f: Measurement::value(&props.temperature)
                .map(celsius_to_fahrenheit)
                .unwrap_or(DEFAULT_TEMPERATURE_F),
            humidity_percent: Measurement::value(&props.relative_humidity)
                .unwrap_or(DEFAULT_HUMIDITY_PERCENT),
            wind_speed_mph: Measurement::value(&props.wind_speed)
                .map(kmh_to_mph)
                .unwrap_or(DEFAULT_WIND_SPEED_MPH),
            wind_direction: Measurement::value(&props.wind_direction)
                .map(degrees_to_cardinal)
                .unwrap_or_else(|| "unknown".to_string()),
            conditions: props
                .text_description
                .map(|d| d.to_lowercase())
                .unwrap_or_else(|| "unknown".to_string()),
            station_id,
            source: "noaa_weather_gov".to_string(),
        })
    }

    /// Deterministic demo data shaped like typical Hawaiian trade-wind
    /// weather, varied by coordinate
    fn demo_observation(&self, request: &AnalysisRequest) -> WeatherObservation {
        let variation = coordinate_variation(request.latitude, request.longitude);
        let index = ((variation * 4.0) as usize).min(3);

        WeatherObservation {
            temperature_f: 78.0 + (variation * 10.0 - 5.0),
            humidity_percent: 68.0 + (variation * 20.0 - 10.0),
            wind_speed_mph: 12.0 + variation * 15.0,
            wind_direction: ["NE", "E", "SE", "S"][index].to_string(),
            conditions: ["partly cloudy", "mostly sunny", "scattered clouds", "clear"][index]
                .to_string(),
            station_id: "DEMO".to_string(),
            source: "demo".to_string(),
        }
    }
}

#[async_trait]
impl ObservationProvider for WeatherClient {
    type Observation = WeatherObservation;

    fn name(&self) -> &'static str {
        "weather"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Weather
    }

    async fn fetch(&self, request: &AnalysisRequest) -> ObservationOutcome<WeatherObservation> {
        if request.demo_mode {
            return ObservationOutcome::success(self.demo_observation(request));
        }
        with_timeout(self.timeout, self.fetch_live(request)).await
    }

    async fn probe(&self) -> ProviderHealth {
        // Honolulu grid lookup doubles as the reachability check
        let url = format!("{}/points/21.3099,-157.8581", self.base_url);
        match self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/geo+json")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ProviderHealth::ok("weather"),
            Ok(response) => {
                ProviderHealth::error("weather", format!("status {}", response.status()))
            }
            Err(e) => ProviderHealth::error("weather", e.to_string()),
        }
    }
}

// Unit conversions. The weather service reports SI units (degC, km/h).

fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

fn kmh_to_mph(kmh: f64) -> f64 {
    kmh * 0.621_371
}

fn degrees_to_cardinal(degrees: f64) -> String {
    const DIRECTIONS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let index = ((degrees / 22.5).round() as usize) % 16;
    DIRECTIONS[index].to_string()
}
