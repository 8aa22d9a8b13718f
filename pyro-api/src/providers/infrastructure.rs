//! Power-infrastructure adapter for the Overpass API
//!
//! Queries power lines, towers, and poles within a fixed radius of the
//! coordinate and reduces the element set to counts plus the distance to
//! the nearest feature.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use pyro_common::geo::haversine_distance_m;
use pyro_common::model::{
    AnalysisRequest, InfrastructureObservation, ObservationOutcome, ProviderFailure,
    ProviderKind,
};

use super::{map_request_error, with_timeout, ObservationProvider, ProviderHealth};

/// Search radius for power features around the analysis point
const SEARCH_RADIUS_M: f64 = 500.0;

/// Server-side query timeout requested from Overpass
const QUERY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(default)]
    tags: HashMap<String, String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    geometry: Vec<GeometryNode>,
}

#[derive(Debug, Deserialize)]
struct GeometryNode {
    lat: f64,
    lon: f64,
}

/// Overpass API client
pub struct OverpassClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OverpassClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            timeout,
        }
    }

    fn build_query(latitude: f64, longitude: f64) -> String {
        format!(
            "[out:json][timeout:{timeout}];\n\
             (\n\
               way[\"power\"=\"line\"](around:{radius},{lat},{lon});\n\
               way[\"power\"=\"minor_line\"](around:{radius},{lat},{lon});\n\
               node[\"power\"=\"tower\"](around:{radius},{lat},{lon});\n\
               node[\"power\"=\"pole\"](around:{radius},{lat},{lon});\n\
             );\n\
             out geom;",
            timeout = QUERY_TIMEOUT_SECS,
            radius = SEARCH_RADIUS_M as u64,
            lat = latitude,
            lon = longitude,
        )
    }

    /// Reduce Overpass elements to counts and nearest feature distance
    fn analyze_elements(
        elements: &[OverpassElement],
        center_lat: f64,
        center_lon: f64,
    ) -> InfrastructureObservation {
        let mut line_count = 0u32;
        let mut transmission_towers = 0u32;
        let mut power_poles = 0u32;
        let mut nearest = f64::INFINITY;

        for element in elements {
            match element.tags.get("power").map(String::as_str) {
                Some("line") | Some("minor_line") => line_count += 1,
                Some("tower") => transmission_towers += 1,
                Some("pole") => power_poles += 1,
                _ => continue,
            }

            for node in &element.geometry {
                let d = haversine_distance_m(center_lat, center_lon, node.lat, node.lon);
                nearest = nearest.min(d);
            }
            if let (Some(lat), Some(lon)) = (element.lat, element.lon) {
                let d = haversine_distance_m(center_lat, center_lon, lat, lon);
                nearest = nearest.min(d);
            }
        }

        // Nothing in range: report the search radius as the floor distance
        if !nearest.is_finite() {
            nearest = SEARCH_RADIUS_M;
        }

        InfrastructureObservation {
            line_count,
            transmission_towers,
            power_poles,
            nearest_distance_m: (nearest * 10.0).round() / 10.0,
            search_radius_m: SEARCH_RADIUS_M,
            source: "overpass".to_string(),
        }
    }

    async fn fetch_live(
        &self,
        request: &AnalysisRequest,
    ) -> Result<InfrastructureObservation, ProviderFailure> {
        let query = Self::build_query(request.latitude, request.longitude);

        let response = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(query)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(ProviderFailure::Upstream(format!(
                "overpass returned {}",
                response.status()
            )));
        }

        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Malformed(e.to_string()))?;

        let observation =
            Self::analyze_elements(&body.elements, request.latitude, request.longitude);

        tracing::debug!(
            lines = observation.line_count,
            nearest_m = observation.nearest_distance_m,
            "power infrastructure analysis complete"
        );

        Ok(observation)
    }

    /// Demo data matching typical Hawaiian distribution infrastructure
    fn demo_observation(&self) -> InfrastructureObservation {
        InfrastructureObservation {
            line_count: 3,
            transmission_towers: 1,
            power_poles: 2,
            nearest_distance_m: 230.0,
            search_radius_m: SEARCH_RADIUS_M,
            source: "demo".to_string(),
        }
    }
}

#[async_trait]
impl ObservationProvider for OverpassClient {
    type Observation = InfrastructureObservation;

    fn name(&self) -> &'static str {
        "overpass"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Infrastructure
    }

    async fn fetch(
        &self,
        request: &AnalysisRequest,
    ) -> ObservationOutcome<InfrastructureObservation> {
        if request.demo_mode {
            return ObservationOutcome::success(self.demo_observation());
        }
        with_timeout(self.timeout, self.fetch_live(request)).await
    }

    async fn probe(&self) -> ProviderHealth {
        let query = "[out:json][timeout:5]; node(around:100,21.3099,-157.8581); out count;";
        match self
            .client
            .post(&self.base_url)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(query)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ProviderHealth::ok("overpass"),
            Ok(response) => {
                ProviderHealth::error("overpass", format!("status {}", response.status()))
            }
            Err(e) => ProviderHealth::error("overpass", e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(power: &str, lat: f64, lon: f64) -> OverpassElement {
        OverpassElement {
            tags: HashMap::from([("power".to_string(), power.to_string())]),
            lat: Some(lat),
            lon: Some(lon),
            geometry: Vec::new(),
        }
    }

    #[test]
    fn test_analyze_empty_elements_reports_radius() {
        let observation = OverpassClient::analyze_elements(&[], 21.31, -157.86);
        assert_eq!(observation.line_count, 0);
        assert_eq!(observation.nearest_distance_m, SEARCH_RADIUS_M);
    }

    #[test]
    fn test_analyze_categorizes_and_finds_nearest() {
        let center = (21.3100, -157.8600);
        let elements = vec![
            OverpassElement {
                tags: HashMap::from([("power".to_string(), "line".to_string())]),
                lat: None,
                lon: None,
                geometry: vec![GeometryNode {
                    lat: 21.3110,
                    lon: -157.8600,
                }],
            },
            tagged("tower", 21.3120, -157.8600),
            tagged("pole", 21.3105, -157.8600),
            // Untagged element is ignored
            OverpassElement {
                tags: HashMap::new(),
                lat: Some(21.3101),
                lon: Some(-157.8600),
                geometry: Vec::new(),
            },
        ];

        let observation = OverpassClient::analyze_elements(&elements, center.0, center.1);
        assert_eq!(observation.line_count, 1);
        assert_eq!(observation.transmission_towers, 1);
        assert_eq!(observation.power_poles, 1);
        // The pole ~55m north is the closest feature
        assert!(observation.nearest_distance_m < 100.0);
        assert!(observation.nearest_distance_m > 20.0);
    }

    #[test]
    fn test_query_includes_all_power_features() {
        let query = OverpassClient::build_query(20.8783, -156.6825);
        assert!(query.contains("\"power\"=\"line\""));
        assert!(query.contains("\"power\"=\"minor_line\""));
        assert!(query.contains("\"power\"=\"tower\""));
        assert!(query.contains("\"power\"=\"pole\""));
        assert!(query.contains("out geom"));
    }

    #[tokio::test]
    async fn test_demo_observation() {
        let client = OverpassClient::new(
            "https://example.invalid".to_string(),
            Duration::from_secs(1),
        );
        let request = AnalysisRequest {
            latitude: 20.8783,
            longitude: -156.6825,
            demo_mode: true,
        };
        let outcome = client.fetch(&request).await;
        let data = outcome.data().unwrap();
        assert_eq!(data.line_count, 3);
        assert_eq!(data.nearest_distance_m, 230.0);
    }
}
