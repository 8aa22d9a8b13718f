//! Vegetation-dryness adapters
//!
//! Two tiers behind the fallback chain: a primary NDVI crop-health
//! analysis and a secondary vision-model analysis. Both normalize down to
//! a dryness fraction plus confidence; the orchestrator never sees which
//! tier answered except through `analysis_method`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use pyro_common::model::{
    AnalysisRequest, ObservationOutcome, ProviderFailure, ProviderKind, VegetationObservation,
};

use super::{map_request_error, with_timeout, ObservationProvider, ProviderHealth};

#[derive(Debug, Serialize)]
struct DrynessRequest {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct DrynessResponse {
    dryness_score: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
    tile_date: Option<String>,
}

fn default_confidence() -> f64 {
    0.7
}

/// Primary vegetation tier: NDVI crop-health analysis
pub struct NdviClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl NdviClient {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            api_key,
            timeout,
        }
    }

    async fn fetch_live(
        &self,
        request: &AnalysisRequest,
    ) -> Result<VegetationObservation, ProviderFailure> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderFailure::Upstream("NDVI API key not configured".to_string())
        })?;

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&DrynessRequest {
                latitude: request.latitude,
                longitude: request.longitude,
            })
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(ProviderFailure::Upstream(format!(
                "NDVI analysis returned {}",
                response.status()
            )));
        }

        let body: DrynessResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Malformed(e.to_string()))?;

        if !(0.0..=1.0).contains(&body.dryness_score) {
            return Err(ProviderFailure::Malformed(format!(
                "dryness score {} outside 0-1",
                body.dryness_score
            )));
        }

        Ok(VegetationObservation {
            dryness_score: body.dryness_score,
            confidence: body.confidence.clamp(0.0, 1.0),
            tile_date: body
                .tile_date
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
            analysis_method: "ndvi".to_string(),
        })
    }

    fn demo_observation(&self) -> VegetationObservation {
        VegetationObservation {
            dryness_score: 0.68,
            confidence: 0.92,
            tile_date: Utc::now().format("%Y-%m-%d").to_string(),
            analysis_method: "ndvi_demo".to_string(),
        }
    }
}

#[async_trait]
impl ObservationProvider for NdviClient {
    type Observation = VegetationObservation;

    fn name(&self) -> &'static str {
        "ndvi"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Vegetation
    }

    async fn fetch(&self, request: &AnalysisRequest) -> ObservationOutcome<VegetationObservation> {
        if request.demo_mode {
            return ObservationOutcome::success(self.demo_observation());
        }
        with_timeout(self.timeout, self.fetch_live(request)).await
    }

    async fn probe(&self) -> ProviderHealth {
        if self.api_key.is_none() {
            return ProviderHealth::unconfigured("ndvi", "API key not set");
        }
        match self.client.get(&self.base_url).send().await {
            Ok(_) => ProviderHealth::ok("ndvi"),
            Err(e) => ProviderHealth::error("ndvi", e.to_string()),
        }
    }
}

/// Secondary vegetation tier: vision-model imagery analysis
pub struct VisionClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl VisionClient {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            api_key,
            timeout,
        }
    }

    async fn fetch_live(
        &self,
        request: &AnalysisRequest,
    ) -> Result<VegetationObservation, ProviderFailure> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderFailure::Upstream("vision API key not configured".to_string())
        })?;

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&DrynessRequest {
                latitude: request.latitude,
                longitude: request.longitude,
            })
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(ProviderFailure::Upstream(format!(
                "vision analysis returned {}",
                response.status()
            )));
        }

        let body: DrynessResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Malformed(e.to_string()))?;

        Ok(VegetationObservation {
            dryness_score: body.dryness_score.clamp(0.0, 1.0),
            confidence: body.confidence.clamp(0.0, 1.0),
            tile_date: body
                .tile_date
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
            analysis_method: "vision_fallback".to_string(),
        })
    }

    fn demo_observation(&self) -> VegetationObservation {
        VegetationObservation {
            dryness_score: 0.72,
            confidence: 0.85,
            tile_date: Utc::now().format("%Y-%m-%d").to_string(),
            analysis_method: "vision_demo".to_string(),
        }
    }
}

#[async_trait]
impl ObservationProvider for VisionClient {
    type Observation = VegetationObservation;

    fn name(&self) -> &'static str {
        "vision"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Vegetation
    }

    async fn fetch(&self, request: &AnalysisRequest) -> ObservationOutcome<VegetationObservation> {
        if request.demo_mode {
            return ObservationOutcome::success(self.demo_observation());
        }
        with_timeout(self.timeout, self.fetch_live(request)).await
    }

    async fn probe(&self) -> ProviderHealth {
        if self.api_key.is_none() {
            return ProviderHealth::unconfigured("vision", "API key not set");
        }
        match self.client.get(&self.base_url).send().await {
            Ok(_) => ProviderHealth::ok("vision"),
            Err(e) => ProviderHealth::error("vision", e.to_string()),
        }
    }
}
