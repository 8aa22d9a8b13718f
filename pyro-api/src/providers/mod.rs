//! Provider adapters for external data sources
//!
//! Each adapter wraps one upstream service, applies a timeout, and maps
//! the response (or failure) into a normalized observation. Adapters
//! never raise across this boundary: every call resolves to an
//! [`ObservationOutcome`].
//!
//! Demo-mode requests return deterministic synthetic observations without
//! any network I/O, so the full pipeline runs offline.

mod infrastructure;
mod ticketing;
mod vegetation;
mod weather;

pub use infrastructure::OverpassClient;
pub use ticketing::{TicketSink, TicketingClient};
pub use vegetation::{NdviClient, VisionClient};
pub use weather::WeatherClient;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use pyro_common::config::TomlConfig;
use pyro_common::model::{
    AnalysisRequest, InfrastructureObservation, ObservationOutcome, ProviderFailure,
    ProviderKind, VegetationObservation, WeatherObservation,
};

/// Health probe result for one provider, reported by `/api/system-status`
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: String,
    /// "ok", "unconfigured", or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProviderHealth {
    pub fn ok(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            status: "ok".to_string(),
            detail: None,
        }
    }

    pub fn unconfigured(provider: &str, detail: &str) -> Self {
        Self {
            provider: provider.to_string(),
            status: "unconfigured".to_string(),
            detail: Some(detail.to_string()),
        }
    }

    pub fn error(provider: &str, detail: String) -> Self {
        Self {
            provider: provider.to_string(),
            status: "error".to_string(),
            detail: Some(detail),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Capability interface for observation-producing providers.
///
/// `fetch` is total: timeouts and upstream errors map to
/// `ObservationOutcome::Failure` rather than propagating. `probe` is the
/// operator-facing reachability check; orchestration never calls it.
#[async_trait]
pub trait ObservationProvider: Send + Sync {
    type Observation;

    fn name(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    async fn fetch(&self, request: &AnalysisRequest) -> ObservationOutcome<Self::Observation>;

    async fn probe(&self) -> ProviderHealth;
}

/// Ordered-tier fallback: try each adapter in order, return the first
/// success. The chain reports the last tier's failure when every tier
/// fails, and is indistinguishable from a single adapter to callers.
pub struct FallbackChain<T> {
    name: &'static str,
    kind: ProviderKind,
    tiers: Vec<Arc<dyn ObservationProvider<Observation = T>>>,
}

impl<T> FallbackChain<T> {
    pub fn new(
        name: &'static str,
        kind: ProviderKind,
        tiers: Vec<Arc<dyn ObservationProvider<Observation = T>>>,
    ) -> Self {
        Self { name, kind, tiers }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> ObservationProvider for FallbackChain<T> {
    type Observation = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, request: &AnalysisRequest) -> ObservationOutcome<T> {
        let mut last_failure =
            ProviderFailure::Upstream("no providers configured in chain".to_string());

        for tier in &self.tiers {
            match tier.fetch(request).await {
                ObservationOutcome::Success { data } => {
                    return ObservationOutcome::success(data);
                }
                ObservationOutcome::Failure { reason } => {
                    tracing::warn!(
                        provider = tier.name(),
                        %reason,
                        "provider tier failed, trying next"
                    );
                    last_failure = reason;
                }
            }
        }

        ObservationOutcome::failure(last_failure)
    }

    async fn probe(&self) -> ProviderHealth {
        // The chain is healthy if any tier is; report the first healthy
        // tier, otherwise the primary's diagnosis.
        let mut first: Option<ProviderHealth> = None;
        for tier in &self.tiers {
            let health = tier.probe().await;
            if health.is_ok() {
                return health;
            }
            first.get_or_insert(health);
        }
        first.unwrap_or_else(|| ProviderHealth::unconfigured(self.name, "empty chain"))
    }
}

/// The full set of adapters one orchestrator run fans out to.
///
/// Held behind trait objects so tests can substitute mock providers.
pub struct ProviderSet {
    pub vegetation: Arc<dyn ObservationProvider<Observation = VegetationObservation>>,
    pub weather: Arc<dyn ObservationProvider<Observation = WeatherObservation>>,
    pub infrastructure: Arc<dyn ObservationProvider<Observation = InfrastructureObservation>>,
    pub ticketing: Arc<dyn TicketSink>,
}

impl ProviderSet {
    /// Build the live provider set: the vegetation adapter is the
    /// NDVI-then-vision fallback chain, everything else a single client.
    pub fn from_config(config: &TomlConfig) -> Self {
        let providers = &config.providers;

        let ndvi: Arc<dyn ObservationProvider<Observation = VegetationObservation>> =
            Arc::new(NdviClient::new(
                providers.ndvi_base_url.clone(),
                providers.ndvi_api_key.clone(),
                Duration::from_secs(providers.vegetation_timeout_secs),
            ));
        let vision: Arc<dyn ObservationProvider<Observation = VegetationObservation>> =
            Arc::new(VisionClient::new(
                providers.vision_base_url.clone(),
                providers.vision_api_key.clone(),
                Duration::from_secs(providers.vegetation_timeout_secs),
            ));

        Self {
            vegetation: Arc::new(FallbackChain::new(
                "vegetation",
                ProviderKind::Vegetation,
                vec![ndvi, vision],
            )),
            weather: Arc::new(WeatherClient::new(
                providers.weather_base_url.clone(),
                providers.user_agent.clone(),
                Duration::from_secs(providers.weather_timeout_secs),
            )),
            infrastructure: Arc::new(OverpassClient::new(
                providers.overpass_base_url.clone(),
                Duration::from_secs(providers.infrastructure_timeout_secs),
            )),
            ticketing: Arc::new(TicketingClient::new(
                providers.webhook_url.clone(),
                providers.ticket_base_url.clone(),
                providers.user_agent.clone(),
                Duration::from_secs(providers.ticketing_timeout_secs),
            )),
        }
    }

    /// Probe every configured provider concurrently
    pub async fn probe_all(&self) -> Vec<ProviderHealth> {
        let (vegetation, weather, infrastructure, ticketing) = tokio::join!(
            self.vegetation.probe(),
            self.weather.probe(),
            self.infrastructure.probe(),
            self.ticketing.probe(),
        );
        vec![vegetation, weather, infrastructure, ticketing]
    }
}

/// Map a reqwest error into the normalized failure taxonomy
pub(crate) fn map_request_error(err: reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::Timeout
    } else if err.is_decode() {
        ProviderFailure::Malformed(err.to_string())
    } else {
        ProviderFailure::Upstream(err.to_string())
    }
}

/// Run a live provider call under the adapter's timeout budget
pub(crate) async fn with_timeout<T, F>(budget: Duration, call: F) -> ObservationOutcome<T>
where
    F: std::future::Future<Output = Result<T, ProviderFailure>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(Ok(data)) => ObservationOutcome::success(data),
        Ok(Err(reason)) => ObservationOutcome::failure(reason),
        Err(_) => ObservationOutcome::failure(ProviderFailure::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticTier {
        name: &'static str,
        outcome: ObservationOutcome<VegetationObservation>,
    }

    #[async_trait]
    impl ObservationProvider for StaticTier {
        type Observation = VegetationObservation;

        fn name(&self) -> &'static str {
            self.name
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Vegetation
        }

        async fn fetch(&self, _request: &AnalysisRequest) -> ObservationOutcome<VegetationObservation> {
            self.outcome.clone()
        }

        async fn probe(&self) -> ProviderHealth {
            ProviderHealth::ok(self.name)
        }
    }

    fn observation(method: &str) -> VegetationObservation {
        VegetationObservation {
            dryness_score: 0.5,
            confidence: 0.9,
            tile_date: "2025-08-01".to_string(),
            analysis_method: method.to_string(),
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            latitude: 20.8783,
            longitude: -156.6825,
            demo_mode: true,
        }
    }

    #[tokio::test]
    async fn test_chain_returns_primary_success() {
        let chain = FallbackChain::new(
            "vegetation",
            ProviderKind::Vegetation,
            vec![
                Arc::new(StaticTier {
                    name: "primary",
                    outcome: ObservationOutcome::success(observation("primary")),
                }) as Arc<dyn ObservationProvider<Observation = VegetationObservation>>,
                Arc::new(StaticTier {
                    name: "secondary",
                    outcome: ObservationOutcome::success(observation("secondary")),
                }),
            ],
        );

        let outcome = chain.fetch(&request()).await;
        assert_eq!(outcome.data().unwrap().analysis_method, "primary");
    }

    #[tokio::test]
    async fn test_chain_falls_back_on_primary_failure() {
        let chain = FallbackChain::new(
            "vegetation",
            ProviderKind::Vegetation,
            vec![
                Arc::new(StaticTier {
                    name: "primary",
                    outcome: ObservationOutcome::failure(ProviderFailure::Timeout),
                }) as Arc<dyn ObservationProvider<Observation = VegetationObservation>>,
                Arc::new(StaticTier {
                    name: "secondary",
                    outcome: ObservationOutcome::success(observation("secondary")),
                }),
            ],
        );

        let outcome = chain.fetch(&request()).await;
        assert_eq!(outcome.data().unwrap().analysis_method, "secondary");
    }

    #[tokio::test]
    async fn test_chain_reports_last_failure_when_all_fail() {
        let chain = FallbackChain::new(
            "vegetation",
            ProviderKind::Vegetation,
            vec![
                Arc::new(StaticTier {
                    name: "primary",
                    outcome: ObservationOutcome::failure(ProviderFailure::Timeout),
                }) as Arc<dyn ObservationProvider<Observation = VegetationObservation>>,
                Arc::new(StaticTier {
                    name: "secondary",
                    outcome: ObservationOutcome::failure(ProviderFailure::Upstream(
                        "503".to_string(),
                    )),
                }),
            ],
        );

        let outcome = chain.fetch(&request()).await;
        assert_eq!(
            outcome.failure_reason(),
            Some(&ProviderFailure::Upstream("503".to_string()))
        );
    }

    #[tokio::test]
    async fn test_with_timeout_enforces_budget() {
        let outcome: ObservationOutcome<()> =
            with_timeout(Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(outcome.failure_reason(), Some(&ProviderFailure::Timeout));
    }
}
