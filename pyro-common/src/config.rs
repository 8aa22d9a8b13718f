//! Configuration loading for PyroGuard services
//!
//! Resolution priority per setting: environment variable → TOML config
//! file → compiled default. Every field has a default so the service can
//! run unconfigured in demo mode (no provider credentials required).

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming the config file path
pub const CONFIG_PATH_ENV: &str = "PYRO_CONFIG";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pyroguard.toml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// External provider endpoints, credentials, and per-call timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// User-Agent sent to upstream services (the weather service requires one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Vegetation primary tier: NDVI crop-health analysis endpoint
    #[serde(default = "default_ndvi_base_url")]
    pub ndvi_base_url: String,
    #[serde(default)]
    pub ndvi_api_key: Option<String>,

    /// Vegetation secondary tier: vision-model analysis endpoint
    #[serde(default = "default_vision_base_url")]
    pub vision_base_url: String,
    #[serde(default)]
    pub vision_api_key: Option<String>,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    #[serde(default = "default_overpass_base_url")]
    pub overpass_base_url: String,

    /// Incident-automation webhook; unset means demo ticketing
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Issue tracker base URL used to build ticket links
    #[serde(default = "default_ticket_base_url")]
    pub ticket_base_url: String,

    #[serde(default = "default_vegetation_timeout")]
    pub vegetation_timeout_secs: u64,
    #[serde(default = "default_weather_timeout")]
    pub weather_timeout_secs: u64,
    #[serde(default = "default_infrastructure_timeout")]
    pub infrastructure_timeout_secs: u64,
    #[serde(default = "default_ticketing_timeout")]
    pub ticketing_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        // serde defaults and Default must agree; route through an empty table
        toml::from_str("").expect("empty provider config parses")
    }
}

/// Risk fusion policy values.
///
/// These are tunable demo policy, not physical constants; the qualitative
/// contracts (monotone severity, graceful degradation, determinism) hold
/// for any sane values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_vegetation_weight")]
    pub vegetation_weight: f64,
    #[serde(default = "default_weather_weight")]
    pub weather_weight: f64,
    #[serde(default = "default_infrastructure_weight")]
    pub infrastructure_weight: f64,

    /// Ascending severity thresholds: MEDIUM, HIGH, EXTREME
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_extreme_threshold")]
    pub extreme_threshold: f64,

    /// Minimum risk level that triggers incident-ticket creation
    #[serde(default = "default_ticket_threshold")]
    pub ticket_threshold: f64,

    /// Confidence never drops below this, even with all providers failed
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty risk config parses")
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Overall wall-clock budget for one analysis, enforced by the watchdog
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
    /// Per-analysis progress channel capacity; lagging subscribers drop
    /// the oldest events
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty analysis config parses")
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:5740".to_string()
}

fn default_user_agent() -> String {
    "PyroGuardSentinel/0.1 (contact: ops@pyroguard.example)".to_string()
}

fn default_ndvi_base_url() -> String {
    "https://api.crop-health.example/v1/ndvi".to_string()
}

fn default_vision_base_url() -> String {
    "https://api.vision.example/v1/analyze".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_overpass_base_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_ticket_base_url() -> String {
    "https://pyroguard.atlassian.net".to_string()
}

fn default_vegetation_timeout() -> u64 {
    10
}

fn default_weather_timeout() -> u64 {
    10
}

fn default_infrastructure_timeout() -> u64 {
    8
}

fn default_ticketing_timeout() -> u64 {
    12
}

fn default_vegetation_weight() -> f64 {
    0.40
}

fn default_weather_weight() -> f64 {
    0.35
}

fn default_infrastructure_weight() -> f64 {
    0.25
}

fn default_medium_threshold() -> f64 {
    0.3
}

fn default_high_threshold() -> f64 {
    0.6
}

fn default_extreme_threshold() -> f64 {
    0.8
}

fn default_ticket_threshold() -> f64 {
    0.3
}

fn default_confidence_floor() -> f64 {
    0.1
}

fn default_budget_secs() -> u64 {
    25
}

fn default_channel_capacity() -> usize {
    64
}

impl TomlConfig {
    /// Load configuration: `PYRO_CONFIG` path, else `./pyroguard.toml` if
    /// present, else compiled defaults; then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                info!("Loading config from {} ({})", path, CONFIG_PATH_ENV);
                Self::load_from_file(Path::new(&path))?
            }
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    info!("Loading config from {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(default_path)?
                } else {
                    TomlConfig::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; missing tables fall back to defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))
    }

    /// Overlay environment variables on top of file/default values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("PYRO_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(key) = std::env::var("PYRO_NDVI_API_KEY") {
            self.providers.ndvi_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("PYRO_VISION_API_KEY") {
            self.providers.vision_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("PYRO_WEBHOOK_URL") {
            self.providers.webhook_url = Some(url);
        }
    }

    /// Reject configurations that would break the fusion contracts
    pub fn validate(&self) -> Result<()> {
        let risk = &self.risk;
        if risk.medium_threshold > risk.high_threshold
            || risk.high_threshold > risk.extreme_threshold
        {
            return Err(Error::Config(
                "severity thresholds must ascend: medium <= high <= extreme".to_string(),
            ));
        }
        let weight_sum =
            risk.vegetation_weight + risk.weather_weight + risk.infrastructure_weight;
        if !(0.99..=1.01).contains(&weight_sum) {
            warn!(
                weight_sum,
                "risk fusion weights do not sum to 1.0; risk levels will be scaled"
            );
        }
        if self.analysis.budget_secs == 0 {
            return Err(Error::Config("analysis budget must be non-zero".to_string()));
        }
        Ok(())
    }
}
