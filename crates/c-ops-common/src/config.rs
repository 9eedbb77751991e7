//! ---
//! cops_section: "01-core-functionality"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Shared primitives and utilities for the console runtime."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_stream_url() -> String {
    "http://localhost:8000/stream/twins".to_owned()
}

fn default_snapshot_url() -> Option<String> {
    Some("http://localhost:8000/twins".to_owned())
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_reconnect_initial() -> Duration {
    Duration::from_secs(1)
}

fn default_reconnect_max() -> Duration {
    Duration::from_secs(30)
}

fn default_run_log_capacity() -> usize {
    30
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    false
}

fn default_metrics_listen() -> SocketAddr {
    "127.0.0.1:9899"
        .parse()
        .expect("valid default metrics address")
}

fn default_top_n() -> u32 {
    50
}

fn default_auto_top_k() -> u32 {
    10
}

fn default_min_down_minutes() -> u32 {
    30
}

fn default_auto_level() -> String {
    "safe".to_owned()
}

fn default_use_traffic() -> bool {
    true
}

fn default_status_codes() -> Vec<u8> {
    vec![4, 5]
}

fn default_base_lat() -> f64 {
    37.5665
}

fn default_base_lon() -> f64 {
    126.978
}

fn default_sla_minutes() -> u32 {
    90
}

fn default_remote_recovery_rate() -> f64 {
    0.35
}

fn default_explain_top_k() -> u32 {
    15
}

fn default_incidents() -> u32 {
    60
}

fn default_use_llm() -> bool {
    true
}

fn default_seed() -> Option<u64> {
    Some(42)
}

/// Primary configuration object for the console runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub run_log: RunLogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub autopilot: AutopilotDefaults,
    #[serde(default)]
    pub procurement: ProcurementDefaults,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "C_OPS_CONFIG";

    /// Load configuration from disk, respecting the `C_OPS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.feed.validate()?;
        self.backend.validate()?;
        self.run_log.validate()?;
        self.autopilot.validate()?;
        self.procurement.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Live feed subscription settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Server-push stream endpoint publishing `{ "items": [...] }` frames.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    /// Optional one-shot snapshot endpoint fetched before the stream attaches.
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: Option<String>,
    #[serde(default = "default_reconnect_initial")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub reconnect_initial: Duration,
    #[serde(default = "default_reconnect_max")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub reconnect_max: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            snapshot_url: default_snapshot_url(),
            reconnect_initial: default_reconnect_initial(),
            reconnect_max: default_reconnect_max(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.stream_url)
            .with_context(|| format!("feed stream_url '{}' is not a valid url", self.stream_url))?;
        if let Some(snapshot) = &self.snapshot_url {
            Url::parse(snapshot).with_context(|| {
                format!("feed snapshot_url '{}' is not a valid url", snapshot)
            })?;
        }
        if self.reconnect_initial > self.reconnect_max {
            return Err(anyhow!(
                "feed reconnect_initial must not exceed reconnect_max"
            ));
        }
        Ok(())
    }
}

/// Analysis backend endpoint settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)
            .with_context(|| format!("backend base_url '{}' is not a valid url", self.base_url))?;
        Ok(())
    }
}

/// Run log retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogConfig {
    #[serde(default = "default_run_log_capacity")]
    pub capacity: usize,
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            capacity: default_run_log_capacity(),
        }
    }
}

impl RunLogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(anyhow!("run_log capacity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

/// Defaults for the fleet autopilot dispatch, mirroring the operator
/// console's stock parameters. Individual dispatches may override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutopilotDefaults {
    #[serde(default = "default_top_n")]
    pub top_n: u32,
    #[serde(default = "default_auto_top_k")]
    pub auto_top_k: u32,
    #[serde(default = "default_min_down_minutes")]
    pub min_down_minutes: u32,
    /// Automation level: "safe" (remote actions only) or "assist".
    #[serde(default = "default_auto_level")]
    pub auto_level: String,
    #[serde(default = "default_use_traffic")]
    pub use_traffic: bool,
    #[serde(default = "default_status_codes")]
    pub status_codes: Vec<u8>,
    #[serde(default = "default_base_lat")]
    pub base_lat: f64,
    #[serde(default = "default_base_lon")]
    pub base_lon: f64,
    #[serde(default = "default_sla_minutes")]
    pub sla_minutes: u32,
    #[serde(default = "default_remote_recovery_rate")]
    pub remote_recovery_rate: f64,
    /// Case count forwarded to the enrichment request.
    #[serde(default = "default_explain_top_k")]
    pub explain_top_k: u32,
}

impl Default for AutopilotDefaults {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            auto_top_k: default_auto_top_k(),
            min_down_minutes: default_min_down_minutes(),
            auto_level: default_auto_level(),
            use_traffic: default_use_traffic(),
            status_codes: default_status_codes(),
            base_lat: default_base_lat(),
            base_lon: default_base_lon(),
            sla_minutes: default_sla_minutes(),
            remote_recovery_rate: default_remote_recovery_rate(),
            explain_top_k: default_explain_top_k(),
        }
    }
}

impl AutopilotDefaults {
    pub fn validate(&self) -> Result<()> {
        match self.auto_level.as_str() {
            "safe" | "assist" => {}
            other => {
                return Err(anyhow!(
                    "autopilot auto_level must be 'safe' or 'assist', got '{}'",
                    other
                ))
            }
        }
        if !(0.0..=1.0).contains(&self.remote_recovery_rate) {
            return Err(anyhow!(
                "autopilot remote_recovery_rate must lie within 0.0..=1.0"
            ));
        }
        Ok(())
    }
}

/// A candidate service provider evaluated by procurement runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefault {
    pub name: String,
    pub base_lat: f64,
    pub base_lon: f64,
    #[serde(default = "default_remote_recovery_rate")]
    pub remote_recovery_rate: f64,
}

/// Defaults for provider-recommendation dispatches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementDefaults {
    #[serde(default = "default_incidents")]
    pub incidents: u32,
    #[serde(default = "default_use_llm")]
    pub use_llm: bool,
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub providers: Vec<ProviderDefault>,
}

impl Default for ProcurementDefaults {
    fn default() -> Self {
        Self {
            incidents: default_incidents(),
            use_llm: default_use_llm(),
            seed: default_seed(),
            providers: vec![
                ProviderDefault {
                    name: "provider-a".to_owned(),
                    base_lat: 37.5665,
                    base_lon: 126.978,
                    remote_recovery_rate: 0.35,
                },
                ProviderDefault {
                    name: "provider-b".to_owned(),
                    base_lat: 37.55,
                    base_lon: 126.99,
                    remote_recovery_rate: 0.25,
                },
                ProviderDefault {
                    name: "provider-c".to_owned(),
                    base_lat: 37.58,
                    base_lon: 126.96,
                    remote_recovery_rate: 0.45,
                },
            ],
        }
    }
}

impl ProcurementDefaults {
    pub fn validate(&self) -> Result<()> {
        if self.incidents == 0 {
            return Err(anyhow!("procurement incidents must be at least 1"));
        }
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(anyhow!("procurement providers must carry a name"));
            }
            if !(0.0..=1.0).contains(&provider.remote_recovery_rate) {
                return Err(anyhow!(
                    "provider '{}' remote_recovery_rate must lie within 0.0..=1.0",
                    provider.name
                ));
            }
        }
        Ok(())
    }
}
