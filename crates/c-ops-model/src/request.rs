//! ---
//! cops_section: "02-data-model"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Data model shared across console components."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use c_ops_common::config::{AutopilotDefaults, ProcurementDefaults, ProviderDefault};
use serde::{Deserialize, Serialize};

use crate::run::AutopilotCase;

/// Automation ceiling for autopilot plans: `safe` keeps automatic
/// execution to remote actions, `assist` additionally proposes dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AutoLevel {
    #[default]
    Safe,
    Assist,
}

/// Fleet-scan parameters for an autopilot dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotRequest {
    pub top_n: u32,
    pub auto_top_k: u32,
    pub min_down_minutes: u32,
    pub auto_level: AutoLevel,
    pub use_traffic: bool,
    pub status_codes: Vec<u8>,
    pub base_lat: f64,
    pub base_lon: f64,
    pub sla_minutes: u32,
    pub remote_recovery_rate: f64,
}

impl From<&AutopilotDefaults> for AutopilotRequest {
    fn from(defaults: &AutopilotDefaults) -> Self {
        let auto_level = match defaults.auto_level.as_str() {
            "assist" => AutoLevel::Assist,
            _ => AutoLevel::Safe,
        };
        Self {
            top_n: defaults.top_n,
            auto_top_k: defaults.auto_top_k,
            min_down_minutes: defaults.min_down_minutes,
            auto_level,
            use_traffic: defaults.use_traffic,
            status_codes: defaults.status_codes.clone(),
            base_lat: defaults.base_lat,
            base_lon: defaults.base_lon,
            sla_minutes: defaults.sla_minutes,
            remote_recovery_rate: defaults.remote_recovery_rate,
        }
    }
}

/// Enrichment request: the case list to explain plus a case budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub cases: Vec<AutopilotCase>,
    pub top_k: u32,
}

/// One candidate service provider evaluated by a procurement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub name: String,
    pub base_lat: f64,
    pub base_lon: f64,
    #[serde(default = "default_crews")]
    pub crews: u32,
    pub remote_recovery_rate: f64,
    #[serde(default = "default_provider_sla")]
    pub sla_minutes: u32,
}

fn default_crews() -> u32 {
    1
}

fn default_provider_sla() -> u32 {
    60
}

impl From<&ProviderDefault> for ProviderProfile {
    fn from(provider: &ProviderDefault) -> Self {
        Self {
            name: provider.name.clone(),
            base_lat: provider.base_lat,
            base_lon: provider.base_lon,
            crews: default_crews(),
            remote_recovery_rate: provider.remote_recovery_rate,
            sla_minutes: default_provider_sla(),
        }
    }
}

/// Traffic condition assumed by one procurement scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrafficMode {
    Free,
    #[default]
    Normal,
    Congested,
}

/// One named simulation scenario inside a procurement request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSpec {
    pub name: String,
    pub traffic_mode: TrafficMode,
}

fn default_w_sla() -> f64 {
    0.55
}

fn default_w_p90() -> f64 {
    0.25
}

fn default_w_remote() -> f64 {
    0.20
}

/// Provider-recommendation request. Scenario list defaults server-side
/// to one run per traffic mode when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementRequest {
    pub providers: Vec<ProviderProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<ScenarioSpec>>,
    pub n_incidents: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(rename = "w_sla", default = "default_w_sla")]
    pub w_sla: f64,
    #[serde(rename = "w_p90", default = "default_w_p90")]
    pub w_p90: f64,
    #[serde(rename = "w_remote", default = "default_w_remote")]
    pub w_remote: f64,
    #[serde(rename = "useLLM")]
    pub use_llm: bool,
}

impl From<&ProcurementDefaults> for ProcurementRequest {
    fn from(defaults: &ProcurementDefaults) -> Self {
        Self {
            providers: defaults.providers.iter().map(ProviderProfile::from).collect(),
            scenarios: None,
            n_incidents: defaults.incidents,
            seed: defaults.seed,
            w_sla: default_w_sla(),
            w_p90: default_w_p90(),
            w_remote: default_w_remote(),
            use_llm: defaults.use_llm,
        }
    }
}
