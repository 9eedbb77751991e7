//! ---
//! cops_section: "02-data-model"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Data model shared across console components."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::twin::TwinKey;

/// Process-unique identity of a run-log record, stable for its lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Correlation token shared by all records of one logical run. Not
/// necessarily unique across the log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupToken(Uuid);

impl GroupToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Remediation action proposed by an autopilot plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanAction {
    OpenCase,
    RemoteDiag,
    RemoteReset,
    Dispatch,
    Escalate,
    Monitor,
    #[serde(other)]
    Unknown,
}

/// One ordered step of an autopilot remediation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: PlanAction,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub eta_min: Option<i64>,
    #[serde(default)]
    pub reason: String,
}

fn default_status_code() -> u8 {
    9
}

/// One flagged charging unit within an autopilot run's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotCase {
    pub station_id: String,
    pub charger_id: String,
    #[serde(default)]
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub down_minutes: Option<i64>,
    #[serde(default = "default_status_code")]
    pub status_code: u8,
    #[serde(default)]
    pub down_prob_6h: f64,
    #[serde(default)]
    pub traffic_congestion: f64,
    #[serde(default)]
    pub output_kw: f64,
    #[serde(default)]
    pub plan: Vec<PlanStep>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl AutopilotCase {
    pub fn key(&self) -> TwinKey {
        TwinKey::new(self.station_id.clone(), self.charger_id.clone())
    }
}

/// Result body of an autopilot run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotOutcome {
    pub total_candidates: u32,
    pub picked_k: u32,
    #[serde(default)]
    pub cases: Vec<AutopilotCase>,
}

/// Suggested work grouping inside an enrichment payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedGroup {
    pub name: String,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Secondary explanation attached to an autopilot record after the fact.
/// Re-attachment replaces the previous payload wholesale; payloads are
/// never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub top_reasons: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub suggested_groups: Vec<SuggestedGroup>,
}

/// Per-scenario score line inside a provider ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioScore {
    pub scenario: String,
    pub score: f64,
    #[serde(default)]
    pub sla_hit_rate: f64,
    #[serde(default)]
    pub eta_p90_min: f64,
    #[serde(default)]
    pub remote_recovery_count: u32,
}

/// One ranked provider in a procurement recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRank {
    pub provider: String,
    pub total_score: f64,
    #[serde(default)]
    pub by_scenario: Vec<ScenarioScore>,
}

/// Optional explanation block of a procurement recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProcurementExplanation {
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub what_to_verify: Vec<String>,
}

/// Result body of a procurement recommendation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementOutcome {
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub ranking: Vec<ProviderRank>,
    #[serde(default)]
    pub llm: Option<ProcurementExplanation>,
}

/// Selection parameters echoed into a procurement record for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementParams {
    pub incidents: u32,
    pub provider_count: usize,
    pub use_llm: bool,
}

/// Payload variants carried by a run-log record.
///
/// Only `Autopilot` accepts enrichment; the store rejects attachment to
/// any other variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RunPayload {
    Autopilot {
        outcome: AutopilotOutcome,
        #[serde(default)]
        enrichment: Option<Enrichment>,
    },
    Procurement {
        params: ProcurementParams,
        outcome: ProcurementOutcome,
    },
    Error {
        detail: String,
    },
}

/// One entry of the operator run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    #[serde(default)]
    pub group: Option<GroupToken>,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub payload: RunPayload,
}

impl RunRecord {
    /// Construct an autopilot record from a completed dispatch.
    pub fn autopilot(
        title: impl Into<String>,
        group: GroupToken,
        outcome: AutopilotOutcome,
    ) -> Self {
        Self {
            id: RunId::new(),
            group: Some(group),
            created_at: Utc::now(),
            title: title.into(),
            payload: RunPayload::Autopilot {
                outcome,
                enrichment: None,
            },
        }
    }

    /// Construct a procurement record from a completed recommendation.
    pub fn procurement(
        title: impl Into<String>,
        params: ProcurementParams,
        outcome: ProcurementOutcome,
    ) -> Self {
        Self {
            id: RunId::new(),
            group: None,
            created_at: Utc::now(),
            title: title.into(),
            payload: RunPayload::Procurement { params, outcome },
        }
    }

    /// Construct an error record surfacing a failed dispatch.
    pub fn failure(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            group: None,
            created_at: Utc::now(),
            title: title.into(),
            payload: RunPayload::Error {
                detail: detail.into(),
            },
        }
    }

    /// Payload kind as a static string, for logging and display routing.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            RunPayload::Autopilot { .. } => "autopilot",
            RunPayload::Procurement { .. } => "procurement",
            RunPayload::Error { .. } => "error",
        }
    }

    /// Whether this record can carry an enrichment payload.
    pub fn accepts_enrichment(&self) -> bool {
        matches!(self.payload, RunPayload::Autopilot { .. })
    }

    /// The case list of an autopilot record, `None` for other variants.
    pub fn cases(&self) -> Option<&[AutopilotCase]> {
        match &self.payload {
            RunPayload::Autopilot { outcome, .. } => Some(&outcome.cases),
            _ => None,
        }
    }

    /// The attached enrichment of an autopilot record, if any.
    pub fn enrichment(&self) -> Option<&Enrichment> {
        match &self.payload {
            RunPayload::Autopilot { enrichment, .. } => enrichment.as_ref(),
            _ => None,
        }
    }
}
