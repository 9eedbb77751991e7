//! ---
//! cops_section: "02-data-model"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Data model shared across console components."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! Data model for the C-OPS console: live twin snapshots as published by
//! the feed, run-log records produced by dispatched actions, and the
//! request/response contracts of the analysis backend.

pub mod request;
pub mod run;
pub mod twin;

pub use request::{
    AutoLevel, AutopilotRequest, ExplainRequest, ProcurementRequest, ProviderProfile,
    ScenarioSpec, TrafficMode,
};
pub use run::{
    AutopilotCase, AutopilotOutcome, Enrichment, GroupToken, PlanAction, PlanStep,
    ProcurementExplanation, ProcurementOutcome, ProcurementParams, ProviderRank, RunId,
    RunPayload, RunRecord, ScenarioScore, SuggestedGroup,
};
pub use twin::{DerivedStatus, FeedFrame, HealthState, RiskLevel, TwinKey, TwinSnapshot};
