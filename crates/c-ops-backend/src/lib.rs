//! ---
//! cops_section: "05-networking-external-interfaces"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Analysis backend client surface."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! Client surface for the fleet analysis backend. The session core only
//! sees the [`FleetBackend`] trait; the HTTP implementation lives in
//! [`http`]. All three operations are synchronous request/response calls
//! whose failures carry the backend's `detail` field.

pub mod http;

use async_trait::async_trait;
use c_ops_model::{
    AutopilotOutcome, AutopilotRequest, Enrichment, ExplainRequest, ProcurementOutcome,
    ProcurementRequest,
};

pub use http::HttpFleetBackend;

/// Errors surfaced by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Non-success response; `detail` carries the backend's own diagnosis.
    #[error("backend returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    /// Request never completed (connect, timeout, mid-body failure).
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Response body did not match the documented contract.
    #[error("backend response failed to decode: {0}")]
    Decode(#[source] reqwest::Error),
    /// The configured base url or endpoint path is unusable.
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The analysis/recommendation backend, as seen by the console core.
#[async_trait]
pub trait FleetBackend: Send + Sync + 'static {
    /// Run a fleet-wide autopilot scan.
    async fn run_autopilot(
        &self,
        request: &AutopilotRequest,
    ) -> Result<AutopilotOutcome, BackendError>;

    /// Produce a secondary explanation for a finished autopilot run.
    async fn explain_autopilot(
        &self,
        request: &ExplainRequest,
    ) -> Result<Enrichment, BackendError>;

    /// Rank candidate service providers over simulated incident loads.
    async fn recommend_provider(
        &self,
        request: &ProcurementRequest,
    ) -> Result<ProcurementOutcome, BackendError>;
}
