//! ---
//! cops_section: "01-core-functionality"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Session lifecycle and run correlation for the console."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use c_ops_model::{GroupToken, RunId, RunRecord};
use c_ops_store::RunLog;

/// Correlation token returned by an autopilot dispatch and threaded into a
/// later enrichment request, so the correlator can find "the record that
/// dispatch created" without a live reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub run: RunId,
    pub group: GroupToken,
}

/// Preconditions that reject an enrichment request before any backend call.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// No autopilot run with a non-empty case list exists to explain.
    #[error("no autopilot run with flagged cases to explain")]
    NothingToExplain,
}

/// Resolve which run an enrichment result must attach to.
///
/// Preference order: the remembered run identity, then the newest record
/// sharing the remembered group token, then the newest autopilot record
/// overall. The resolved record must carry a non-empty case list;
/// otherwise the request is rejected before the backend is contacted.
pub fn resolve_enrichment_target(
    log: &RunLog,
    remembered: Option<&DispatchReceipt>,
) -> Result<RunId, CorrelationError> {
    if let Some(receipt) = remembered {
        if let Some(record) = log.get(receipt.run) {
            if record.accepts_enrichment() {
                return require_cases(record);
            }
        }
        if let Some(record) = log
            .iter()
            .find(|record| record.accepts_enrichment() && record.group == Some(receipt.group))
        {
            return require_cases(record);
        }
    }

    let Some(record) = log.iter().find(|record| record.accepts_enrichment()) else {
        return Err(CorrelationError::NothingToExplain);
    };
    require_cases(record)
}

fn require_cases(record: &RunRecord) -> Result<RunId, CorrelationError> {
    match record.cases() {
        Some(cases) if !cases.is_empty() => Ok(record.id),
        _ => Err(CorrelationError::NothingToExplain),
    }
}
