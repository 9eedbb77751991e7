//! ---
//! cops_section: "01-core-functionality"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Session lifecycle and run correlation for the console."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use c_ops_backend::{BackendError, FleetBackend};
use c_ops_common::config::AppConfig;
use c_ops_feed::{FeedHandle, FeedHealth, FeedMetrics, TwinFeedBuilder, TwinSink};
use c_ops_model::{
    AutopilotRequest, ExplainRequest, ProcurementParams, ProcurementRequest, RunId, RunRecord,
    TwinSnapshot,
};
use c_ops_store::{AttachOutcome, RunLog, RunLogError, TwinCollection};
use c_ops_view::{DisplayMode, ViewCache, ViewOutput};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::correlate::{resolve_enrichment_target, CorrelationError, DispatchReceipt};

/// Failures of an enrichment request.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// Rejected precondition: nothing eligible to explain. No backend call
    /// was made and no log entry was written.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    /// The backend call itself failed; an `error` record was appended.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The resolved record refused the payload.
    #[error(transparent)]
    RunLog(#[from] RunLogError),
}

#[derive(Debug, Default)]
struct ViewSelection {
    mode: DisplayMode,
    active: Option<RunId>,
}

/// Process-wide console state with an explicit lifecycle.
///
/// Owns the live twin collection and the run log for the duration of one
/// operator session. All mutation goes through the session's own
/// operations; collaborators only ever receive owned snapshots. One
/// session carries at most one live feed subscription.
pub struct ConsoleSession {
    config: Arc<AppConfig>,
    backend: Arc<dyn FleetBackend>,
    twins: Arc<RwLock<TwinCollection>>,
    runs: RwLock<RunLog>,
    selection: RwLock<ViewSelection>,
    last_dispatch: RwLock<Option<DispatchReceipt>>,
    view_cache: Mutex<ViewCache>,
    feed: Mutex<Option<FeedHandle>>,
}

impl ConsoleSession {
    /// Build the state container. The feed is attached separately via
    /// [`ConsoleSession::spawn_feed`].
    pub fn init(config: AppConfig, backend: Arc<dyn FleetBackend>) -> Self {
        let capacity = config.run_log.capacity;
        Self {
            config: Arc::new(config),
            backend,
            twins: Arc::new(RwLock::new(TwinCollection::new())),
            runs: RwLock::new(RunLog::new(capacity)),
            selection: RwLock::new(ViewSelection::default()),
            last_dispatch: RwLock::new(None),
            view_cache: Mutex::new(ViewCache::new()),
            feed: Mutex::new(None),
        }
    }

    /// Open the live feed subscription. At most one per session lifetime.
    pub fn spawn_feed(&self, metrics: Option<FeedMetrics>) -> Result<()> {
        let mut slot = self.feed.lock();
        if slot.is_some() {
            anyhow::bail!("feed subscription already active for this session");
        }
        let sink: Arc<dyn TwinSink> = self.twins.clone();
        let mut builder = TwinFeedBuilder::new(self.config.feed.clone(), sink);
        if let Some(metrics) = metrics {
            builder = builder.with_metrics(metrics);
        }
        *slot = Some(builder.spawn()?);
        Ok(())
    }

    /// Connection-health signal of the live feed, if one is attached.
    pub fn feed_health(&self) -> Option<watch::Receiver<FeedHealth>> {
        self.feed.lock().as_ref().map(FeedHandle::health)
    }

    /// Close the feed subscription and stop processing messages. State
    /// remains readable afterwards.
    pub async fn teardown(&self) -> Result<()> {
        let handle = self.feed.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await?;
        }
        info!("console session torn down");
        Ok(())
    }

    /// Dispatch a fleet autopilot run and record the outcome.
    ///
    /// On success the new record becomes the active run and the map
    /// switches to the filtered view. On failure an `error` record is
    /// appended; the failure never propagates past the returned result.
    pub async fn dispatch_autopilot(
        &self,
        overrides: Option<AutopilotRequest>,
    ) -> Result<DispatchReceipt, BackendError> {
        let request =
            overrides.unwrap_or_else(|| AutopilotRequest::from(&self.config.autopilot));
        info!(
            top_n = request.top_n,
            auto_top_k = request.auto_top_k,
            "dispatching fleet autopilot"
        );

        match self.backend.run_autopilot(&request).await {
            Ok(outcome) => {
                let title = format!(
                    "Fleet autopilot: picked {} of {} candidates",
                    outcome.picked_k, outcome.total_candidates
                );
                let group = c_ops_model::GroupToken::new();
                let record = RunRecord::autopilot(title, group, outcome);
                let receipt = DispatchReceipt {
                    run: record.id,
                    group,
                };
                self.runs.write().append(record);
                {
                    let mut selection = self.selection.write();
                    selection.active = Some(receipt.run);
                    selection.mode = DisplayMode::Filtered;
                }
                *self.last_dispatch.write() = Some(receipt);
                info!(run = %receipt.run, "autopilot run recorded");
                Ok(receipt)
            }
            Err(err) => {
                warn!(error = %err, "autopilot dispatch failed");
                self.runs
                    .write()
                    .append(RunRecord::failure("Fleet autopilot failed", err.to_string()));
                Err(err)
            }
        }
    }

    /// Request a secondary explanation for an autopilot run.
    ///
    /// With no explicit target the most recently dispatched run wins. The
    /// correlator rejects the request before any backend call when nothing
    /// eligible exists. A target deleted while the request was in flight
    /// drops the response silently; it is never resurrected.
    pub async fn request_enrichment(
        &self,
        target: Option<DispatchReceipt>,
    ) -> Result<RunId, EnrichmentError> {
        let remembered = target.or(*self.last_dispatch.read());
        let (resolved, cases) = {
            let runs = self.runs.read();
            let resolved = resolve_enrichment_target(&runs, remembered.as_ref())?;
            let cases = runs
                .get(resolved)
                .and_then(RunRecord::cases)
                .map(|cases| cases.to_vec())
                .unwrap_or_default();
            (resolved, cases)
        };

        info!(run = %resolved, cases = cases.len(), "requesting autopilot enrichment");
        let request = ExplainRequest {
            cases,
            top_k: self.config.autopilot.explain_top_k,
        };

        match self.backend.explain_autopilot(&request).await {
            Ok(enrichment) => {
                match self.runs.write().attach_enrichment(resolved, enrichment)? {
                    AttachOutcome::Attached => {
                        info!(run = %resolved, "enrichment attached");
                    }
                    AttachOutcome::Missing => {
                        debug!(run = %resolved, "enrichment target removed before completion; dropping result");
                    }
                }
                Ok(resolved)
            }
            Err(err) => {
                warn!(run = %resolved, error = %err, "enrichment request failed");
                self.runs.write().append(RunRecord::failure(
                    "Autopilot explanation failed",
                    err.to_string(),
                ));
                Err(err.into())
            }
        }
    }

    /// Dispatch a provider recommendation and record the outcome. The map
    /// view is unaffected; only autopilot runs carry cases.
    pub async fn dispatch_procurement(
        &self,
        overrides: Option<ProcurementRequest>,
    ) -> Result<RunId, BackendError> {
        let request =
            overrides.unwrap_or_else(|| ProcurementRequest::from(&self.config.procurement));
        let params = ProcurementParams {
            incidents: request.n_incidents,
            provider_count: request.providers.len(),
            use_llm: request.use_llm,
        };
        info!(
            incidents = params.incidents,
            providers = params.provider_count,
            "dispatching provider recommendation"
        );

        match self.backend.recommend_provider(&request).await {
            Ok(outcome) => {
                let title = format!(
                    "Provider selection: winner {}",
                    outcome.winner.as_deref().unwrap_or("-")
                );
                let record = RunRecord::procurement(title, params, outcome);
                let id = self.runs.write().append(record);
                info!(run = %id, "procurement run recorded");
                Ok(id)
            }
            Err(err) => {
                warn!(error = %err, "procurement dispatch failed");
                self.runs.write().append(RunRecord::failure(
                    "Provider selection failed",
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }

    /// Make `id` the active run for view derivation. Returns whether the
    /// run exists.
    pub fn select_run(&self, id: RunId) -> bool {
        if self.runs.read().get(id).is_none() {
            return false;
        }
        self.selection.write().active = Some(id);
        true
    }

    pub fn set_display_mode(&self, mode: DisplayMode) {
        self.selection.write().mode = mode;
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.selection.read().mode
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.selection.read().active
    }

    /// Reset the map to the unfiltered view with no active run.
    pub fn reset_view(&self) {
        let mut selection = self.selection.write();
        selection.mode = DisplayMode::All;
        selection.active = None;
    }

    /// Delete one run. Clears the active selection when it pointed at the
    /// removed run.
    pub fn remove_run(&self, id: RunId) -> bool {
        let removed = self.runs.write().remove(id);
        if removed {
            let mut selection = self.selection.write();
            if selection.active == Some(id) {
                selection.active = None;
            }
        }
        removed
    }

    /// Drop every run record and reset the view, as the console's
    /// clear-all control does.
    pub fn clear_runs(&self) {
        self.runs.write().clear();
        *self.last_dispatch.write() = None;
        self.reset_view();
    }

    /// Compute (or reuse) the derived map view for the current state.
    pub fn derived_view(&self) -> ViewOutput {
        let twins = self.twins.read();
        let runs = self.runs.read();
        let (mode, active) = {
            let selection = self.selection.read();
            (selection.mode, selection.active)
        };
        self.view_cache
            .lock()
            .get_or_compute(&twins, &runs, active, mode)
    }

    /// Owned copy of the run log, newest first.
    pub fn run_log_snapshot(&self) -> Vec<RunRecord> {
        self.runs.read().snapshot()
    }

    /// Owned copy of the live twin collection, in published order.
    pub fn twins_snapshot(&self) -> Vec<TwinSnapshot> {
        self.twins.read().snapshot()
    }

    pub fn run_count(&self) -> usize {
        self.runs.read().len()
    }

    pub fn twin_count(&self) -> usize {
        self.twins.read().len()
    }

    /// Apply a twin collection directly, bypassing the feed. Intended for
    /// harnesses that drive the session without a live subscription.
    pub fn replace_twins(&self, twins: Vec<TwinSnapshot>) {
        self.twins.write().replace(twins);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
