//! ---
//! cops_section: "04-derived-views"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Derived map-view filter and highlight computation."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! Derived map view: which twins to show and which to emphasise, computed
//! from the live collection and the active run record. The computation is
//! pure; [`ViewCache`] only memoises the last result keyed on the store
//! revisions.

use std::collections::BTreeSet;

use c_ops_model::{RunId, TwinKey};
use c_ops_store::{RunLog, TwinCollection};
use serde::{Deserialize, Serialize};

/// Map display mode selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Show the full twin collection.
    #[default]
    All,
    /// Restrict the map to the active run's flagged cases.
    Filtered,
}

/// Output of one view computation. Owned copies, safe to hand to
/// rendering collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutput {
    /// Twins to display, in feed-published order.
    pub visible_twins: Vec<c_ops_model::TwinSnapshot>,
    /// Composite keys to emphasise, regardless of display mode.
    pub highlight_keys: BTreeSet<TwinKey>,
}

/// Compute the derived view from current state.
///
/// Referentially transparent: identical inputs always produce identical
/// outputs. An active identity that no longer resolves, or resolves to a
/// record without cases, degrades to the unfiltered view.
pub fn compute_view(
    twins: &TwinCollection,
    log: &RunLog,
    active: Option<RunId>,
    mode: DisplayMode,
) -> ViewOutput {
    let cases = active
        .and_then(|id| log.get(id))
        .and_then(|record| record.cases())
        .filter(|cases| !cases.is_empty());

    let Some(cases) = cases else {
        return ViewOutput {
            visible_twins: twins.snapshot(),
            highlight_keys: BTreeSet::new(),
        };
    };

    let highlight_keys: BTreeSet<TwinKey> = cases.iter().map(|case| case.key()).collect();

    let visible_twins = match mode {
        DisplayMode::All => twins.snapshot(),
        DisplayMode::Filtered => twins
            .iter()
            .filter(|twin| highlight_keys.contains(&twin.key()))
            .cloned()
            .collect(),
    };

    ViewOutput {
        visible_twins,
        highlight_keys,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ViewFingerprint {
    twin_revision: u64,
    log_revision: u64,
    active: Option<RunId>,
    mode: DisplayMode,
}

/// Last-result memo for [`compute_view`]. Purely an optimisation: a stale
/// or absent cache only costs a recomputation, never correctness.
#[derive(Debug, Default)]
pub struct ViewCache {
    last: Option<(ViewFingerprint, ViewOutput)>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached output when none of the inputs changed, otherwise
    /// recompute and retain the result.
    pub fn get_or_compute(
        &mut self,
        twins: &TwinCollection,
        log: &RunLog,
        active: Option<RunId>,
        mode: DisplayMode,
    ) -> ViewOutput {
        let fingerprint = ViewFingerprint {
            twin_revision: twins.revision(),
            log_revision: log.revision(),
            active,
            mode,
        };
        if let Some((cached_fingerprint, output)) = &self.last {
            if *cached_fingerprint == fingerprint {
                return output.clone();
            }
        }
        let output = compute_view(twins, log, active, mode);
        self.last = Some((fingerprint, output.clone()));
        output
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c_ops_model::{AutopilotCase, AutopilotOutcome, GroupToken, RunRecord, TwinSnapshot};

    fn twin(station: &str, charger: &str) -> TwinSnapshot {
        serde_json::from_str(&format!(
            r#"{{ "stationId": "{station}", "chargerId": "{charger}" }}"#
        ))
        .expect("twin decodes")
    }

    fn case(station: &str, charger: &str) -> AutopilotCase {
        serde_json::from_str(&format!(
            r#"{{ "stationId": "{station}", "chargerId": "{charger}", "score": 0.9 }}"#
        ))
        .expect("case decodes")
    }

    fn autopilot_with_cases(cases: Vec<AutopilotCase>) -> RunRecord {
        let picked = cases.len() as u32;
        RunRecord::autopilot(
            "autopilot",
            GroupToken::new(),
            AutopilotOutcome {
                total_candidates: 10,
                picked_k: picked,
                cases,
            },
        )
    }

    fn composite_set(output: &ViewOutput) -> BTreeSet<String> {
        output
            .highlight_keys
            .iter()
            .map(|key| key.composite())
            .collect()
    }

    #[test]
    fn highlights_are_mode_independent() {
        let mut twins = TwinCollection::new();
        twins.replace(vec![twin("A", "B"), twin("C", "D"), twin("E", "F")]);
        let mut log = RunLog::new(30);
        let active = log.append(autopilot_with_cases(vec![case("A", "B"), case("C", "D")]));

        let expected: BTreeSet<String> = ["A::B".to_string(), "C::D".to_string()].into();
        let all = compute_view(&twins, &log, Some(active), DisplayMode::All);
        let filtered = compute_view(&twins, &log, Some(active), DisplayMode::Filtered);
        assert_eq!(composite_set(&all), expected);
        assert_eq!(composite_set(&filtered), expected);
    }

    #[test]
    fn filtered_mode_restricts_visible_twins_to_case_keys() {
        let mut twins = TwinCollection::new();
        twins.replace(vec![twin("A", "B"), twin("C", "D"), twin("E", "F")]);
        let mut log = RunLog::new(30);
        let active = log.append(autopilot_with_cases(vec![case("A", "B"), case("C", "D")]));

        let all = compute_view(&twins, &log, Some(active), DisplayMode::All);
        assert_eq!(all.visible_twins.len(), 3);

        let filtered = compute_view(&twins, &log, Some(active), DisplayMode::Filtered);
        let visible: Vec<String> = filtered
            .visible_twins
            .iter()
            .map(|t| t.key().composite())
            .collect();
        assert_eq!(visible, vec!["A::B".to_string(), "C::D".to_string()]);
    }

    #[test]
    fn active_record_without_cases_degrades_to_full_view() {
        let mut twins = TwinCollection::new();
        twins.replace(vec![twin("A", "B")]);
        let mut log = RunLog::new(30);
        let active = log.append(autopilot_with_cases(Vec::new()));

        let output = compute_view(&twins, &log, Some(active), DisplayMode::Filtered);
        assert_eq!(output.visible_twins.len(), 1);
        assert!(output.highlight_keys.is_empty());
    }

    #[test]
    fn missing_active_identity_degrades_to_full_view() {
        let mut twins = TwinCollection::new();
        twins.replace(vec![twin("A", "B")]);
        let mut log = RunLog::new(30);
        let id = log.append(autopilot_with_cases(vec![case("A", "B")]));
        log.remove(id);

        let output = compute_view(&twins, &log, Some(id), DisplayMode::Filtered);
        assert_eq!(output.visible_twins.len(), 1);
        assert!(output.highlight_keys.is_empty());
    }

    #[test]
    fn non_autopilot_active_record_yields_no_highlights() {
        let mut twins = TwinCollection::new();
        twins.replace(vec![twin("A", "B")]);
        let mut log = RunLog::new(30);
        let id = log.append(RunRecord::failure("autopilot failed", "boom"));

        let output = compute_view(&twins, &log, Some(id), DisplayMode::Filtered);
        assert!(output.highlight_keys.is_empty());
        assert_eq!(output.visible_twins.len(), 1);
    }

    #[test]
    fn cache_tracks_store_revisions() {
        let mut twins = TwinCollection::new();
        twins.replace(vec![twin("A", "B")]);
        let mut log = RunLog::new(30);
        let active = log.append(autopilot_with_cases(vec![case("A", "B")]));
        let mut cache = ViewCache::new();

        let first = cache.get_or_compute(&twins, &log, Some(active), DisplayMode::Filtered);
        let again = cache.get_or_compute(&twins, &log, Some(active), DisplayMode::Filtered);
        assert_eq!(first, again);

        // A feed replacement must invalidate the memo.
        twins.replace(vec![twin("A", "B"), twin("Z", "9")]);
        let after = cache.get_or_compute(&twins, &log, Some(active), DisplayMode::All);
        assert_eq!(after.visible_twins.len(), 2);
    }
}
