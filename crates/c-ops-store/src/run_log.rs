//! ---
//! cops_section: "03-state-stores"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "In-memory state containers for the console session."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::collections::VecDeque;

use c_ops_model::{Enrichment, RunId, RunPayload, RunRecord};
use tracing::debug;

/// Errors raised by run-log mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunLogError {
    /// Enrichment was addressed at a record variant that cannot carry it.
    #[error("run {id} is a {kind} record and cannot carry enrichment")]
    NotEnrichable { id: RunId, kind: &'static str },
}

/// Result of an enrichment attachment attempt against an identity that may
/// no longer be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The payload now sits on the addressed record.
    Attached,
    /// The record was evicted or deleted in the meantime; nothing changed.
    Missing,
}

/// Append-only, capacity-bounded run log, newest entry first.
///
/// Entries are never reordered after insertion; the only mutation an entry
/// ever sees is enrichment attachment. Exceeding the bound silently evicts
/// from the back.
#[derive(Debug, Clone)]
pub struct RunLog {
    entries: VecDeque<RunRecord>,
    capacity: usize,
    revision: u64,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            revision: 0,
        }
    }

    /// Insert a record at the front and return its identity. Evicts the
    /// oldest entries once the bound is exceeded.
    pub fn append(&mut self, record: RunRecord) -> RunId {
        let id = record.id;
        self.entries.push_front(record);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(run = %evicted.id, kind = evicted.kind(), "run log bound reached; evicting oldest entry");
            }
        }
        self.revision += 1;
        id
    }

    /// Delete the record with `id` if present. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, id: RunId) -> bool {
        let Some(index) = self.entries.iter().position(|record| record.id == id) else {
            return false;
        };
        self.entries.remove(index);
        self.revision += 1;
        true
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.entries.clear();
        self.revision += 1;
    }

    /// Attach (or replace) the enrichment payload of the record with `id`.
    ///
    /// A missing identity is reported as [`AttachOutcome::Missing`] and
    /// leaves the log untouched; addressing a non-autopilot record is a
    /// contract violation and rejected. Attachment never moves the record.
    pub fn attach_enrichment(
        &mut self,
        id: RunId,
        payload: Enrichment,
    ) -> Result<AttachOutcome, RunLogError> {
        let Some(index) = self.entries.iter().position(|record| record.id == id) else {
            return Ok(AttachOutcome::Missing);
        };
        let record = &mut self.entries[index];
        let kind = record.kind();
        match &mut record.payload {
            RunPayload::Autopilot { enrichment, .. } => {
                *enrichment = Some(payload);
            }
            _ => return Err(RunLogError::NotEnrichable { id, kind }),
        }
        self.revision += 1;
        Ok(AttachOutcome::Attached)
    }

    pub fn get(&self, id: RunId) -> Option<&RunRecord> {
        self.entries.iter().find(|record| record.id == id)
    }

    /// Index of the record with `id` in newest-first order.
    pub fn position(&self, id: RunId) -> Option<usize> {
        self.entries.iter().position(|record| record.id == id)
    }

    /// Newest record, if any.
    pub fn latest(&self) -> Option<&RunRecord> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord> {
        self.entries.iter()
    }

    /// Owned copy of the full log, newest first, for rendering consumers.
    pub fn snapshot(&self) -> Vec<RunRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Monotonic counter bumped on every effective mutation. Consumed by
    /// the view cache.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c_ops_model::{AutopilotOutcome, GroupToken};

    fn autopilot_record(title: &str) -> RunRecord {
        RunRecord::autopilot(
            title,
            GroupToken::new(),
            AutopilotOutcome {
                total_candidates: 10,
                picked_k: 0,
                cases: Vec::new(),
            },
        )
    }

    fn sample_enrichment() -> Enrichment {
        Enrichment {
            summary: "three long-running outages cluster downtown".into(),
            top_reasons: vec!["sustained downtime".into()],
            risks: vec!["repeat failure".into()],
            suggested_groups: Vec::new(),
        }
    }

    #[test]
    fn append_then_remove_restores_prior_state() {
        let mut log = RunLog::new(30);
        let before = log.snapshot();
        let id = log.append(autopilot_record("autopilot #1"));
        assert_eq!(log.len(), 1);
        assert!(log.remove(id));
        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn eviction_keeps_exactly_the_bound_newest_first() {
        let mut log = RunLog::new(30);
        let mut ids = Vec::new();
        for i in 0..45 {
            ids.push(log.append(autopilot_record(&format!("run {i}"))));
        }
        assert_eq!(log.len(), 30);
        // Newest 30 survive, in arrival order (front = most recent).
        let surviving: Vec<_> = log.iter().map(|r| r.id).collect();
        let expected: Vec<_> = ids.iter().rev().take(30).copied().collect();
        assert_eq!(surviving, expected);
        // The first 15 were evicted.
        assert!(log.get(ids[0]).is_none());
        assert!(log.get(ids[14]).is_none());
        assert!(log.get(ids[15]).is_some());
    }

    #[test]
    fn append_never_reorders_existing_entries() {
        let mut log = RunLog::new(5);
        let a = log.append(autopilot_record("a"));
        let b = log.append(autopilot_record("b"));
        let c = log.append(autopilot_record("c"));
        assert_eq!(log.position(c), Some(0));
        assert_eq!(log.position(b), Some(1));
        assert_eq!(log.position(a), Some(2));
    }

    #[test]
    fn attach_changes_only_the_enrichment_field_and_keeps_position() {
        let mut log = RunLog::new(30);
        let first = log.append(autopilot_record("first"));
        let target = log.append(autopilot_record("target"));
        let last = log.append(autopilot_record("last"));

        let before = log.get(target).cloned().unwrap();
        let outcome = log
            .attach_enrichment(target, sample_enrichment())
            .expect("autopilot accepts enrichment");
        assert_eq!(outcome, AttachOutcome::Attached);

        let after = log.get(target).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.group, before.group);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.title, before.title);
        assert_eq!(after.enrichment().unwrap().summary, sample_enrichment().summary);
        assert_eq!(log.position(target), Some(1));
        assert_eq!(log.position(last), Some(0));
        assert_eq!(log.position(first), Some(2));
    }

    #[test]
    fn reattachment_replaces_the_previous_payload() {
        let mut log = RunLog::new(30);
        let id = log.append(autopilot_record("run"));
        log.attach_enrichment(id, sample_enrichment()).unwrap();
        let replacement = Enrichment {
            summary: "revised".into(),
            ..sample_enrichment()
        };
        log.attach_enrichment(id, replacement).unwrap();
        assert_eq!(log.get(id).unwrap().enrichment().unwrap().summary, "revised");
    }

    #[test]
    fn attach_to_unknown_identity_is_a_noop() {
        let mut log = RunLog::new(30);
        log.append(autopilot_record("run"));
        let before = log.snapshot();
        let revision = log.revision();
        let outcome = log
            .attach_enrichment(RunId::new(), sample_enrichment())
            .expect("missing identity is not an error");
        assert_eq!(outcome, AttachOutcome::Missing);
        assert_eq!(log.snapshot(), before);
        assert_eq!(log.revision(), revision);
    }

    #[test]
    fn attach_to_error_record_is_rejected() {
        let mut log = RunLog::new(30);
        let id = log.append(RunRecord::failure("autopilot failed", "boom"));
        let err = log
            .attach_enrichment(id, sample_enrichment())
            .expect_err("error records reject enrichment");
        assert_eq!(err, RunLogError::NotEnrichable { id, kind: "error" });
    }

    #[test]
    fn remove_of_unknown_identity_is_a_noop() {
        let mut log = RunLog::new(30);
        log.append(autopilot_record("run"));
        let revision = log.revision();
        assert!(!log.remove(RunId::new()));
        assert_eq!(log.len(), 1);
        assert_eq!(log.revision(), revision);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = RunLog::new(30);
        log.append(autopilot_record("a"));
        log.append(autopilot_record("b"));
        log.clear();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }
}
