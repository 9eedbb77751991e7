//! ---
//! cops_section: "05-networking-external-interfaces"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Server-push twin feed subscription."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use prometheus::{IntCounter, Opts, Registry};

/// Shared registry type used across the console.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Counters recorded by the feed subscriber.
#[derive(Clone)]
pub struct FeedMetrics {
    frames_applied: IntCounter,
    frames_rejected: IntCounter,
    reconnects: IntCounter,
}

impl FeedMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let frames_applied = IntCounter::with_opts(Opts::new(
            "c_ops_feed_frames_applied_total",
            "Feed frames parsed and applied as full twin-collection replacements",
        ))?;
        registry.register(Box::new(frames_applied.clone()))?;

        let frames_rejected = IntCounter::with_opts(Opts::new(
            "c_ops_feed_frames_rejected_total",
            "Feed frames discarded because their payload failed to parse",
        ))?;
        registry.register(Box::new(frames_rejected.clone()))?;

        let reconnects = IntCounter::with_opts(Opts::new(
            "c_ops_feed_reconnects_total",
            "Reconnection attempts made after the feed stream dropped",
        ))?;
        registry.register(Box::new(reconnects.clone()))?;

        Ok(Self {
            frames_applied,
            frames_rejected,
            reconnects,
        })
    }

    pub fn record_applied(&self) {
        self.frames_applied.inc();
    }

    pub fn record_rejected(&self) {
        self.frames_rejected.inc();
    }

    pub fn record_reconnect(&self) {
        self.reconnects.inc();
    }
}
