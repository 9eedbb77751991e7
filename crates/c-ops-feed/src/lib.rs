//! ---
//! cops_section: "05-networking-external-interfaces"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Server-push twin feed subscription."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! Live twin feed subscriber: one long-lived server-push subscription per
//! console session, applying every complete frame as a full replacement of
//! the local twin collection.

pub mod metrics;
pub mod subscriber;

pub use metrics::{new_registry, FeedMetrics, SharedRegistry};
pub use subscriber::{FeedHandle, FeedHealth, TwinFeedBuilder, TwinSink};
