//! ---
//! cops_section: "01-core-functionality"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Shared primitives and utilities for the console runtime."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use chrono::{DateTime, Local, Utc};

/// Render a UTC timestamp in the operator's local time, seconds precision.
pub fn local_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Whole minutes elapsed between two instants, clamped at zero.
pub fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_minutes().max(0)
}
