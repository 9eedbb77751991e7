//! ---
//! cops_section: "03-state-stores"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "In-memory state containers for the console session."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! In-memory state owned by the console session: the bounded, newest-first
//! run log and the live twin collection. Both are plain containers; the
//! session layer wraps them in locks and owns all mutation.

pub mod run_log;
pub mod twins;

pub use run_log::{AttachOutcome, RunLog, RunLogError};
pub use twins::TwinCollection;
