//! ---
//! cops_section: "01-core-functionality"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Session lifecycle and run correlation for the console."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! Console session core: the process-wide state container holding the live
//! twin collection and the run log, the dispatch operations that feed the
//! log, and the correlator that attaches late-arriving enrichment results
//! to the run they belong to.

pub mod correlate;
pub mod session;

pub use correlate::{resolve_enrichment_target, CorrelationError, DispatchReceipt};
pub use session::{ConsoleSession, EnrichmentError};
