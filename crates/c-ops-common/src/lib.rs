//! ---
//! cops_section: "01-core-functionality"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Shared primitives and utilities for the console runtime."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
//! Core shared primitives for the C-OPS console workspace.
//! This crate exposes configuration loading, logging setup, and small
//! time utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, AutopilotDefaults, BackendConfig, FeedConfig, LoggingConfig, MetricsConfig,
    ProcurementDefaults, ProviderDefault, RunLogConfig,
};
pub use logging::{init_tracing, LogFormat};
