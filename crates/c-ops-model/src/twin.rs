//! ---
//! cops_section: "02-data-model"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Data model shared across console components."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health verdict derived by the twin pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthState {
    #[default]
    Ok,
    Degraded,
    Down,
    /// Forward-compatibility fallback for verdicts this build does not know.
    #[serde(other)]
    Unknown,
}

/// Risk classification derived by the twin pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    None,
    Suspect,
    Alert,
    Critical,
    #[serde(other)]
    Unknown,
}

/// Derived status block carried by every twin snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStatus {
    #[serde(default)]
    pub health: HealthState,
    #[serde(default)]
    pub risk: RiskLevel,
    /// Probability the unit goes (or stays) down within six hours.
    #[serde(default)]
    pub down_prob_6h: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Composite identity of one monitored charging unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinKey {
    pub station_id: String,
    pub charger_id: String,
}

impl TwinKey {
    pub fn new(station_id: impl Into<String>, charger_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            charger_id: charger_id.into(),
        }
    }

    /// Canonical `"<station>::<charger>"` rendering used by view consumers.
    pub fn composite(&self) -> String {
        format!("{}::{}", self.station_id, self.charger_id)
    }
}

impl fmt::Display for TwinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.station_id, self.charger_id)
    }
}

/// Live snapshot of one charging unit as published by the feed.
///
/// Snapshots are immutable value objects: the feed always publishes a
/// complete collection, never per-twin patches. Fields the console does
/// not consume (raw signals, station metadata) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinSnapshot {
    pub station_id: String,
    pub charger_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub derived: DerivedStatus,
}

impl TwinSnapshot {
    pub fn key(&self) -> TwinKey {
        TwinKey::new(self.station_id.clone(), self.charger_id.clone())
    }
}

/// One feed message: the complete current twin collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeedFrame {
    #[serde(default)]
    pub items: Vec<TwinSnapshot>,
}
