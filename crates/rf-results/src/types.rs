//! Result data types.

use rf_profile::SolderProfile;
use rf_runner::{OvenConfig, RunOutcome, RunSummary};
use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub profile_name: String,
    pub timestamp: String,
    pub outcome: RunOutcome,
    pub ambient_c: f64,
    pub elapsed_s: u32,
    pub ticks: u64,
    #[serde(default)]
    pub skipped_ticks: u32,
    pub worst_tick_ms: f64,
    pub profile: SolderProfile,
    pub config: OvenConfig,
    pub software_version: String,
}

impl RunManifest {
    /// Manifest for a finished run, stamped now.
    pub fn from_summary(summary: &RunSummary, profile: &SolderProfile, config: &OvenConfig) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339();
        Self {
            run_id: crate::hash::compute_run_id(profile, config, &timestamp),
            profile_name: profile.description.clone(),
            timestamp,
            outcome: summary.outcome,
            ambient_c: summary.ambient_c,
            elapsed_s: summary.elapsed_s,
            ticks: summary.ticks,
            skipped_ticks: summary.skipped_ticks,
            worst_tick_ms: summary.worst_tick.as_secs_f64() * 1000.0,
            profile: profile.clone(),
            config: config.clone(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
