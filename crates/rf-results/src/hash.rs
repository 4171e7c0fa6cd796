//! Content-based hashing for run IDs.

use rf_profile::SolderProfile;
use rf_runner::OvenConfig;
use sha2::{Digest, Sha256};

/// Short id from the profile, the oven configuration and the start stamp.
pub fn compute_run_id(profile: &SolderProfile, config: &OvenConfig, timestamp: &str) -> String {
    let mut hasher = Sha256::new();

    let profile_json = serde_json::to_string(profile).unwrap_or_default();
    hasher.update(profile_json.as_bytes());

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    hasher.update(timestamp.as_bytes());

    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
