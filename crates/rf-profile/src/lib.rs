//! rf-profile: solder profile format, validation, lookup and storage.

pub mod builtin;
pub mod curve;
pub mod schema;
pub mod store;
pub mod validate;

pub use curve::{interpolate, setpoint_at, target_curve};
pub use schema::*;
pub use store::{MAX_PROFILES, ProfileLibrary, ProfileStore};
pub use validate::{
    MAX_DESCRIPTION_LEN, MAX_POINTS, MAX_PROFILE_TIME, MAX_TEMPERATURE, ValidationError,
    validate_profile,
};

pub type ProfileResult<T> = Result<T, ProfileError>;

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Profile slot {index} out of range (slots={len})")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("Profile slot {index} is empty")]
    EmptySlot { index: usize },

    #[error("Profile slot {index} is locked")]
    Locked { index: usize },

    #[error("Source and destination slot are the same ({index})")]
    SameSlot { index: usize },

    #[error("Unsupported library version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> ProfileResult<SolderProfile> {
    let content = std::fs::read_to_string(path)?;
    let profile: SolderProfile = serde_yaml::from_str(&content)?;
    validate_profile(&profile)?;
    Ok(profile)
}

pub fn save_yaml(path: &std::path::Path, profile: &SolderProfile) -> ProfileResult<()> {
    validate_profile(profile)?;
    let content = serde_yaml::to_string(profile)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a profile, as JSON when the extension says so and YAML otherwise.
pub fn load_profile(path: &std::path::Path) -> ProfileResult<SolderProfile> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_json(path),
        _ => load_yaml(path),
    }
}

pub fn load_json(path: &std::path::Path) -> ProfileResult<SolderProfile> {
    let content = std::fs::read_to_string(path)?;
    let profile: SolderProfile = serde_json::from_str(&content)?;
    validate_profile(&profile)?;
    Ok(profile)
}
