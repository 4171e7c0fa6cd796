//! Fixed-slot profile storage.
//!
//! Mirrors the controller's non-volatile layout: a small number of slots, each
//! either empty or holding one profile. Every write is followed by a commit
//! delay standing in for the flash settle time.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::SolderProfile;
use crate::validate::validate_profile;
use crate::{ProfileError, ProfileResult, builtin};

pub const MAX_PROFILES: usize = 10;
pub const LIBRARY_VERSION: u32 = 1;

/// On-disk form of a [`ProfileStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLibrary {
    pub version: u32,
    #[serde(default)]
    pub slots: Vec<Option<SolderProfile>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStore {
    slots: Vec<Option<SolderProfile>>,
    commit_latency: Duration,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_PROFILES],
            commit_latency: Duration::ZERO,
        }
    }

    /// Store seeded with the factory profiles in the first slots.
    pub fn with_builtins() -> Self {
        let mut store = Self::new();
        for (slot, profile) in store.slots.iter_mut().zip(builtin::all()) {
            *slot = Some(profile);
        }
        store
    }

    pub fn with_commit_latency(mut self, latency: Duration) -> Self {
        self.commit_latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn check_index(&self, index: usize) -> ProfileResult<()> {
        if index >= self.slots.len() {
            return Err(ProfileError::SlotOutOfRange {
                index,
                len: self.slots.len(),
            });
        }
        Ok(())
    }

    fn slot(&self, index: usize) -> ProfileResult<&SolderProfile> {
        self.check_index(index)?;
        self.slots[index]
            .as_ref()
            .ok_or(ProfileError::EmptySlot { index })
    }

    /// Copy of the profile in `index`.
    pub fn get(&self, index: usize) -> ProfileResult<SolderProfile> {
        self.slot(index).cloned()
    }

    /// Validate and write `profile` into `index`.
    ///
    /// Locked slots cannot be overwritten.
    pub fn set(&mut self, index: usize, profile: SolderProfile) -> ProfileResult<()> {
        self.check_index(index)?;
        if self.slots[index].as_ref().is_some_and(|p| !p.editable) {
            return Err(ProfileError::Locked { index });
        }
        validate_profile(&profile)?;
        self.commit(index, profile);
        Ok(())
    }

    /// Duplicate `src` into `dst`. The copy is always editable.
    pub fn copy(&mut self, src: usize, dst: usize) -> ProfileResult<()> {
        self.check_index(dst)?;
        if src == dst {
            return Err(ProfileError::SameSlot { index: src });
        }
        let mut profile = self.get(src)?;
        profile.editable = true;
        self.set(dst, profile)?;
        debug!(src, dst, "profile copied");
        Ok(())
    }

    /// Empty an unlocked slot.
    pub fn clear(&mut self, index: usize) -> ProfileResult<()> {
        if !self.slot(index)?.editable {
            return Err(ProfileError::Locked { index });
        }
        self.slots[index] = None;
        Ok(())
    }

    fn commit(&mut self, index: usize, profile: SolderProfile) {
        if !self.commit_latency.is_zero() {
            std::thread::sleep(self.commit_latency);
        }
        debug!(slot = index, description = %profile.description, "profile committed");
        self.slots[index] = Some(profile);
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SolderProfile)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (i, p)))
    }

    /// First slot whose description matches, ignoring case.
    pub fn find(&self, description: &str) -> Option<usize> {
        self.iter()
            .find(|(_, p)| p.description.eq_ignore_ascii_case(description))
            .map(|(i, _)| i)
    }

    pub fn to_library(&self) -> ProfileLibrary {
        ProfileLibrary {
            version: LIBRARY_VERSION,
            slots: self.slots.clone(),
        }
    }

    pub fn from_library(library: ProfileLibrary) -> ProfileResult<Self> {
        if library.version != LIBRARY_VERSION {
            return Err(ProfileError::UnsupportedVersion {
                version: library.version,
            });
        }
        if library.slots.len() > MAX_PROFILES {
            return Err(ProfileError::SlotOutOfRange {
                index: library.slots.len() - 1,
                len: MAX_PROFILES,
            });
        }
        for profile in library.slots.iter().flatten() {
            validate_profile(profile)?;
        }
        let mut slots = library.slots;
        slots.resize(MAX_PROFILES, None);
        Ok(Self {
            slots,
            commit_latency: Duration::ZERO,
        })
    }

    pub fn load_yaml(path: &Path) -> ProfileResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let library: ProfileLibrary = serde_yaml::from_str(&content)?;
        Self::from_library(library)
    }

    pub fn save_yaml(&self, path: &Path) -> ProfileResult<()> {
        for profile in self.slots.iter().flatten() {
            validate_profile(profile)?;
        }
        let content = serde_yaml::to_string(&self.to_library())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
