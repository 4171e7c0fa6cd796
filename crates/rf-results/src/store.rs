//! Run storage API.

use std::fs;
use std::path::{Path, PathBuf};

use rf_runner::DataPoint;
use tracing::{debug, warn};

use crate::types::RunManifest;
use crate::{ResultsError, ResultsResult};

const MANIFEST: &str = "manifest.json";
const POINTS: &str = "points.jsonl";

#[derive(Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST).exists()
    }

    pub fn save_run(&self, manifest: &RunManifest, points: &[DataPoint]) -> ResultsResult<()> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;

        let mut lines = String::new();
        for point in points {
            lines.push_str(&serde_json::to_string(point)?);
            lines.push('\n');
        }
        fs::write(run_dir.join(POINTS), lines)?;

        // Manifest last: its presence marks a complete run.
        fs::write(run_dir.join(MANIFEST), serde_json::to_string_pretty(manifest)?)?;
        debug!(run_id = %manifest.run_id, points = points.len(), "run saved");
        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let path = self.run_dir(run_id).join(MANIFEST);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_points(&self, run_id: &str) -> ResultsResult<Vec<DataPoint>> {
        let path = self.run_dir(run_id).join(POINTS);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        let mut points = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            points.push(serde_json::from_str(line)?);
        }
        Ok(points)
    }

    /// Saved runs, newest first. Unreadable entries are skipped.
    pub fn list_runs(&self) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        if !self.root_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().to_string();
            match self.load_manifest(&run_id) {
                Ok(manifest) => runs.push(manifest),
                Err(e) => warn!(%run_id, error = %e, "skipping unreadable run"),
            }
        }
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}
