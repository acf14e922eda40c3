use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StepError;

pub const ROW_FILE_NAME: &str = "grade_rows.csv";
const MANIFEST_NAME: &str = "manifest.json";

/// Typed handoff between the extract and load steps: which row file to load
/// and which run produced it. Each run gets its own directory under the work
/// root, so two concurrent calendar runs (e.g. catch-up backfills) never
/// clobber each other's files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub run_id: String,
    pub path: PathBuf,
    pub rows: usize,
    pub produced_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Creates the run directory and returns where the extract step should
    /// write its row file.
    pub fn row_file_path(&self, run_id: &str) -> Result<PathBuf, StepError> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(ROW_FILE_NAME))
    }

    pub fn publish(&self, artifact: &ArtifactRef) -> Result<(), StepError> {
        let json = serde_json::to_string_pretty(artifact)
            .map_err(|err| StepError::Artifact(err.to_string()))?;
        fs::write(self.run_dir(&artifact.run_id).join(MANIFEST_NAME), json)?;
        Ok(())
    }

    /// Returns the artifact for a run, or `None` when the extract step never
    /// published one (empty source) or the row file has since disappeared.
    pub fn retrieve(&self, run_id: &str) -> Result<Option<ArtifactRef>, StepError> {
        let manifest = self.run_dir(run_id).join(MANIFEST_NAME);
        if !manifest.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&manifest)?;
        let artifact: ArtifactRef =
            serde_json::from_str(&json).map_err(|err| StepError::Artifact(err.to_string()))?;

        if !artifact.path.exists() {
            warn!(
                run_id,
                path = %artifact.path.display(),
                "manifest references a missing row file"
            );
            return Ok(None);
        }

        Ok(Some(artifact))
    }
}
