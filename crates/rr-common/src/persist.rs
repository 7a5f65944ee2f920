use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::RunError;

/// Artifact locations under the data directory. One file per pipeline
/// product; re-running a batch overwrites them in place.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub structured_job_description: PathBuf,
    pub structured_resumes: PathBuf,
    pub bi_encoder_ranking: PathBuf,
    pub final_ranking: PathBuf,
}

impl ArtifactPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            structured_job_description: data_dir.join("structured_job_description.json"),
            structured_resumes: data_dir.join("structured_resumes.json"),
            bi_encoder_ranking: data_dir.join("bi_encoder_ranking.json"),
            final_ranking: data_dir.join("final_resume_ranking.json"),
        }
    }
}

/// Serialize `value` as pretty JSON at `path`, creating parent directories as
/// needed. Overwrites whole files; never appends.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RunError> {
    let persist_err = |reason: String| RunError::Persist {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| persist_err(err.to_string()))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|err| persist_err(err.to_string()))?;
    std::fs::write(path, json).map_err(|err| persist_err(err.to_string()))?;
    info!(path = %path.display(), "wrote artifact");
    Ok(())
}
