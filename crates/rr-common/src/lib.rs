pub mod config;
pub mod error;
pub mod extraction;
pub mod logging;
pub mod oracle;
pub mod persist;
pub mod ranking;
pub mod textract;

use serde::{Deserialize, Serialize};

/// A raw input document: the single job description or one candidate resume.
/// Immutable once loaded; every stage reads it, none mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier. For resumes this is the file stem; the job
    /// description uses `"job_description"`.
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}
