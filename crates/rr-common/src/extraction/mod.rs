pub mod prompts;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::CallOutcome;
use crate::oracle::{call_with_retry, OracleClient};

/// Normalized view of a document. Produced once, never mutated. Missing or
/// unparseable fields default to empty/zero so downstream arithmetic never
/// sees a null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredRecord {
    pub skills: Vec<String>,
    pub years_experience: f64,
    pub qualifications: Vec<String>,
    pub summary: String,
}

impl StructuredRecord {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.qualifications.is_empty()
            && self.summary.is_empty()
            && self.years_experience == 0.0
    }
}

/// Which extraction prompt to use for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    JobDescription,
    Resume,
}

/// Extraction result for one document. A failed extraction degrades to an
/// empty record plus a warning; it never aborts the batch.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub record: StructuredRecord,
    pub warning: Option<String>,
}

/// Oracle responses sometimes arrive wrapped in a markdown code fence.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Intermediate shape tolerating nulls and absent fields before normalizing
/// into a `StructuredRecord`.
#[derive(Debug, Default, Deserialize)]
struct RawRecord {
    #[serde(default)]
    skills: Option<Vec<String>>,
    #[serde(default)]
    years_experience: Option<f64>,
    #[serde(default)]
    qualifications: Option<Vec<String>>,
    #[serde(default)]
    summary: Option<String>,
}

impl From<RawRecord> for StructuredRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            skills: raw.skills.unwrap_or_default(),
            years_experience: raw.years_experience.unwrap_or_default().max(0.0),
            qualifications: raw.qualifications.unwrap_or_default(),
            summary: raw.summary.unwrap_or_default(),
        }
    }
}

pub fn parse_record(response: &str) -> Result<StructuredRecord, serde_json::Error> {
    let raw: RawRecord = serde_json::from_str(strip_code_fences(response))?;
    Ok(raw.into())
}

/// Turns raw text into a `StructuredRecord` through the oracle. Transient
/// oracle failures are retried (bounded); permanent parse failures are not.
#[derive(Clone)]
pub struct StructuredExtractor {
    oracle: Arc<dyn OracleClient>,
    retry: RetryPolicy,
}

impl StructuredExtractor {
    pub fn new(oracle: Arc<dyn OracleClient>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    pub async fn extract(&self, doc_id: &str, raw_text: &str, kind: SchemaKind) -> Extracted {
        let system = match kind {
            SchemaKind::JobDescription => prompts::job_extraction_system(),
            SchemaKind::Resume => prompts::resume_extraction_system(),
        };

        let outcome =
            call_with_retry("structured extraction", self.retry, || {
                self.oracle.complete(&system, raw_text)
            })
            .await;

        let response = match outcome {
            CallOutcome::Ok(response) => response,
            CallOutcome::Transient(err) | CallOutcome::Permanent(err) => {
                warn!(doc_id, error = %err, "extraction oracle failed; using empty record");
                return Extracted {
                    record: StructuredRecord::default(),
                    warning: Some(format!("extraction failed for {doc_id}: {err}")),
                };
            }
        };

        match parse_record(&response) {
            Ok(record) => Extracted {
                record,
                warning: None,
            },
            Err(err) => {
                warn!(doc_id, error = %err, "extraction response unparseable; using empty record");
                Extracted {
                    record: StructuredRecord::default(),
                    warning: Some(format!("extraction output unparseable for {doc_id}: {err}")),
                }
            }
        }
    }
}
