use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{CallOutcome, OracleError};
use crate::extraction::{prompts, StructuredRecord};
use crate::oracle::{call_with_retry, OracleClient};

/// Judge output for one (job, candidate) pair. The score is on the fixed,
/// documented 0..10 scale; everything else is carried through for human
/// inspection only and never feeds back into scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeVerdict {
    pub final_score: f64,
    #[serde(default)]
    pub detailed_analysis: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

/// LLM-as-judge stage. Transient oracle errors retry (bounded); persistent
/// failure yields an unscored sentinel upstream, never a crash.
#[derive(Clone)]
pub struct JudgeScorer {
    oracle: Arc<dyn OracleClient>,
    retry: RetryPolicy,
}

impl JudgeScorer {
    pub fn new(oracle: Arc<dyn OracleClient>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    pub async fn judge(
        &self,
        job: &StructuredRecord,
        candidate: &StructuredRecord,
    ) -> Result<JudgeVerdict, OracleError> {
        let job_json = serde_json::to_string_pretty(job)
            .map_err(|err| OracleError::MalformedResponse(err.to_string()))?;
        let candidate_json = serde_json::to_string_pretty(candidate)
            .map_err(|err| OracleError::MalformedResponse(err.to_string()))?;
        let prompt = prompts::judge_prompt(&job_json, &candidate_json);

        let outcome = call_with_retry("llm judge", self.retry, || {
            self.oracle.complete(prompts::JUDGE_SYSTEM, &prompt)
        })
        .await;

        let response = match outcome {
            CallOutcome::Ok(response) => response,
            CallOutcome::Transient(err) | CallOutcome::Permanent(err) => return Err(err),
        };

        parse_verdict(&response)
    }
}

pub fn parse_verdict(response: &str) -> Result<JudgeVerdict, OracleError> {
    let cleaned = strip_fences(response);
    let mut verdict: JudgeVerdict = serde_json::from_str(cleaned)
        .map_err(|err| OracleError::MalformedResponse(err.to_string()))?;

    if !verdict.final_score.is_finite() {
        return Err(OracleError::MalformedResponse(format!(
            "non-finite judge score {}",
            verdict.final_score
        )));
    }
    if verdict.final_score < 0.0 || verdict.final_score > 10.0 {
        warn!(score = verdict.final_score, "judge score out of range; clamping");
        verdict.final_score = verdict.final_score.clamp(0.0, 10.0);
    }
    Ok(verdict)
}

fn strip_fences(text: &str) -> &str {
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedOracle(String);

    #[async_trait]
    impl OracleClient for CannedOracle {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
            Ok(self.0.clone())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            backoff: std::time::Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn verdict_parses_from_fenced_json() {
        let oracle = Arc::new(CannedOracle(
            "```json\n{\"final_score\": 8.5, \"detailed_analysis\": \"solid\", \
             \"pros\": [\"Python\"], \"cons\": []}\n```"
                .into(),
        ));
        let scorer = JudgeScorer::new(oracle, fast_retry());

        let verdict = scorer
            .judge(&StructuredRecord::default(), &StructuredRecord::default())
            .await
            .unwrap();

        assert_eq!(verdict.final_score, 8.5);
        assert_eq!(verdict.pros, vec!["Python".to_string()]);
    }

    #[tokio::test]
    async fn garbage_response_is_a_malformed_error() {
        let oracle = Arc::new(CannedOracle("I would rate this resume quite highly".into()));
        let scorer = JudgeScorer::new(oracle, fast_retry());

        let result = scorer
            .judge(&StructuredRecord::default(), &StructuredRecord::default())
            .await;

        assert!(matches!(result, Err(OracleError::MalformedResponse(_))));
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let verdict = parse_verdict("{\"final_score\": 95}").unwrap();
        assert_eq!(verdict.final_score, 10.0);

        let verdict = parse_verdict("{\"final_score\": -3}").unwrap();
        assert_eq!(verdict.final_score, 0.0);
    }

    #[test]
    fn missing_optional_fields_default() {
        let verdict = parse_verdict("{\"final_score\": 7}").unwrap();
        assert_eq!(verdict.final_score, 7.0);
        assert!(verdict.pros.is_empty());
        assert!(verdict.detailed_analysis.is_empty());
    }
}
