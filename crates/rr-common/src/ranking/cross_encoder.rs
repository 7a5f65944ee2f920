use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::CrossEncoderConfig;
use crate::error::OracleError;

/// Cross-encoder seam: scores one (job, candidate) pair jointly. Called only
/// for shortlisted candidates. Scores are on the documented 0..10 scale
/// (raw model logit through a sigmoid, times 10).
#[async_trait]
pub trait PairwiseScorer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn score(&self, job_text: &str, candidate_text: &str) -> Result<f64, OracleError>;
}

/// Map a raw cross-encoder logit onto 0..10.
pub fn scaled_sigmoid(raw: f64) -> f64 {
    (1.0 / (1.0 + (-raw).exp())) * 10.0
}

/// Cross-encoder backed by a rerank sidecar: POST `{query, documents}` to
/// `<base>/rerank`, get `{scores}` back.
pub struct SidecarCrossEncoder {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    scores: Vec<f64>,
}

impl SidecarCrossEncoder {
    pub fn new(config: &CrossEncoderConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| OracleError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl PairwiseScorer for SidecarCrossEncoder {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    async fn score(&self, job_text: &str, candidate_text: &str) -> Result<f64, OracleError> {
        let url = format!("{}/rerank", self.base_url);
        let body = json!({
            "query": job_text,
            "documents": [candidate_text],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    OracleError::Timeout {
                        seconds: self.timeout_secs,
                    }
                } else {
                    OracleError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::RateLimit { message });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|err| OracleError::MalformedResponse(err.to_string()))?;

        let raw = parsed.scores.first().copied().ok_or_else(|| {
            OracleError::MalformedResponse("rerank response had no scores".into())
        })?;

        Ok(scaled_sigmoid(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_sigmoid_stays_in_range() {
        assert!(scaled_sigmoid(-100.0) >= 0.0);
        assert!(scaled_sigmoid(100.0) <= 10.0);
        assert!((scaled_sigmoid(0.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn scaled_sigmoid_is_monotonic() {
        assert!(scaled_sigmoid(1.0) > scaled_sigmoid(0.0));
        assert!(scaled_sigmoid(0.0) > scaled_sigmoid(-1.0));
    }

    #[test]
    fn sidecar_url_is_normalized() {
        let encoder = SidecarCrossEncoder::new(&CrossEncoderConfig {
            base_url: "http://localhost:8421/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(encoder.base_url, "http://localhost:8421");
    }
}
