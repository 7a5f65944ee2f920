use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigurationError;

/// Immutable run configuration. Built once from CLI arguments, validated
/// before any stage runs, then handed into pipeline construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Shortlist size: how many candidates survive the bi-encoder gate and
    /// get the expensive rescoring.
    pub top_n: usize,
    /// Ensemble weight on the judge score.
    pub judge_weight: f64,
    /// Ensemble weight on the cross-encoder score.
    pub cross_weight: f64,
    pub job_description_path: PathBuf,
    pub resumes_dir: PathBuf,
    /// Intermediate and final JSON artifacts land here.
    pub data_dir: PathBuf,
    /// Bound on in-flight per-candidate oracle calls within one stage.
    pub concurrency: usize,
    /// Embedder implementation name ("hash" unless configured otherwise).
    pub embedder: String,
    pub embedding_dimension: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            judge_weight: 0.7,
            cross_weight: 0.3,
            job_description_path: PathBuf::from("job_description.txt"),
            resumes_dir: PathBuf::from("resumes"),
            data_dir: PathBuf::from("data"),
            concurrency: 4,
            embedder: "hash".into(),
            embedding_dimension: 256,
        }
    }
}

impl PipelineConfig {
    /// Fail fast on anything that would otherwise surface mid-run. Negative
    /// weights are rejected here, at construction, not at combine time.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.top_n == 0 {
            return Err(ConfigurationError::InvalidTopN(self.top_n));
        }
        if self.judge_weight < 0.0 {
            return Err(ConfigurationError::NegativeWeight {
                which: "judge",
                value: self.judge_weight,
            });
        }
        if self.cross_weight < 0.0 {
            return Err(ConfigurationError::NegativeWeight {
                which: "cross-encoder",
                value: self.cross_weight,
            });
        }
        if self.judge_weight + self.cross_weight == 0.0 {
            return Err(ConfigurationError::ZeroWeightSum);
        }
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(self.concurrency));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigurationError::InvalidDimension(self.embedding_dimension));
        }
        if !self.job_description_path.is_file() {
            return Err(ConfigurationError::MissingJobDescription(
                self.job_description_path.clone(),
            ));
        }
        if !self.resumes_dir.is_dir() {
            return Err(ConfigurationError::MissingResumesDir(
                self.resumes_dir.clone(),
            ));
        }
        Ok(())
    }
}

/// Bounded-retry policy for external oracle calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Connection settings for the text-completion oracle (structured extraction
/// and judging).
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

fn provider_defaults(provider: &str) -> (String, String) {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => (
            "gpt-4.1-nano".into(),
            "https://api.openai.com/v1/chat/completions".into(),
        ),
        "mistral" => (
            "mistral-large-latest".into(),
            "https://api.mistral.ai/v1/chat/completions".into(),
        ),
        "deepseek" => (
            "deepseek-chat".into(),
            "https://api.deepseek.com/v1/chat/completions".into(),
        ),
        _ => ("gpt-4.1-nano".into(), String::new()),
    }
}

fn provider_api_key(provider: &str) -> Option<String> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => std::env::var("OPENAI_API_KEY").ok(),
        "mistral" => std::env::var("MISTRAL_API_KEY").ok(),
        "deepseek" => std::env::var("DEEPSEEK_API_KEY").ok(),
        _ => None,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

impl OracleConfig {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let provider = std::env::var("RR_ORACLE_PROVIDER").unwrap_or_else(|_| "openai".into());
        let (default_model, default_endpoint) = provider_defaults(&provider);

        let endpoint = std::env::var("RR_ORACLE_ENDPOINT").unwrap_or(default_endpoint);
        if endpoint.is_empty() {
            return Err(ConfigurationError::MissingOracleEndpoint);
        }

        Ok(Self {
            provider: provider.clone(),
            model: std::env::var("RR_ORACLE_MODEL").unwrap_or(default_model),
            endpoint,
            api_key: std::env::var("RR_ORACLE_API_KEY")
                .ok()
                .or_else(|| provider_api_key(&provider))
                .unwrap_or_default(),
            timeout_secs: parse_env("RR_ORACLE_TIMEOUT_SECONDS", 30),
            retry: RetryPolicy {
                max_retries: parse_env("RR_ORACLE_MAX_RETRIES", 2),
                backoff: Duration::from_secs(parse_env("RR_ORACLE_RETRY_BACKOFF_SECONDS", 2)),
            },
        })
    }
}

/// Connection settings for the cross-encoder rerank sidecar.
#[derive(Debug, Clone)]
pub struct CrossEncoderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl CrossEncoderConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("RR_RERANK_URL")
                .unwrap_or_else(|_| "http://localhost:8421".into()),
            timeout_secs: parse_env("RR_RERANK_TIMEOUT_SECONDS", 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &std::path::Path) -> PipelineConfig {
        let job_path = dir.join("job_description.txt");
        let resumes = dir.join("resumes");
        std::fs::write(&job_path, "Python engineer").unwrap();
        std::fs::create_dir_all(&resumes).unwrap();
        PipelineConfig {
            job_description_path: job_path,
            resumes_dir: resumes,
            data_dir: dir.join("data"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn default_weights_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config = valid_config(dir.path());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            judge_weight: -0.1,
            ..valid_config(dir.path())
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::NegativeWeight { which: "judge", .. })
        ));
    }

    #[test]
    fn zero_weight_sum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            judge_weight: 0.0,
            cross_weight: 0.0,
            ..valid_config(dir.path())
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ZeroWeightSum)
        ));
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            top_n: 0,
            ..valid_config(dir.path())
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidTopN(0))
        ));
    }

    #[test]
    fn missing_paths_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.resumes_dir = dir.path().join("nope");
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingResumesDir(_))
        ));
    }
}
