use std::path::PathBuf;

use thiserror::Error;

/// Fatal pre-run problems. Raised before any stage executes; never during a
/// run.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("top-resumes must be >= 1, got {0}")]
    InvalidTopN(usize),
    #[error("{which} weight must be non-negative, got {value}")]
    NegativeWeight { which: &'static str, value: f64 },
    #[error("at least one ensemble weight must be positive")]
    ZeroWeightSum,
    #[error("concurrency must be >= 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("embedding dimension must be >= 1, got {0}")]
    InvalidDimension(usize),
    #[error("job description not found at {}", .0.display())]
    MissingJobDescription(PathBuf),
    #[error("resumes directory not found at {}", .0.display())]
    MissingResumesDir(PathBuf),
    #[error("oracle endpoint is not configured (set RR_ORACLE_ENDPOINT or RR_ORACLE_PROVIDER)")]
    MissingOracleEndpoint,
}

/// Per-file problems while loading resumes. Skip-and-warn, never fatal to the
/// batch.
#[derive(Debug, Error)]
pub enum TextExtractError {
    #[error("unsupported format {extension:?} for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("corrupt or unreadable file {}: {reason}", .path.display())]
    CorruptFile { path: PathBuf, reason: String },
}

/// Failures talking to an external oracle (structured extraction, judging,
/// cross-encoder sidecar).
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle call timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("oracle rate limit hit: {message}")]
    RateLimit { message: String },
    #[error("oracle returned http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle response could not be parsed: {0}")]
    MalformedResponse(String),
}

impl OracleError {
    /// Transient failures are retried with backoff; permanent ones go
    /// straight to a sentinel. Malformed output is permanent: re-asking the
    /// same prompt tends to reproduce it.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Timeout { .. } | OracleError::RateLimit { .. } => true,
            OracleError::Http { status, .. } => *status >= 500,
            OracleError::Transport(_) => true,
            OracleError::MalformedResponse(_) => false,
        }
    }
}

/// Tagged result of a retried oracle call. Raw errors never cross a stage
/// boundary; stages match on this and degrade per policy.
#[derive(Debug)]
pub enum CallOutcome<T> {
    Ok(T),
    /// Retries exhausted on a transient failure (last error attached).
    Transient(OracleError),
    /// Not worth retrying.
    Permanent(OracleError),
}

impl<T> CallOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            CallOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn err(&self) -> Option<&OracleError> {
        match self {
            CallOutcome::Ok(_) => None,
            CallOutcome::Transient(err) | CallOutcome::Permanent(err) => Some(err),
        }
    }
}

/// Whole-run failures. Everything per-candidate is isolated; only these abort.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("run cancelled after stage {state}")]
    Cancelled { state: &'static str },
    #[error("no candidates survived to stage {state}")]
    NoSurvivors { state: &'static str },
    #[error("failed to write artifact {}: {reason}", .path.display())]
    Persist { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_timeout_are_transient() {
        assert!(OracleError::Timeout { seconds: 30 }.is_transient());
        assert!(OracleError::RateLimit {
            message: "429".into()
        }
        .is_transient());
    }

    #[test]
    fn malformed_response_is_permanent() {
        assert!(!OracleError::MalformedResponse("bad json".into()).is_transient());
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        assert!(OracleError::Http {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!OracleError::Http {
            status: 401,
            message: "bad key".into()
        }
        .is_transient());
    }
}
