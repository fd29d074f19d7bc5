//! Error taxonomy, classification, and the aggregate failure types.
//!
//! A closed `thiserror` enum plus a `family()` classifier instead of matching
//! on error strings at call sites.

use thiserror::Error;

/// Coarse bucket a `ProviderError` falls into, driving retry/fallback
/// decisions in the execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    RateLimit,
    Retryable,
    Fatal,
    Skip,
    Cancelled,
}

impl ErrorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorFamily::RateLimit => "rate_limit",
            ErrorFamily::Retryable => "retryable",
            ErrorFamily::Fatal => "fatal",
            ErrorFamily::Skip => "skip",
            ErrorFamily::Cancelled => "cancelled",
        }
    }

    /// Same-provider retries are permitted for these families.
    pub fn is_retry_eligible(&self) -> bool {
        matches!(self, ErrorFamily::RateLimit | ErrorFamily::Retryable)
    }
}

/// One call attempt's failure, classified into an `ErrorFamily`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("shadow timed out: {0}")]
    ShadowTimeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("provider skipped: {0}")]
    Skip(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn family(&self) -> ErrorFamily {
        match self {
            ProviderError::RateLimit(_) => ErrorFamily::RateLimit,
            ProviderError::Timeout(_)
            | ProviderError::ShadowTimeout(_)
            | ProviderError::Connection(_)
            | ProviderError::ServerError(_) => ErrorFamily::Retryable,
            ProviderError::Auth(_) | ProviderError::Config(_) | ProviderError::Malformed(_) => {
                ErrorFamily::Fatal
            }
            ProviderError::Skip(_) => ErrorFamily::Skip,
            ProviderError::Cancelled => ErrorFamily::Cancelled,
            ProviderError::Other(_) => ErrorFamily::Fatal,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::RateLimit(_) => "rate_limit",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::ShadowTimeout(_) => "shadow_timeout",
            ProviderError::Connection(_) => "connection",
            ProviderError::ServerError(_) => "server_error",
            ProviderError::Auth(_) => "auth",
            ProviderError::Config(_) => "config",
            ProviderError::Malformed(_) => "malformed_request",
            ProviderError::Skip(_) => "skip",
            ProviderError::Cancelled => "cancelled",
            ProviderError::Other(_) => "other",
        }
    }

    /// Exception-class-style label for the event stream's `shadow_error`
    /// field, matching the naming the shadow metrics consumer expects
    /// (a dedicated `ShadowTimeout` literal for the shadow's own timeout,
    /// distinct from every other failure).
    pub fn exception_name(&self) -> &'static str {
        match self {
            ProviderError::RateLimit(_) => "RateLimitError",
            ProviderError::Timeout(_) => "TimeoutError",
            ProviderError::ShadowTimeout(_) => "ShadowTimeout",
            ProviderError::Connection(_) => "ConnectionError",
            ProviderError::ServerError(_) => "RuntimeError",
            ProviderError::Auth(_) => "AuthenticationError",
            ProviderError::Config(_) => "ConfigError",
            ProviderError::Malformed(_) => "ValueError",
            ProviderError::Skip(_) => "SkipError",
            ProviderError::Cancelled => "CancelledError",
            ProviderError::Other(_) => "RuntimeError",
        }
    }
}

/// Every provider in a sequential chain failed. Carries the full attempt
/// trail so callers can report which provider/attempt combinations ran.
#[derive(Debug, Error)]
#[error("all providers failed after {} attempt(s): {}", .attempts.len(), .last_error)]
pub struct AllFailedError {
    pub attempts: Vec<String>,
    #[source]
    pub last_error: ProviderError,
}

/// One fan-out member's failure, recorded inside a `ParallelExecutionError`.
#[derive(Debug, Clone)]
pub struct FailureSummary {
    pub provider: String,
    pub attempt: u32,
    pub summary: String,
}

/// A fan-out strategy (parallel-any, parallel-all, consensus) could not
/// produce an admissible result.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParallelExecutionError {
    pub message: String,
    pub failures: Vec<FailureSummary>,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    AllFailed(#[from] AllFailedError),

    #[error(transparent)]
    Parallel(#[from] ParallelExecutionError),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_family_is_retry_eligible() {
        assert!(ProviderError::RateLimit("x".into()).family().is_retry_eligible());
    }

    #[test]
    fn auth_is_fatal_and_not_retry_eligible() {
        let family = ProviderError::Auth("bad key".into()).family();
        assert_eq!(family, ErrorFamily::Fatal);
        assert!(!family.is_retry_eligible());
    }

    #[test]
    fn skip_is_its_own_family() {
        assert_eq!(ProviderError::Skip("no capability".into()).family(), ErrorFamily::Skip);
    }

    #[test]
    fn error_type_names_are_stable() {
        assert_eq!(ProviderError::Timeout("t".into()).error_type(), "timeout");
        assert_eq!(ProviderError::ServerError("s".into()).error_type(), "server_error");
    }

    #[test]
    fn shadow_timeout_is_retryable_but_distinct_from_a_primary_timeout() {
        let shadow_timeout = ProviderError::ShadowTimeout("t".into());
        assert_eq!(shadow_timeout.error_type(), "shadow_timeout");
        assert!(shadow_timeout.family().is_retry_eligible());
        assert_eq!(shadow_timeout.exception_name(), "ShadowTimeout");
        assert_ne!(shadow_timeout.exception_name(), ProviderError::Timeout("t".into()).exception_name());
    }

    #[test]
    fn exception_name_maps_server_error_to_runtime_error() {
        assert_eq!(ProviderError::ServerError("boom".into()).exception_name(), "RuntimeError");
    }
}
