//! Error handling for the generation core
//!
//! This module provides:
//! - `EnhancedError`: the classified upstream failure, one of a closed set of kinds
//! - `GenerationError`: the caller-facing error of a generate-and-validate request
//! - `QualityValidationError`: raised when quality, not transport, blocks a request
//! - The heuristic classifier that maps raw failures onto `ErrorKind`

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quality::{GeneratedContent, QualityValidationResult};

pub mod classifier;

pub use classifier::{classify, ErrorClassifier, HeuristicErrorClassifier};

/// Result type for upstream operations wrapped by the core
pub type Result<T> = std::result::Result<T, EnhancedError>;

/// Shared, cloneable handle on the original cause of a failure
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// The severity level of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational, the request will most likely recover on its own
    Info,
    /// A transient issue that retrying is expected to fix
    Minor,
    /// A significant issue that may exhaust the retry budget
    Major,
    /// A caller or credential problem that retrying cannot fix
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Minor => write!(f, "MINOR"),
            Severity::Major => write!(f, "MAJOR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Closed taxonomy of upstream failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection or transport failure
    Network,
    /// Rejected credentials
    Authentication,
    /// Upstream throttling, optionally with a server-supplied wait
    RateLimit {
        /// How long the upstream asked us to wait before the next call
        retry_after: Option<Duration>,
    },
    /// The call did not complete within its time budget
    Timeout,
    /// Upstream outage, server error, open circuit or anything unrecognised
    ServiceUnavailable,
    /// The request itself was rejected as malformed
    Validation,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Network
            | ErrorKind::RateLimit { .. }
            | ErrorKind::Timeout
            | ErrorKind::ServiceUnavailable => true,
            ErrorKind::Authentication | ErrorKind::Validation => false,
        }
    }

    /// Severity associated with this kind
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::RateLimit { .. } => Severity::Info,
            ErrorKind::Network | ErrorKind::Timeout => Severity::Minor,
            ErrorKind::ServiceUnavailable => Severity::Major,
            ErrorKind::Authentication | ErrorKind::Validation => Severity::Critical,
        }
    }

    /// Stable machine-readable discriminant
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Authentication => "AUTH_ERROR",
            ErrorKind::RateLimit { .. } => "RATE_LIMIT_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::Validation => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "Network error"),
            ErrorKind::Authentication => write!(f, "Authentication error"),
            ErrorKind::RateLimit { .. } => write!(f, "Rate limit exceeded"),
            ErrorKind::Timeout => write!(f, "Timeout error"),
            ErrorKind::ServiceUnavailable => write!(f, "Service unavailable"),
            ErrorKind::Validation => write!(f, "Validation error"),
        }
    }
}

/// A classified upstream failure
///
/// Cloning keeps the original cause, which is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EnhancedError {
    /// The kind of failure
    pub kind: ErrorKind,
    /// Detailed message, usually the upstream's own wording
    pub message: String,
    /// The original error this was classified from
    pub cause: Option<Cause>,
}

impl EnhancedError {
    /// Creates a new error with the specified kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::new(ErrorKind::RateLimit { retry_after }, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Attaches the original cause
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Severity of this error
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Server-supplied wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            ErrorKind::RateLimit { retry_after } => retry_after,
            _ => None,
        }
    }

    /// Message suitable for end users, free of upstream internals
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "We couldn't reach the story service. Please check your connection and try again.".to_string()
            }
            ErrorKind::Authentication => {
                "The story service rejected our credentials. Please contact support.".to_string()
            }
            ErrorKind::RateLimit { retry_after: Some(wait) } => format!(
                "The story service is busy. Please try again in {} seconds.",
                wait.as_secs().max(1)
            ),
            ErrorKind::RateLimit { retry_after: None } => {
                "The story service is busy. Please try again shortly.".to_string()
            }
            ErrorKind::Timeout => "The story took too long to generate. Please try again.".to_string(),
            ErrorKind::ServiceUnavailable => {
                "The story service is temporarily unavailable. Please try again later.".to_string()
            }
            ErrorKind::Validation => {
                "The story request was invalid. Please adjust your input and try again.".to_string()
            }
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(wait) = self.retry_after() {
            write!(f, " (retry after {}ms)", wait.as_millis())?;
        }

        Ok(())
    }
}

impl StdError for EnhancedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl PartialEq for EnhancedError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

/// Raised when generated content keeps failing the quality gate
#[derive(Error, Debug, Clone)]
#[error(
    "content failed quality validation after {} attempt(s) (overall score {:.1})",
    .attempts,
    .result.quality_score.overall
)]
pub struct QualityValidationError {
    /// Validation result of the last scored attempt
    pub result: QualityValidationResult,
    /// The rejected content of the last scored attempt
    pub content: GeneratedContent,
    /// Number of generation attempts made
    pub attempts: u32,
    /// Highest overall score seen across all attempts
    pub best_overall: f64,
    /// Feedback accumulated across attempts, de-duplicated in order of appearance
    pub improvement_recommendations: Vec<String>,
}

/// Caller-facing error of the generation core
#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    /// Transport-level failure after the retry and fallback budgets were spent
    #[error(transparent)]
    Upstream(#[from] EnhancedError),

    /// The content never passed the quality gate
    #[error(transparent)]
    Quality(#[from] Box<QualityValidationError>),

    /// Invalid configuration detected at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request was cancelled before it resolved
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        GenerationError::Configuration(message.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Upstream(err) => err.code(),
            GenerationError::Quality(_) => "QUALITY_VALIDATION_FAILED",
            GenerationError::Configuration(_) => "CONFIGURATION_ERROR",
            GenerationError::Cancelled => "CANCELLED",
        }
    }

    /// Message suitable for end users
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Upstream(err) => err.user_message(),
            GenerationError::Quality(err) => format!(
                "We couldn't produce a story that met our quality standards after {} attempt(s). Please try again or adjust your request.",
                err.attempts
            ),
            GenerationError::Configuration(_) => {
                "The story service is misconfigured. Please contact support.".to_string()
            }
            GenerationError::Cancelled => "The story request was cancelled.".to_string(),
        }
    }
}
