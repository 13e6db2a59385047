//! Heuristic classification of raw upstream failures
//!
//! Model providers surface failures as loosely worded messages. The classifier
//! maps them onto the closed `ErrorKind` taxonomy by inspecting the lower-cased
//! message for known markers. A failure that is already an `EnhancedError` is
//! passed through untouched, so providers with structured error codes can map
//! them precisely and bypass the heuristic.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{EnhancedError, ErrorKind};

static RETRY_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"retry[\s_-]*after\D{0,8}(\d+)").expect("retry-after pattern is valid")
});

/// Strategy interface for mapping raw failures to `EnhancedError`
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: anyhow::Error) -> EnhancedError;
}

/// Marker-based classifier over the lower-cased error message
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicErrorClassifier;

impl ErrorClassifier for HeuristicErrorClassifier {
    fn classify(&self, error: anyhow::Error) -> EnhancedError {
        let error = match error.downcast::<EnhancedError>() {
            Ok(typed) => return typed,
            Err(error) => error,
        };

        // Alternate formatting renders the whole context chain, so markers
        // under a `.context(..)` wrapper are still seen
        let message = format!("{:#}", error);
        let kind = classify_message(&message);
        let cause: Box<dyn std::error::Error + Send + Sync> = error.into();

        EnhancedError::new(kind, message).with_cause(Arc::from(cause))
    }
}

/// Classify a raw failure with the default heuristic
pub fn classify(error: anyhow::Error) -> EnhancedError {
    HeuristicErrorClassifier.classify(error)
}

/// Map an error message to its kind. Markers are checked in priority order.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if contains_any(&lower, &["unauthorized", "invalid api key"]) {
        ErrorKind::Authentication
    } else if contains_any(&lower, &["rate limit", "too many requests"]) {
        ErrorKind::RateLimit {
            retry_after: parse_retry_after(&lower),
        }
    } else if contains_any(&lower, &["timeout", "timed out"]) {
        ErrorKind::Timeout
    } else if contains_any(&lower, &["network", "connection"]) {
        ErrorKind::Network
    } else if contains_any(&lower, &["validation", "invalid input"]) {
        ErrorKind::Validation
    } else {
        // "service unavailable", "server error" and anything unrecognised
        ErrorKind::ServiceUnavailable
    }
}

/// Extract "retry after N" (seconds) from a lower-cased message
fn parse_retry_after(lower: &str) -> Option<Duration> {
    RETRY_AFTER
        .captures(lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|secs| Duration::from_millis(secs.saturating_mul(1000)))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
