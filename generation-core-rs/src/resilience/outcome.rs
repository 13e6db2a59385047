//! Outcome envelope of a resilient call

use std::time::Duration;

use crate::error::{EnhancedError, ErrorKind};

use super::CircuitState;

/// Resilience metadata attached to every `OperationResult`
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMetadata {
    /// Number of times an operation was actually invoked, primary and fallback combined
    pub attempt_count: u32,
    /// Circuit state of the last operation key consulted
    pub circuit_breaker_state: CircuitState,
    /// Opaque id shared by every event of this invocation
    pub correlation_id: String,
    /// Whether the fallback operation was invoked
    pub fallback_used: bool,
    /// Whether the invocation was cut short by cancellation
    pub cancelled: bool,
    /// Wall time spent, including backoff delays
    pub total_duration: Duration,
    /// Every invocation in order, primary first
    pub attempts: Vec<RetryAttemptRecord>,
}

impl OperationMetadata {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            attempt_count: 0,
            circuit_breaker_state: CircuitState::Closed,
            correlation_id: correlation_id.into(),
            fallback_used: false,
            cancelled: false,
            total_duration: Duration::ZERO,
            attempts: Vec::new(),
        }
    }
}

/// Outcome of one resilient invocation; immutable once built
#[derive(Debug, Clone)]
pub struct OperationResult<T> {
    data: Option<T>,
    error: Option<EnhancedError>,
    metadata: OperationMetadata,
}

impl<T> OperationResult<T> {
    /// A successful outcome
    pub fn success(data: T, metadata: OperationMetadata) -> Self {
        Self {
            data: Some(data),
            error: None,
            metadata,
        }
    }

    /// A failed outcome with its terminal error
    pub fn failure(error: EnhancedError, metadata: OperationMetadata) -> Self {
        Self {
            data: None,
            error: Some(error),
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&EnhancedError> {
        self.error.as_ref()
    }

    pub fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    /// Split into the payload/error and the metadata
    pub fn into_parts(self) -> (Result<T, EnhancedError>, OperationMetadata) {
        let result = match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(EnhancedError::service_unavailable(
                "operation produced neither a result nor an error",
            )),
        };
        (result, self.metadata)
    }

    /// Converts to a standard Result, dropping the metadata
    pub fn into_result(self) -> Result<T, EnhancedError> {
        self.into_parts().0
    }
}

/// One attempt of one invocation. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttemptRecord {
    /// Circuit key the attempt ran under
    pub operation: String,
    /// 1-based attempt index within that key
    pub attempt: u32,
    /// Time spent in this attempt
    pub elapsed: Duration,
    /// Classified failure kind, if the attempt failed
    pub error: Option<ErrorKind>,
}

impl RetryAttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
