//! Resilience patterns for upstream generation calls
//!
//! This module provides:
//! - Retry with exponential backoff and jitter
//! - A circuit breaker keyed by operation name
//! - The `Resilience` facade composing both with an optional fallback operation

mod circuit_breaker;
mod outcome;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState, Clock, ManualClock,
    SystemClock,
};
pub use outcome::{OperationMetadata, OperationResult, RetryAttemptRecord};
pub use retry::{RetryConfig, RetryExecutor};

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde_json::json;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::GenerationError;
use crate::events::{EventName, EventSink, GenerationEvent};
use crate::util::{generate_correlation_id, sanitize_for_logging};

/// Suffix of the circuit key used for an operation's fallback
pub const FALLBACK_SUFFIX: &str = ":fallback";

/// Circuit key of the fallback for `operation_name`
pub fn fallback_key(operation_name: &str) -> String {
    format!("{}{}", operation_name, FALLBACK_SUFFIX)
}

/// A unified resilience facade composing retry, circuit breaking and fallback
#[derive(Debug, Clone)]
pub struct Resilience {
    retry: RetryExecutor,
}

impl Resilience {
    /// Create a facade with its own circuit breaker
    pub fn new(
        retry_config: RetryConfig,
        circuit_breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, GenerationError> {
        let circuit_breaker = Arc::new(CircuitBreaker::new(circuit_breaker_config)?);
        Ok(Self::from_executor(RetryExecutor::new(retry_config, circuit_breaker)?))
    }

    /// Wrap an already assembled retry executor and its breaker
    pub fn from_executor(retry: RetryExecutor) -> Self {
        Self { retry }
    }

    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        self.retry.circuit_breaker()
    }

    /// Current circuit state of an operation
    pub fn circuit_state(&self, operation_name: &str) -> CircuitState {
        self.circuit_breaker().state(operation_name)
    }

    /// Reset one operation's circuit, including its fallback circuit
    pub fn reset_circuit(&self, operation_name: &str) {
        self.circuit_breaker().reset(operation_name);
        self.circuit_breaker().reset(&fallback_key(operation_name));
    }

    /// Execute `operation` with retry and circuit breaking, no fallback
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> OperationResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.execute_with_retry_and_circuit_breaker(operation_name, operation, None::<&F>)
            .await
    }

    /// Execute `operation` with full resilience.
    ///
    /// When the primary's retry budget is spent without success and a
    /// `fallback` is supplied, the fallback runs under the same retry policy
    /// but its own circuit key (`<operation_name>:fallback`). Expected upstream
    /// failures are always returned inside the `OperationResult`.
    pub async fn execute_with_retry_and_circuit_breaker<F, Fut, G, GFut, T>(
        &self,
        operation_name: &str,
        operation: F,
        fallback: Option<G>,
    ) -> OperationResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        G: Fn() -> GFut,
        GFut: Future<Output = anyhow::Result<T>>,
    {
        let correlation_id = generate_correlation_id();
        let started = Instant::now();
        let events = self.retry.events();

        let primary = self.retry.run(operation_name, &correlation_id, operation).await;
        let mut attempts = primary.attempts;
        let mut attempt_count = attempts.len() as u32;
        let mut cancelled = primary.cancelled;
        let mut circuit_key = operation_name.to_string();
        let mut fallback_used = false;

        let result = match (primary.result, fallback) {
            (Ok(value), _) => Ok(value),
            (Err(error), Some(fallback)) if !primary.cancelled => {
                let fallback_name = fallback_key(operation_name);
                warn!(
                    operation = %operation_name,
                    correlation_id = %correlation_id,
                    attempts = %attempt_count,
                    error = %error,
                    "Primary operation exhausted, invoking fallback"
                );
                counter!("generation.fallback.triggered", 1, "operation" => operation_name.to_string());
                events.emit(&GenerationEvent::new(
                    EventName::FallbackTriggered,
                    Some(&correlation_id),
                    json!({
                        "operation": operation_name,
                        "fallback": fallback_name,
                        "primary_attempts": attempt_count,
                        "primary_error_code": error.code(),
                        "primary_error": sanitize_for_logging(&error.message),
                    }),
                ));

                let mut secondary = self.retry.run(&fallback_name, &correlation_id, fallback).await;
                attempt_count += secondary.attempts.len() as u32;
                attempts.append(&mut secondary.attempts);
                cancelled = secondary.cancelled;
                circuit_key = fallback_name;
                fallback_used = true;
                secondary.result
            }
            (Err(error), _) => Err(error),
        };

        let metadata = OperationMetadata {
            attempt_count,
            circuit_breaker_state: self.circuit_breaker().state(&circuit_key),
            correlation_id,
            fallback_used,
            cancelled,
            total_duration: started.elapsed(),
            attempts,
        };

        match result {
            Ok(value) => {
                info!(
                    operation = %operation_name,
                    correlation_id = %metadata.correlation_id,
                    attempts = %metadata.attempt_count,
                    fallback_used = %metadata.fallback_used,
                    duration_ms = %metadata.total_duration.as_millis(),
                    "Operation completed"
                );
                OperationResult::success(value, metadata)
            }
            Err(error) => {
                warn!(
                    operation = %operation_name,
                    correlation_id = %metadata.correlation_id,
                    attempts = %metadata.attempt_count,
                    fallback_used = %metadata.fallback_used,
                    circuit_state = %metadata.circuit_breaker_state,
                    error = %error,
                    "Operation failed"
                );
                OperationResult::failure(error, metadata)
            }
        }
    }
}
