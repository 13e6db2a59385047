//! Retry with exponential backoff and jitter
//!
//! Every attempt is gated by the circuit breaker and bounded by a timeout.
//! Failures are classified; non-retryable kinds end the loop immediately and
//! rate-limit failures wait for the server-supplied delay when one is given.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EnhancedError, ErrorClassifier, GenerationError, HeuristicErrorClassifier};
use crate::events::{EventName, EventSink, GenerationEvent, NoopEventSink};
use crate::util::generate_correlation_id;

use super::circuit_breaker::CircuitBreaker;
use super::outcome::{OperationMetadata, OperationResult, RetryAttemptRecord};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub base_delay_ms: u64,

    /// Upper bound for the exponential delay
    pub max_delay_ms: u64,

    /// Fraction of the delay added as random jitter (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Time budget of a single attempt
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_factor: 0.1,
            timeout_ms: 30_000,
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_attempts: {}, base_delay_ms: {}, max_delay_ms: {}, jitter_factor: {}, timeout_ms: {} }}",
            self.max_attempts, self.base_delay_ms, self.max_delay_ms, self.jitter_factor, self.timeout_ms
        )
    }
}

impl RetryConfig {
    /// Validate this configuration
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_attempts == 0 {
            return Err(GenerationError::configuration("retry.max_attempts must be at least 1"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(GenerationError::configuration(format!(
                "retry.max_delay_ms ({}) must not be below retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(GenerationError::configuration(format!(
                "retry.jitter_factor must be within [0, 1], got {}",
                self.jitter_factor
            )));
        }
        if self.timeout_ms == 0 {
            return Err(GenerationError::configuration("retry.timeout_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Un-jittered delay after the given 1-based attempt:
    /// `min(base_delay * 2^(attempt-1), max_delay)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 1u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Backoff delay plus uniform jitter in `[0, delay * jitter_factor]`
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff_delay(attempt);
        let max_jitter_ms = delay.as_millis() as f64 * self.jitter_factor;
        if max_jitter_ms <= 0.0 {
            return delay;
        }
        let jitter_ms = rand::thread_rng().gen_range(0.0..=max_jitter_ms);
        delay + Duration::from_millis(jitter_ms.round() as u64)
    }
}

/// Releases a breaker admission whose attempt never finished.
///
/// Dropping the retry future mid-call skips both `record_success` and
/// `record_failure`, which would leave a half-open trial in flight.
struct AdmissionGuard<'a> {
    breaker: &'a CircuitBreaker,
    operation: &'a str,
    settled: bool,
}

impl<'a> AdmissionGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, operation: &'a str) -> Self {
        Self {
            breaker,
            operation,
            settled: false,
        }
    }

    fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.operation);
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.operation);
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(operation = %self.operation, "Attempt dropped before completion");
            self.breaker.record_abandoned(self.operation);
        }
    }
}

/// Raw outcome of one retry loop, before it is wrapped in an `OperationResult`
#[derive(Debug)]
pub(crate) struct RetryOutcome<T> {
    pub result: Result<T, EnhancedError>,
    pub attempts: Vec<RetryAttemptRecord>,
    pub cancelled: bool,
}

/// Executor for retry operations with exponential backoff
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    breaker: Arc<CircuitBreaker>,
    classifier: Arc<dyn ErrorClassifier>,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl RetryExecutor {
    /// Create a new retry executor; the configuration is validated here
    pub fn new(config: RetryConfig, breaker: Arc<CircuitBreaker>) -> Result<Self, GenerationError> {
        config.validate()?;
        Ok(Self {
            config,
            breaker,
            classifier: Arc::new(HeuristicErrorClassifier),
            events: Arc::new(NoopEventSink),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Stop retrying once this token is cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub(crate) fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Execute `operation` under retry, timeout and circuit breaker protection
    pub async fn execute_with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> OperationResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let correlation_id = generate_correlation_id();
        let started = Instant::now();
        let outcome = self.run(operation_name, &correlation_id, operation).await;

        let metadata = OperationMetadata {
            attempt_count: outcome.attempts.len() as u32,
            circuit_breaker_state: self.breaker.state(operation_name),
            correlation_id,
            fallback_used: false,
            cancelled: outcome.cancelled,
            total_duration: started.elapsed(),
            attempts: outcome.attempts,
        };

        match outcome.result {
            Ok(value) => OperationResult::success(value, metadata),
            Err(error) => OperationResult::failure(error, metadata),
        }
    }

    pub(crate) async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        correlation_id: &str,
        operation: F,
    ) -> RetryOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts;
        let mut attempts: Vec<RetryAttemptRecord> = Vec::with_capacity(max_attempts as usize);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if self.cancel.is_cancelled() {
                return self.cancelled(operation_name, attempts);
            }

            if !self.breaker.allow(operation_name) {
                warn!(
                    operation = %operation_name,
                    correlation_id = %correlation_id,
                    attempt = %attempt,
                    "Circuit open, failing fast"
                );
                self.events.emit(&GenerationEvent::new(
                    EventName::CircuitRejected,
                    Some(correlation_id),
                    json!({ "operation": operation_name, "attempt": attempt }),
                ));
                counter!("generation.retry.failure", 1, "operation" => operation_name.to_string());
                return RetryOutcome {
                    result: Err(EnhancedError::service_unavailable(format!(
                        "Circuit breaker open for operation '{}'",
                        operation_name
                    ))),
                    attempts,
                    cancelled: false,
                };
            }

            let admission = AdmissionGuard::new(&self.breaker, operation_name);
            counter!("generation.retry.attempts", 1, "operation" => operation_name.to_string());
            let attempt_started = Instant::now();
            let result = match timeout(self.config.timeout(), operation()).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(raw)) => Err(self.classifier.classify(raw)),
                Err(_) => Err(EnhancedError::timeout(format!(
                    "Operation '{}' timed out after {}ms",
                    operation_name, self.config.timeout_ms
                ))),
            };
            let elapsed = attempt_started.elapsed();

            let error = match result {
                Ok(value) => {
                    admission.success();
                    attempts.push(RetryAttemptRecord {
                        operation: operation_name.to_string(),
                        attempt,
                        elapsed,
                        error: None,
                    });

                    if attempt > 1 {
                        info!(
                            operation = %operation_name,
                            correlation_id = %correlation_id,
                            attempt = %attempt,
                            duration_ms = %started.elapsed().as_millis(),
                            "Operation succeeded after retries"
                        );
                    }
                    counter!("generation.retry.success", 1, "operation" => operation_name.to_string());
                    histogram!(
                        "generation.retry.duration_ms",
                        started.elapsed().as_millis() as f64,
                        "operation" => operation_name.to_string()
                    );

                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        cancelled: false,
                    };
                }
                Err(error) => error,
            };

            admission.failure();
            attempts.push(RetryAttemptRecord {
                operation: operation_name.to_string(),
                attempt,
                elapsed,
                error: Some(error.kind),
            });

            let will_retry = error.is_retryable() && attempt < max_attempts;
            self.events.emit(&GenerationEvent::new(
                EventName::RetryAttempt,
                Some(correlation_id),
                json!({
                    "operation": operation_name,
                    "attempt": attempt,
                    "max_attempts": max_attempts,
                    "error_code": error.code(),
                    "elapsed_ms": elapsed.as_millis() as u64,
                    "will_retry": will_retry,
                    "circuit_state": self.breaker.state(operation_name),
                }),
            ));

            if !will_retry {
                warn!(
                    operation = %operation_name,
                    correlation_id = %correlation_id,
                    attempt = %attempt,
                    max_attempts = %max_attempts,
                    retryable = %error.is_retryable(),
                    duration_ms = %started.elapsed().as_millis(),
                    error = %error,
                    "Giving up on operation"
                );
                counter!("generation.retry.failure", 1, "operation" => operation_name.to_string());
                return RetryOutcome {
                    result: Err(error),
                    attempts,
                    cancelled: false,
                };
            }

            let delay = self.delay_after(&error, attempt);
            debug!(
                operation = %operation_name,
                correlation_id = %correlation_id,
                attempt = %attempt,
                max_attempts = %max_attempts,
                delay_ms = %delay.as_millis(),
                error = %error,
                "Retrying after error"
            );

            if !self.pause(delay).await {
                return self.cancelled(operation_name, attempts);
            }
        }
    }

    /// Delay before the attempt following `attempt`; a rate-limit hint wins
    /// over the computed backoff
    fn delay_after(&self, error: &EnhancedError, attempt: u32) -> Duration {
        error
            .retry_after()
            .unwrap_or_else(|| self.config.jittered_delay(attempt))
    }

    /// Sleep unless cancelled first; returns false on cancellation
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }

    fn cancelled<T>(&self, operation_name: &str, attempts: Vec<RetryAttemptRecord>) -> RetryOutcome<T> {
        info!(operation = %operation_name, attempts = %attempts.len(), "Operation cancelled");
        RetryOutcome {
            result: Err(EnhancedError::service_unavailable(format!(
                "Operation '{}' was cancelled",
                operation_name
            ))),
            attempts,
            cancelled: true,
        }
    }
}
