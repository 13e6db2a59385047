//! Circuit breaker keyed by operation name
//!
//! Each logical operation (e.g. `generate:story_content`) owns an independent
//! state machine:
//!
//! ```text
//! Closed   -> Open     : consecutive failures >= failure_threshold
//! Open     -> HalfOpen : recovery timeout elapsed, one trial call admitted
//! HalfOpen -> Closed   : trial call succeeds
//! HalfOpen -> Open     : trial call fails or is abandoned
//! ```
//!
//! A trial that is never recorded (its future dropped mid-call) is released
//! by `record_abandoned`, and any trial older than the recovery timeout is
//! considered abandoned so a new one can be admitted.
//!
//! All state for every key lives behind a single mutex that is never held
//! across an await point, so counting is serialized per key on both
//! current-thread and multi-threaded runtimes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::events::{EventName, EventSink, GenerationEvent, NoopEventSink};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls allowed
    Closed,
    /// Failing, calls rejected until the recovery timeout elapses
    Open,
    /// Recovery trial in progress
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Time the circuit stays open before admitting a trial call
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Recovery timeout as a `Duration`
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    /// Validate this configuration
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.failure_threshold == 0 {
            return Err(GenerationError::configuration(
                "circuit_breaker.failure_threshold must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Source of monotonic time, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Point-in-time view of one operation's circuit
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_transition_at: Instant,
}

#[derive(Debug)]
struct CircuitStats {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_transition_at: Instant,
    trial_started_at: Option<Instant>,
}

impl CircuitStats {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_transition_at: now,
            trial_started_at: None,
        }
    }

    fn snapshot(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            last_failure_at: self.last_failure_at,
            last_transition_at: self.last_transition_at,
        }
    }
}

/// Per-operation circuit breaker registry
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, CircuitStats>>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("circuits", &self.circuit_names())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a circuit breaker on the system clock
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, GenerationError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a circuit breaker on a custom clock
    pub fn with_clock(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GenerationError> {
        config.validate()?;
        Ok(Self {
            config,
            circuits: Mutex::new(HashMap::new()),
            clock,
            events: Arc::new(NoopEventSink),
        })
    }

    /// Emit state transitions to the given sink
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call to `operation` may proceed.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// and admits exactly one trial; further calls are rejected until that
    /// trial is recorded, abandoned, or older than the recovery timeout.
    pub fn allow(&self, operation: &str) -> bool {
        let now = self.clock.now();
        let mut circuits = self.lock();
        let stats = circuits
            .entry(operation.to_string())
            .or_insert_with(|| CircuitStats::new(now));

        match stats.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = now.saturating_duration_since(stats.last_transition_at);
                if elapsed >= self.config.recovery_timeout() {
                    self.transition(operation, stats, CircuitState::HalfOpen, now);
                    stats.trial_started_at = Some(now);
                    true
                } else {
                    debug!(
                        circuit = %operation,
                        remaining_ms = %(self.config.recovery_timeout() - elapsed).as_millis(),
                        "Circuit open, call rejected"
                    );
                    counter!(
                        "generation.circuit.rejected",
                        1,
                        "operation" => operation.to_string()
                    );
                    false
                }
            }
            CircuitState::HalfOpen => match stats.trial_started_at {
                Some(started)
                    if now.saturating_duration_since(started) < self.config.recovery_timeout() =>
                {
                    debug!(
                        circuit = %operation,
                        "Half-open trial already in flight, call rejected"
                    );
                    counter!(
                        "generation.circuit.rejected",
                        1,
                        "operation" => operation.to_string()
                    );
                    false
                }
                stale => {
                    if stale.is_some() {
                        warn!(
                            circuit = %operation,
                            "Half-open trial never resolved, admitting a new one"
                        );
                    }
                    stats.trial_started_at = Some(now);
                    true
                }
            },
        }
    }

    /// Record a successful call
    pub fn record_success(&self, operation: &str) {
        let now = self.clock.now();
        let mut circuits = self.lock();
        let stats = circuits
            .entry(operation.to_string())
            .or_insert_with(|| CircuitStats::new(now));

        stats.consecutive_failures = 0;
        stats.trial_started_at = None;

        if stats.state != CircuitState::Closed {
            self.transition(operation, stats, CircuitState::Closed, now);
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, operation: &str) {
        let now = self.clock.now();
        let mut circuits = self.lock();
        let stats = circuits
            .entry(operation.to_string())
            .or_insert_with(|| CircuitStats::new(now));

        stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
        stats.last_failure_at = Some(now);

        match stats.state {
            CircuitState::Closed => {
                if stats.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        circuit = %operation,
                        failures = %stats.consecutive_failures,
                        threshold = %self.config.failure_threshold,
                        "Circuit OPEN: failure threshold reached"
                    );
                    self.transition(operation, stats, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(circuit = %operation, "Circuit OPEN: half-open trial failed");
                stats.trial_started_at = None;
                self.transition(operation, stats, CircuitState::Open, now);
            }
            CircuitState::Open => {
                debug!(circuit = %operation, "Failure recorded while circuit open");
            }
        }
    }

    /// Release a call admitted by `allow` whose outcome will never be recorded.
    ///
    /// An abandoned half-open trial reopens the circuit; in the closed state
    /// nothing is known about the call and the counters are left alone.
    pub fn record_abandoned(&self, operation: &str) {
        let now = self.clock.now();
        let mut circuits = self.lock();
        let Some(stats) = circuits.get_mut(operation) else {
            return;
        };

        if stats.state == CircuitState::HalfOpen && stats.trial_started_at.is_some() {
            warn!(circuit = %operation, "Circuit OPEN: half-open trial abandoned");
            stats.trial_started_at = None;
            self.transition(operation, stats, CircuitState::Open, now);
        }
    }

    /// Current state of an operation's circuit; unknown operations are closed
    pub fn state(&self, operation: &str) -> CircuitState {
        self.lock()
            .get(operation)
            .map(|stats| stats.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Full snapshot of an operation's circuit, if it has been used
    pub fn snapshot(&self, operation: &str) -> Option<CircuitBreakerState> {
        self.lock().get(operation).map(CircuitStats::snapshot)
    }

    /// Reset one operation's circuit to closed
    pub fn reset(&self, operation: &str) {
        let now = self.clock.now();
        let mut circuits = self.lock();
        if let Some(stats) = circuits.get_mut(operation) {
            stats.consecutive_failures = 0;
            stats.trial_started_at = None;
            if stats.state != CircuitState::Closed {
                self.transition(operation, stats, CircuitState::Closed, now);
            }
        }
    }

    /// Forget every circuit
    pub fn reset_all(&self) {
        self.lock().clear();
        info!("All circuits reset");
    }

    /// Names of every operation seen so far
    pub fn circuit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn transition(
        &self,
        operation: &str,
        stats: &mut CircuitStats,
        to: CircuitState,
        now: Instant,
    ) {
        let from = stats.state;
        stats.state = to;
        stats.last_transition_at = now;

        info!(circuit = %operation, from = %from, to = %to, "Circuit state changed");
        counter!(
            "generation.circuit.transitions",
            1,
            "operation" => operation.to_string(),
            "to" => to.to_string()
        );
        self.events.emit(&GenerationEvent::new(
            EventName::CircuitStateChanged,
            None,
            json!({
                "operation": operation,
                "from": from,
                "to": to,
                "consecutive_failures": stats.consecutive_failures,
            }),
        ));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CircuitStats>> {
        self.circuits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
