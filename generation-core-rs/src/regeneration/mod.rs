//! Quality-gated regeneration
//!
//! One request runs the state machine
//!
//! ```text
//! Attempting(n) -> Scoring -> Done | Attempting(n + 1) | Exhausted
//! ```
//!
//! Each attempt calls the generation function (normally a full resilient call
//! with its own transport retries), parses and optionally stores the content,
//! then scores it against the quality gate. Attempts are strictly sequential.
//! The content-level attempt budget is configured here and is independent of
//! the transport-level `RetryConfig::max_attempts`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EnhancedError, GenerationError, QualityValidationError};
use crate::events::{EventName, EventSink, GenerationEvent, NoopEventSink};
use crate::persistence::{local_content_id, ContentId, ContentStore};
use crate::quality::feedback::merge_unique;
use crate::quality::{ContentMetadata, ContentType, GeneratedContent, QualityValidationResult, QualityValidator};
use crate::resilience::{OperationMetadata, OperationResult};
use crate::util::{generate_correlation_id, sanitize_for_logging, truncate_string};

/// Regeneration loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationSettings {
    /// When disabled, a request gets exactly one attempt
    pub enabled: bool,
    /// Regenerate automatically when content fails the quality gate
    pub auto_regenerate: bool,
    pub max_regeneration_attempts: u32,
    /// Minimum overall score, checked on top of the quality thresholds
    pub quality_threshold: f64,
    /// Fixed pause between attempts
    pub regeneration_delay_ms: u64,
}

impl Default for RegenerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_regenerate: true,
            max_regeneration_attempts: 3,
            quality_threshold: 6.0,
            regeneration_delay_ms: 1000,
        }
    }
}

impl RegenerationSettings {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_regeneration_attempts == 0 {
            return Err(GenerationError::configuration(
                "regeneration.max_regeneration_attempts must be at least 1",
            ));
        }
        if !(0.0..=10.0).contains(&self.quality_threshold) {
            return Err(GenerationError::configuration(format!(
                "regeneration.quality_threshold must be within [0, 10], got {}",
                self.quality_threshold
            )));
        }
        Ok(())
    }

    pub fn regeneration_delay(&self) -> Duration {
        Duration::from_millis(self.regeneration_delay_ms)
    }

    /// Attempt budget of one request
    pub fn attempt_budget(&self) -> u32 {
        if self.enabled {
            self.max_regeneration_attempts
        } else {
            1
        }
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What an upstream generation call returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGenerationResult {
    pub content: String,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    pub provider: String,
    pub model: String,
}

impl RawGenerationResult {
    pub fn new(content: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// One generate-and-validate request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub content_type: ContentType,
    pub metadata: ContentMetadata,
    /// Return the first successful generation without scoring it
    pub skip_validation: bool,
    /// Overrides `RegenerationSettings::quality_threshold` for this request
    pub quality_threshold: Option<f64>,
}

impl GenerationRequest {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            metadata: ContentMetadata::default(),
            skip_validation: false,
            quality_threshold: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ContentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }

    /// Reject a threshold override no score could ever meet
    pub fn validate(&self) -> Result<(), GenerationError> {
        match self.quality_threshold {
            Some(threshold) if !(0.0..=10.0).contains(&threshold) => {
                Err(GenerationError::configuration(format!(
                    "request quality_threshold must be within [0, 10], got {}",
                    threshold
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Successful outcome of a generate-and-validate request
#[derive(Debug, Clone)]
pub struct EnhancedGenerationResult {
    pub content: GeneratedContent,
    pub raw: RawGenerationResult,
    pub content_id: ContentId,
    /// `None` when validation was skipped
    pub validation: Option<QualityValidationResult>,
    /// Generation attempts made, including failed transport attempts
    pub attempts: u32,
    /// Resilience metadata of the accepted generation call
    pub resilience: OperationMetadata,
    /// Highest overall score seen across attempts
    pub best_overall: Option<f64>,
    /// Feedback from earlier rejected attempts, de-duplicated
    pub improvement_feedback: Vec<String>,
}

impl EnhancedGenerationResult {
    pub fn passes_threshold(&self) -> bool {
        self.validation
            .as_ref()
            .map(|v| v.passes_threshold)
            .unwrap_or(false)
    }
}

/// Mutable bookkeeping of one request
#[derive(Debug, Default)]
struct RegenerationSession {
    attempts: u32,
    best_overall: Option<f64>,
    last_scored: Option<(QualityValidationResult, GeneratedContent)>,
    last_error: Option<EnhancedError>,
    improvement: Vec<String>,
}

impl RegenerationSession {
    fn record_score(&mut self, validation: &QualityValidationResult) {
        let overall = validation.quality_score.overall;
        self.best_overall = Some(self.best_overall.map_or(overall, |best| best.max(overall)));
    }
}

/// Drives bounded, quality-gated regeneration
#[derive(Clone)]
pub struct RegenerationController {
    settings: RegenerationSettings,
    validator: QualityValidator,
    store: Option<Arc<dyn ContentStore>>,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RegenerationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegenerationController")
            .field("settings", &self.settings)
            .field("validator", &self.validator)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl RegenerationController {
    /// Create a controller; settings are validated here
    pub fn new(settings: RegenerationSettings, validator: QualityValidator) -> Result<Self, GenerationError> {
        settings.validate()?;
        Ok(Self {
            settings,
            validator,
            store: None,
            events: Arc::new(NoopEventSink),
            cancel: CancellationToken::new(),
        })
    }

    /// Persist every generated attempt before scoring it
    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &RegenerationSettings {
        &self.settings
    }

    pub fn validator(&self) -> &QualityValidator {
        &self.validator
    }

    /// Generate content until it passes the quality gate or the attempt budget is spent.
    ///
    /// Transport exhaustion on every attempt surfaces the last `EnhancedError`.
    /// If at least one attempt was scored, running out of attempts surfaces a
    /// `QualityValidationError` for the last scored attempt.
    pub async fn generate_with_quality_validation<F, Fut>(
        &self,
        request: &GenerationRequest,
        mut generation_fn: F,
    ) -> Result<EnhancedGenerationResult, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OperationResult<RawGenerationResult>>,
    {
        request.validate()?;

        let request_id = generate_correlation_id();
        let max_attempts = self.settings.attempt_budget();
        let threshold = request
            .quality_threshold
            .unwrap_or(self.settings.quality_threshold);
        let mut session = RegenerationSession::default();

        info!(
            request_id = %request_id,
            content_type = %request.content_type,
            max_attempts = %max_attempts,
            threshold = %threshold,
            skip_validation = %request.skip_validation,
            "Starting generation"
        );
        self.emit(
            EventName::GenerationStarted,
            &request_id,
            json!({
                "content_type": request.content_type,
                "max_attempts": max_attempts,
                "quality_threshold": threshold,
                "skip_validation": request.skip_validation,
            }),
        );

        while session.attempts < max_attempts {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&request_id, &session));
            }

            session.attempts += 1;
            let attempt = session.attempts;
            counter!("generation.regeneration.attempts", 1, "content_type" => request.content_type.as_str());
            self.emit(
                EventName::GenerationAttempt,
                &request_id,
                json!({ "attempt": attempt, "max_attempts": max_attempts }),
            );

            let (result, resilience) = generation_fn().await.into_parts();
            if resilience.cancelled {
                return Err(self.cancelled(&request_id, &session));
            }

            let raw = match result {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(
                        request_id = %request_id,
                        attempt = %attempt,
                        correlation_id = %resilience.correlation_id,
                        fallback_used = %resilience.fallback_used,
                        error = %error,
                        "Generation attempt failed"
                    );
                    session.last_error = Some(error);
                    if attempt < max_attempts {
                        self.schedule_regeneration(&request_id, attempt, "generation_failed");
                        if !self.pause().await {
                            return Err(self.cancelled(&request_id, &session));
                        }
                    }
                    continue;
                }
            };

            debug!(
                request_id = %request_id,
                attempt = %attempt,
                provider = %raw.provider,
                model = %raw.model,
                preview = %truncate_string(&raw.content, 80),
                "Generation attempt produced content"
            );

            let content = GeneratedContent::parse(request.content_type, &raw.content);
            let content_id = self.persist(&content).await;

            if request.skip_validation {
                self.emit(
                    EventName::GenerationSuccess,
                    &request_id,
                    json!({ "attempt": attempt, "content_id": content_id, "validated": false }),
                );
                return Ok(EnhancedGenerationResult {
                    content,
                    raw,
                    content_id,
                    validation: None,
                    attempts: attempt,
                    resilience,
                    best_overall: session.best_overall,
                    improvement_feedback: session.improvement,
                });
            }

            let validation = self
                .validator
                .validate(&content_id, &raw.content, &content, &request.metadata);
            session.record_score(&validation);

            let overall = validation.quality_score.overall;
            let passed = validation.passes_threshold && overall >= threshold;
            self.emit(
                EventName::QualityChecked,
                &request_id,
                json!({
                    "attempt": attempt,
                    "content_id": content_id,
                    "overall": overall,
                    "passes_threshold": validation.passes_threshold,
                    "quality_threshold": threshold,
                    "accepted": passed,
                    "scores": validation.quality_score,
                }),
            );

            if passed {
                info!(
                    request_id = %request_id,
                    attempt = %attempt,
                    overall = %overall,
                    "Generation accepted"
                );
                counter!("generation.requests.success", 1, "content_type" => request.content_type.as_str());
                self.emit(
                    EventName::GenerationSuccess,
                    &request_id,
                    json!({
                        "attempt": attempt,
                        "content_id": content_id,
                        "overall": overall,
                        "validated": true,
                    }),
                );
                return Ok(EnhancedGenerationResult {
                    content,
                    raw,
                    content_id,
                    validation: Some(validation),
                    attempts: attempt,
                    resilience,
                    best_overall: session.best_overall,
                    improvement_feedback: session.improvement,
                });
            }

            info!(
                request_id = %request_id,
                attempt = %attempt,
                overall = %overall,
                threshold = %threshold,
                "Content below quality threshold"
            );
            merge_unique(&mut session.improvement, &validation.feedback);
            merge_unique(&mut session.improvement, &validation.recommendations);
            session.last_scored = Some((validation, content));

            if !self.settings.auto_regenerate {
                debug!(request_id = %request_id, "Automatic regeneration disabled, stopping");
                break;
            }

            if attempt < max_attempts {
                self.schedule_regeneration(&request_id, attempt, "quality_below_threshold");
                if !self.pause().await {
                    return Err(self.cancelled(&request_id, &session));
                }
            }
        }

        Err(self.exhausted(&request_id, session))
    }

    fn exhausted(&self, request_id: &str, session: RegenerationSession) -> GenerationError {
        let error = match (session.last_scored, session.last_error) {
            (Some((result, content)), _) => {
                let best_overall = session
                    .best_overall
                    .unwrap_or(result.quality_score.overall);
                GenerationError::Quality(Box::new(QualityValidationError {
                    result,
                    content,
                    attempts: session.attempts,
                    best_overall,
                    improvement_recommendations: session.improvement,
                }))
            }
            (None, Some(error)) => GenerationError::Upstream(error),
            (None, None) => GenerationError::Upstream(EnhancedError::service_unavailable(
                "no generation attempt was made",
            )),
        };

        warn!(
            request_id = %request_id,
            attempts = %session.attempts,
            code = %error.code(),
            "Generation failed"
        );
        counter!("generation.requests.failure", 1, "code" => error.code());
        self.emit(
            EventName::GenerationFailed,
            request_id,
            json!({
                "attempts": session.attempts,
                "code": error.code(),
                "best_overall": session.best_overall,
                "error": sanitize_for_logging(&error.to_string()),
            }),
        );
        error
    }

    fn cancelled(&self, request_id: &str, session: &RegenerationSession) -> GenerationError {
        info!(request_id = %request_id, attempts = %session.attempts, "Generation cancelled");
        self.emit(
            EventName::GenerationFailed,
            request_id,
            json!({ "attempts": session.attempts, "code": "CANCELLED" }),
        );
        GenerationError::Cancelled
    }

    fn schedule_regeneration(&self, request_id: &str, attempt: u32, reason: &str) {
        self.emit(
            EventName::RegenerationScheduled,
            request_id,
            json!({
                "attempt": attempt,
                "next_attempt": attempt + 1,
                "reason": reason,
                "delay_ms": self.settings.regeneration_delay_ms,
            }),
        );
    }

    /// Store `content` when a store is configured; failures fall back to a local id
    async fn persist(&self, content: &GeneratedContent) -> ContentId {
        let Some(store) = &self.store else {
            return local_content_id();
        };
        match store.store_content(content).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to store generated content, continuing with a local id");
                local_content_id()
            }
        }
    }

    /// Fixed delay between attempts; false when cancelled first
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(self.settings.regeneration_delay()) => true,
        }
    }

    fn emit(&self, name: EventName, request_id: &str, payload: serde_json::Value) {
        self.events
            .emit(&GenerationEvent::new(name, Some(request_id), payload));
    }
}
