//! Top-level assembly of the generation core
//!
//! `GenerationServiceBuilder` constructs every component explicitly from a
//! `GenerationConfig` and wires them together. There are no module-level
//! singletons; each service instance owns its breaker, validator and
//! controller, and shares only what the caller injects.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GenerationConfig;
use crate::error::{ErrorClassifier, GenerationError, HeuristicErrorClassifier};
use crate::events::{EventSink, TracingEventSink};
use crate::persistence::ContentStore;
use crate::quality::{ContentScorer, ContentType, HeuristicQualityScorer, QualityValidator};
use crate::regeneration::{EnhancedGenerationResult, GenerationRequest, RawGenerationResult, RegenerationController};
use crate::resilience::{CircuitBreaker, CircuitState, Clock, Resilience, RetryExecutor, SystemClock};

/// Circuit key of generation calls for a content type
pub fn operation_name(content_type: ContentType) -> String {
    format!("generate:{}", content_type)
}

/// Builder for `GenerationService`
pub struct GenerationServiceBuilder {
    config: GenerationConfig,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn ContentStore>>,
    classifier: Arc<dyn ErrorClassifier>,
    scorer: Arc<dyn ContentScorer>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Default for GenerationServiceBuilder {
    fn default() -> Self {
        Self {
            config: GenerationConfig::default(),
            events: Arc::new(TracingEventSink),
            store: None,
            classifier: Arc::new(HeuristicErrorClassifier),
            scorer: Arc::new(HeuristicQualityScorer),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        }
    }
}

impl GenerationServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Where observability events go; defaults to `TracingEventSink`
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Persist every generated attempt
    pub fn content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the heuristic error classifier, e.g. with a provider-specific mapping
    pub fn classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn ContentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Clock driving circuit recovery timeouts
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Validate the configuration and assemble the service
    pub fn build(self) -> Result<GenerationService, GenerationError> {
        self.config.validate()?;

        let breaker = Arc::new(
            CircuitBreaker::with_clock(self.config.circuit_breaker.clone(), self.clock)?
                .with_event_sink(Arc::clone(&self.events)),
        );
        let retry = RetryExecutor::new(self.config.retry.clone(), breaker)?
            .with_classifier(self.classifier)
            .with_event_sink(Arc::clone(&self.events))
            .with_cancellation(self.cancel.clone());
        let resilience = Resilience::from_executor(retry);

        let validator = QualityValidator::new(self.config.quality.clone())?.with_scorer(self.scorer);
        let mut controller = RegenerationController::new(self.config.regeneration.clone(), validator)?
            .with_event_sink(Arc::clone(&self.events))
            .with_cancellation(self.cancel.clone());
        if let Some(store) = self.store {
            controller = controller.with_store(store);
        }

        info!(
            max_attempts = %self.config.retry.max_attempts,
            failure_threshold = %self.config.circuit_breaker.failure_threshold,
            max_regeneration_attempts = %self.config.regeneration.max_regeneration_attempts,
            quality_threshold = %self.config.regeneration.quality_threshold,
            "Generation service assembled"
        );

        Ok(GenerationService {
            config: self.config,
            resilience,
            controller,
            cancel: self.cancel,
        })
    }
}

/// Resilient, quality-gated content generation
#[derive(Debug, Clone)]
pub struct GenerationService {
    config: GenerationConfig,
    resilience: Resilience,
    controller: RegenerationController,
    cancel: CancellationToken,
}

impl GenerationService {
    pub fn builder() -> GenerationServiceBuilder {
        GenerationServiceBuilder::new()
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn resilience(&self) -> &Resilience {
        &self.resilience
    }

    pub fn controller(&self) -> &RegenerationController {
        &self.controller
    }

    /// Circuit state of the primary provider for a content type
    pub fn circuit_state(&self, content_type: ContentType) -> CircuitState {
        self.resilience.circuit_state(&operation_name(content_type))
    }

    /// Token that cancels all in-flight and future requests of this service
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight requests; they resolve with `GenerationError::Cancelled`
    pub fn shutdown(&self) {
        info!("Generation service shutting down");
        self.cancel.cancel();
    }

    /// Generate content for `request` through the primary provider only
    pub async fn generate<P, PFut>(
        &self,
        request: &GenerationRequest,
        primary: P,
    ) -> Result<EnhancedGenerationResult, GenerationError>
    where
        P: Fn() -> PFut,
        PFut: Future<Output = anyhow::Result<RawGenerationResult>>,
    {
        self.generate_with_fallback(request, primary, None::<P>).await
    }

    /// Generate content for `request`, falling back to `fallback` whenever the
    /// primary's retry budget is spent within an attempt
    pub async fn generate_with_fallback<P, PFut, G, GFut>(
        &self,
        request: &GenerationRequest,
        primary: P,
        fallback: Option<G>,
    ) -> Result<EnhancedGenerationResult, GenerationError>
    where
        P: Fn() -> PFut,
        PFut: Future<Output = anyhow::Result<RawGenerationResult>>,
        G: Fn() -> GFut,
        GFut: Future<Output = anyhow::Result<RawGenerationResult>>,
    {
        let name = operation_name(request.content_type);
        let operation = name.as_str();
        let resilience = &self.resilience;
        let primary = &primary;
        let fallback = fallback.as_ref();

        self.controller
            .generate_with_quality_validation(request, move || {
                resilience.execute_with_retry_and_circuit_breaker(operation, primary, fallback)
            })
            .await
    }
}
