//! # Generation Core
//!
//! Resilience core for AI content generation in the Phoenix ORCH project.
//!
//! This crate provides:
//!
//! - Transport-level resilience: retries with exponential backoff and jitter,
//!   a per-operation circuit breaker, and primary/fallback failover
//! - Heuristic classification of upstream failures into a closed taxonomy
//! - Deterministic quality scoring of generated stories
//! - A quality-gated regeneration loop built on top of the resilient call
//!
//! ## Architecture
//!
//! - `Resilience`: facade running an operation under retry, circuit breaking and fallback
//! - `RegenerationController`: regenerates content until it passes the quality gate
//! - `QualityValidator`: scores content and applies `QualityThresholds`
//! - `GenerationService`: explicit assembly of all of the above from a `GenerationConfig`
//! - `EventSink`: injected observability sink, one per component

pub mod config;
pub use config::{CompositeConfigProvider, ConfigProvider, GenerationConfig, MemoryConfigProvider};

pub mod error;
pub use error::{EnhancedError, ErrorKind, GenerationError, QualityValidationError, Severity};

pub mod events;
pub use events::{ChannelEventSink, EventName, EventSink, GenerationEvent, NoopEventSink, TracingEventSink};

pub mod logging;
pub use logging::{init_logging, LoggingConfig};

pub mod persistence;
pub use persistence::{ContentId, ContentStore, InMemoryContentStore};

pub mod quality;
pub use quality::{
    ContentMetadata, ContentType, GeneratedContent, QualityScore, QualityThresholds,
    QualityValidationResult, QualityValidator,
};

pub mod regeneration;
pub use regeneration::{
    EnhancedGenerationResult, GenerationRequest, RawGenerationResult, RegenerationController,
    RegenerationSettings, TokenUsage,
};

pub mod resilience;
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, OperationMetadata, OperationResult,
    Resilience, RetryConfig, RetryExecutor,
};

pub mod service;
pub use service::{GenerationService, GenerationServiceBuilder};

pub mod util;

#[cfg(test)]
mod tests;
