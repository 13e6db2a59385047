//! Configuration for the generation core
//!
//! Configuration is a structured object, loaded from TOML or from key/value
//! providers, and validated before any component is built. Environment
//! variables are deliberately not read here; callers that want them can wrap
//! them in their own `ConfigProvider`.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;
use crate::quality::{QualityDimension, QualityThresholds};
use crate::regeneration::RegenerationSettings;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};

type Result<T> = std::result::Result<T, GenerationError>;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;

    /// Whether the provider has a value for `key`
    fn contains_key(&self, key: &str) -> bool {
        self.get_string(key).is_ok()
    }
}

/// Typed accessors for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Parse a value as `T`
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.get_string(key)?;
        value.trim().parse::<T>().map_err(|e| {
            GenerationError::configuration(format!("Invalid value for key {}: {}", key, e))
        })
    }

    /// Parse a value as `T`, using `default` when the key is absent.
    /// A present but malformed value is an error.
    fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        if self.contains_key(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Get a boolean value, accepting the usual spellings
    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        if !self.contains_key(key) {
            return Ok(default);
        }
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(GenerationError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| GenerationError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Tries multiple providers in order; the first one holding a key wins
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    /// Add a provider with lower priority than those already added
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl Default for CompositeConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| {
                GenerationError::configuration(format!(
                    "Configuration key not found in any provider: {}",
                    key
                ))
            })
    }
}

/// Complete configuration of the generation core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub quality: QualityThresholds,
    pub regeneration: RegenerationSettings,
}

impl GenerationConfig {
    /// Parse a TOML document; missing sections and fields take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| GenerationError::configuration(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            GenerationError::configuration(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), "Loading generation configuration");
        Self::from_toml_str(&source)
    }

    /// Load from dotted keys (`retry.max_attempts`, `quality.minimum_overall`, ...)
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let retry = RetryConfig {
            max_attempts: provider.get_or("retry.max_attempts", defaults.retry.max_attempts)?,
            base_delay_ms: provider.get_or("retry.base_delay_ms", defaults.retry.base_delay_ms)?,
            max_delay_ms: provider.get_or("retry.max_delay_ms", defaults.retry.max_delay_ms)?,
            jitter_factor: provider.get_or("retry.jitter_factor", defaults.retry.jitter_factor)?,
            timeout_ms: provider.get_or("retry.timeout_ms", defaults.retry.timeout_ms)?,
        };

        let circuit_breaker = CircuitBreakerConfig {
            failure_threshold: provider.get_or(
                "circuit_breaker.failure_threshold",
                defaults.circuit_breaker.failure_threshold,
            )?,
            recovery_timeout_ms: provider.get_or(
                "circuit_breaker.recovery_timeout_ms",
                defaults.circuit_breaker.recovery_timeout_ms,
            )?,
        };

        let required_categories = if provider.contains_key("quality.required_categories") {
            parse_dimensions(&provider.get_string("quality.required_categories")?)?
        } else {
            defaults.quality.required_categories.clone()
        };
        let quality = QualityThresholds {
            minimum_overall: provider.get_or("quality.minimum_overall", defaults.quality.minimum_overall)?,
            minimum_educational: provider
                .get_or("quality.minimum_educational", defaults.quality.minimum_educational)?,
            minimum_age_appropriate: provider.get_or(
                "quality.minimum_age_appropriate",
                defaults.quality.minimum_age_appropriate,
            )?,
            minimum_coherence: provider
                .get_or("quality.minimum_coherence", defaults.quality.minimum_coherence)?,
            required_categories,
        };

        let regeneration = RegenerationSettings {
            enabled: provider.get_bool_or("regeneration.enabled", defaults.regeneration.enabled)?,
            auto_regenerate: provider
                .get_bool_or("regeneration.auto_regenerate", defaults.regeneration.auto_regenerate)?,
            max_regeneration_attempts: provider.get_or(
                "regeneration.max_regeneration_attempts",
                defaults.regeneration.max_regeneration_attempts,
            )?,
            quality_threshold: provider.get_or(
                "regeneration.quality_threshold",
                defaults.regeneration.quality_threshold,
            )?,
            regeneration_delay_ms: provider.get_or(
                "regeneration.regeneration_delay_ms",
                defaults.regeneration.regeneration_delay_ms,
            )?,
        };

        let config = Self {
            retry,
            circuit_breaker,
            quality,
            regeneration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.quality.validate()?;
        self.regeneration.validate()?;
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GenerationError::configuration(format!("Failed to serialize configuration: {}", e)))
    }
}

/// Parse a comma separated list of dimension names
fn parse_dimensions(value: &str) -> Result<Vec<QualityDimension>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            QualityDimension::ALL
                .iter()
                .copied()
                .find(|d| d.as_str() == name)
                .ok_or_else(|| GenerationError::configuration(format!("Unknown quality dimension: {}", name)))
        })
        .collect()
}
