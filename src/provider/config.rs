//! Provider limits with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! A [`ProviderConfig`] is fixed once a client is built.

use std::time::Duration;

use super::kind::ProviderKind;
use crate::error::ConfigError;

/// Default input cap in characters.
const DEFAULT_INPUT_MAX_CHARACTERS: usize = 1000;
/// Default generation output cap.
const DEFAULT_GENERATION_MAX_OUTPUT_TOKENS: u32 = 1000;
/// Default sampling temperature.
const DEFAULT_GENERATION_TEMPERATURE: f32 = 0.1;
/// Default bucket capacity (requests).
const DEFAULT_RATE_LIMIT_CAPACITY: f64 = 100.0;
/// Default refill rate: 100 requests per minute.
const DEFAULT_REFILL_RATE_PER_SECOND: f64 = 100.0 / 60.0;
/// Default rate-limit retry budget.
const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default exponential backoff base (seconds).
const DEFAULT_BACKOFF_BASE: f64 = 4.0;
/// Default pause after every embedding batch.
const DEFAULT_BATCH_PACING: Duration = Duration::from_secs(1);

/// Limits and defaults governing one provider client.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Hard cap on characters sent per text.
    pub input_max_characters: usize,
    /// Output token cap when the caller does not pass one.
    pub generation_max_output_tokens: u32,
    /// Temperature when the caller does not pass one.
    pub generation_temperature: f32,
    /// Texts per embedding call.
    pub batch_size: usize,
    /// Token bucket capacity.
    pub rate_limit_capacity: f64,
    /// Tokens restored per second.
    pub refill_rate_per_second: f64,
    /// Rate-limit retry budget per call.
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: f64,
    /// Pause applied after every embedding batch.
    pub batch_pacing: Duration,
}

impl ProviderConfig {
    /// Creates a new builder for `ProviderConfig`.
    #[must_use]
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Creates configuration for a back-end from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_env(kind: ProviderKind) -> Result<Self, ConfigError> {
        Self::builder().from_env().build_for(kind)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            input_max_characters: DEFAULT_INPUT_MAX_CHARACTERS,
            generation_max_output_tokens: DEFAULT_GENERATION_MAX_OUTPUT_TOKENS,
            generation_temperature: DEFAULT_GENERATION_TEMPERATURE,
            batch_size: ProviderKind::OpenAi.default_batch_size(),
            rate_limit_capacity: DEFAULT_RATE_LIMIT_CAPACITY,
            refill_rate_per_second: DEFAULT_REFILL_RATE_PER_SECOND,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            batch_pacing: DEFAULT_BATCH_PACING,
        }
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigBuilder {
    input_max_characters: Option<usize>,
    generation_max_output_tokens: Option<u32>,
    generation_temperature: Option<f32>,
    batch_size: Option<usize>,
    rate_limit_capacity: Option<f64>,
    refill_rate_per_second: Option<f64>,
    max_retries: Option<u32>,
    backoff_base: Option<f64>,
    batch_pacing: Option<Duration>,
}

/// Reads and parses an environment variable, ignoring malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl ProviderConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.input_max_characters.is_none() {
            self.input_max_characters = env_parse("RAGRELAY_INPUT_MAX_CHARACTERS");
        }
        if self.generation_max_output_tokens.is_none() {
            self.generation_max_output_tokens =
                env_parse("RAGRELAY_GENERATION_MAX_OUTPUT_TOKENS");
        }
        if self.generation_temperature.is_none() {
            self.generation_temperature = env_parse("RAGRELAY_GENERATION_TEMPERATURE");
        }
        if self.batch_size.is_none() {
            self.batch_size = env_parse("RAGRELAY_BATCH_SIZE");
        }
        if self.rate_limit_capacity.is_none() {
            self.rate_limit_capacity = env_parse("RAGRELAY_RATE_LIMIT_CAPACITY");
        }
        if self.refill_rate_per_second.is_none() {
            self.refill_rate_per_second = env_parse("RAGRELAY_REFILL_RATE_PER_SECOND");
        }
        if self.max_retries.is_none() {
            self.max_retries = env_parse("RAGRELAY_MAX_RETRIES");
        }
        if self.backoff_base.is_none() {
            self.backoff_base = env_parse("RAGRELAY_BACKOFF_BASE");
        }
        if self.batch_pacing.is_none() {
            self.batch_pacing = env_parse("RAGRELAY_BATCH_PACING_MS").map(Duration::from_millis);
        }
        self
    }

    /// Sets the input character cap.
    #[must_use]
    pub const fn input_max_characters(mut self, n: usize) -> Self {
        self.input_max_characters = Some(n);
        self
    }

    /// Sets the default output token cap.
    #[must_use]
    pub const fn generation_max_output_tokens(mut self, n: u32) -> Self {
        self.generation_max_output_tokens = Some(n);
        self
    }

    /// Sets the default temperature.
    #[must_use]
    pub const fn generation_temperature(mut self, t: f32) -> Self {
        self.generation_temperature = Some(t);
        self
    }

    /// Sets the embedding batch size.
    #[must_use]
    pub const fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    /// Sets the token bucket capacity.
    #[must_use]
    pub const fn rate_limit_capacity(mut self, capacity: f64) -> Self {
        self.rate_limit_capacity = Some(capacity);
        self
    }

    /// Sets the refill rate in tokens per second.
    #[must_use]
    pub const fn refill_rate_per_second(mut self, rate: f64) -> Self {
        self.refill_rate_per_second = Some(rate);
        self
    }

    /// Sets the rate-limit retry budget.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the backoff base in seconds.
    #[must_use]
    pub const fn backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = Some(base);
        self
    }

    /// Sets the pause applied after every embedding batch.
    #[must_use]
    pub const fn batch_pacing(mut self, pacing: Duration) -> Self {
        self.batch_pacing = Some(pacing);
        self
    }

    /// Builds the [`ProviderConfig`] using `OpenAI` batch defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is out of range.
    pub fn build(self) -> Result<ProviderConfig, ConfigError> {
        self.build_for(ProviderKind::OpenAi)
    }

    /// Builds the [`ProviderConfig`] using the given back-end's batch default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is out of range.
    pub fn build_for(self, kind: ProviderKind) -> Result<ProviderConfig, ConfigError> {
        let config = ProviderConfig {
            input_max_characters: self
                .input_max_characters
                .unwrap_or(DEFAULT_INPUT_MAX_CHARACTERS),
            generation_max_output_tokens: self
                .generation_max_output_tokens
                .unwrap_or(DEFAULT_GENERATION_MAX_OUTPUT_TOKENS),
            generation_temperature: self
                .generation_temperature
                .unwrap_or(DEFAULT_GENERATION_TEMPERATURE),
            batch_size: self.batch_size.unwrap_or_else(|| kind.default_batch_size()),
            rate_limit_capacity: self
                .rate_limit_capacity
                .unwrap_or(DEFAULT_RATE_LIMIT_CAPACITY),
            refill_rate_per_second: self
                .refill_rate_per_second
                .unwrap_or(DEFAULT_REFILL_RATE_PER_SECOND),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff_base: self.backoff_base.unwrap_or(DEFAULT_BACKOFF_BASE),
            batch_pacing: self.batch_pacing.unwrap_or(DEFAULT_BATCH_PACING),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &ProviderConfig) -> Result<(), ConfigError> {
    let invalid = |field: &'static str, message: &str| ConfigError::Invalid {
        field,
        message: message.to_string(),
    };

    if config.input_max_characters == 0 {
        return Err(invalid("input_max_characters", "must be at least 1"));
    }
    if config.batch_size == 0 {
        return Err(invalid("batch_size", "must be at least 1"));
    }
    if !(config.rate_limit_capacity >= 1.0 && config.rate_limit_capacity.is_finite()) {
        return Err(invalid("rate_limit_capacity", "must be a finite value >= 1"));
    }
    if !(config.refill_rate_per_second > 0.0 && config.refill_rate_per_second.is_finite()) {
        return Err(invalid("refill_rate_per_second", "must be a finite value > 0"));
    }
    if !(config.backoff_base > 1.0 && config.backoff_base.is_finite()) {
        return Err(invalid("backoff_base", "must be a finite value > 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ProviderConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.input_max_characters, DEFAULT_INPUT_MAX_CHARACTERS);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.batch_size, 10);
        assert!((config.backoff_base - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.batch_pacing, Duration::from_secs(1));
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_batch_size_follows_back_end() {
        let config = ProviderConfig::builder()
            .build_for(ProviderKind::Google)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.batch_size, 5);

        let config = ProviderConfig::builder()
            .batch_size(3)
            .build_for(ProviderKind::Google)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.batch_size, 3);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ProviderConfig::builder()
            .input_max_characters(50)
            .rate_limit_capacity(3.0)
            .refill_rate_per_second(0.5)
            .max_retries(2)
            .backoff_base(2.0)
            .batch_pacing(Duration::ZERO)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.input_max_characters, 50);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.batch_pacing, Duration::ZERO);
    }

    #[test]
    fn test_builder_rejects_out_of_range() {
        assert!(matches!(
            ProviderConfig::builder().batch_size(0).build(),
            Err(ConfigError::Invalid {
                field: "batch_size",
                ..
            })
        ));
        assert!(ProviderConfig::builder().refill_rate_per_second(0.0).build().is_err());
        assert!(ProviderConfig::builder().rate_limit_capacity(0.5).build().is_err());
        assert!(ProviderConfig::builder().backoff_base(1.0).build().is_err());
        assert!(ProviderConfig::builder().input_max_characters(0).build().is_err());
    }
}
