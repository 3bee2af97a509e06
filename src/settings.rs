//! Process settings with builder pattern and environment variable support.
//!
//! Settings are resolved in order: explicit values → environment variables → defaults.
//! They select the generation and embedding back-ends, their models, the
//! credentials for the built-in transport, and the template languages.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::provider::ProviderKind;

/// Default back-end for both generation and embedding.
const DEFAULT_BACKEND: ProviderKind = ProviderKind::OpenAi;
/// Default working language for templates and pipeline messages.
const DEFAULT_PRIMARY_LANG: &str = "ar";
/// Fallback language when a template is missing in the primary language.
const DEFAULT_FALLBACK_LANG: &str = "en";

/// Process-level settings consumed by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Back-end used for text generation.
    pub generation_backend: ProviderKind,
    /// Back-end used for embeddings.
    pub embedding_backend: ProviderKind,
    /// Generation model identifier.
    pub generation_model_id: Option<String>,
    /// Embedding model identifier.
    pub embedding_model_id: Option<String>,
    /// Expected embedding vector length.
    pub embedding_model_size: Option<usize>,
    /// API key for the built-in `OpenAI` transport.
    pub openai_api_key: Option<String>,
    /// Base URL override for `OpenAI`-compatible APIs.
    pub openai_api_url: Option<String>,
    /// Template language tried first.
    pub primary_lang: String,
    /// Template language used when the primary one lacks a key.
    pub default_lang: String,
    /// Directory of template overrides (`<dir>/<lang>/<group>/<key>.txt`).
    pub template_dir: Option<PathBuf>,
}

impl Settings {
    /// Creates a new builder for `Settings`.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Creates settings from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a back-end name or size is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    generation_backend: Option<String>,
    embedding_backend: Option<String>,
    generation_model_id: Option<String>,
    embedding_model_id: Option<String>,
    embedding_model_size: Option<String>,
    openai_api_key: Option<String>,
    openai_api_url: Option<String>,
    primary_lang: Option<String>,
    default_lang: Option<String>,
    template_dir: Option<PathBuf>,
}

/// Reads a non-empty environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl SettingsBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.generation_backend.is_none() {
            self.generation_backend = env_value("GENERATION_BACKEND");
        }
        if self.embedding_backend.is_none() {
            self.embedding_backend = env_value("EMBEDDING_BACKEND");
        }
        if self.generation_model_id.is_none() {
            self.generation_model_id = env_value("GENERATION_MODEL_ID");
        }
        if self.embedding_model_id.is_none() {
            self.embedding_model_id = env_value("EMBEDDING_MODEL_ID");
        }
        if self.embedding_model_size.is_none() {
            self.embedding_model_size = env_value("EMBEDDING_MODEL_SIZE");
        }
        if self.openai_api_key.is_none() {
            self.openai_api_key = env_value("OPENAI_API_KEY");
        }
        if self.openai_api_url.is_none() {
            self.openai_api_url = env_value("OPENAI_API_URL");
        }
        if self.primary_lang.is_none() {
            self.primary_lang = env_value("PRIMARY_LANG");
        }
        if self.default_lang.is_none() {
            self.default_lang = env_value("DEFAULT_LANG");
        }
        if self.template_dir.is_none() {
            self.template_dir = env_value("RAGRELAY_TEMPLATE_DIR")
                .map(PathBuf::from)
                .or_else(|| dirs::config_dir().map(|d| d.join("ragrelay").join("templates")));
        }
        self
    }

    /// Sets the generation back-end name.
    #[must_use]
    pub fn generation_backend(mut self, name: impl Into<String>) -> Self {
        self.generation_backend = Some(name.into());
        self
    }

    /// Sets the embedding back-end name.
    #[must_use]
    pub fn embedding_backend(mut self, name: impl Into<String>) -> Self {
        self.embedding_backend = Some(name.into());
        self
    }

    /// Sets the generation model.
    #[must_use]
    pub fn generation_model_id(mut self, model: impl Into<String>) -> Self {
        self.generation_model_id = Some(model.into());
        self
    }

    /// Sets the embedding model and its vector length.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>, size: usize) -> Self {
        self.embedding_model_id = Some(model.into());
        self.embedding_model_size = Some(size.to_string());
        self
    }

    /// Sets the `OpenAI` API key.
    #[must_use]
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Sets the `OpenAI` base URL override.
    #[must_use]
    pub fn openai_api_url(mut self, url: impl Into<String>) -> Self {
        self.openai_api_url = Some(url.into());
        self
    }

    /// Sets the primary template language.
    #[must_use]
    pub fn primary_lang(mut self, lang: impl Into<String>) -> Self {
        self.primary_lang = Some(lang.into());
        self
    }

    /// Sets the fallback template language.
    #[must_use]
    pub fn default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = Some(lang.into());
        self
    }

    /// Sets the template override directory.
    #[must_use]
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Builds the [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProvider`] for an unrecognised back-end
    /// and [`ConfigError::Invalid`] for a malformed embedding size.
    pub fn build(self) -> Result<Settings, ConfigError> {
        let parse_backend = |name: Option<String>| {
            name.map_or(Ok(DEFAULT_BACKEND), |n| ProviderKind::parse(&n))
        };

        let embedding_model_size = self
            .embedding_model_size
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| ConfigError::Invalid {
                        field: "embedding_model_size",
                        message: format!("expected a positive integer, got `{s}`"),
                    })
            })
            .transpose()?;

        Ok(Settings {
            generation_backend: parse_backend(self.generation_backend)?,
            embedding_backend: parse_backend(self.embedding_backend)?,
            generation_model_id: self.generation_model_id,
            embedding_model_id: self.embedding_model_id,
            embedding_model_size,
            openai_api_key: self.openai_api_key,
            openai_api_url: self.openai_api_url,
            primary_lang: self
                .primary_lang
                .unwrap_or_else(|| DEFAULT_PRIMARY_LANG.to_string()),
            default_lang: self
                .default_lang
                .unwrap_or_else(|| DEFAULT_FALLBACK_LANG.to_string()),
            template_dir: self.template_dir,
        })
    }
}
