//! Provider client: one back-end, one rate limiter, one retry loop.
//!
//! [`ProviderClient`] is the single capability surface over every back-end
//! variant. The variant ([`ProviderKind`]) fixes the message shape and the
//! task-type vocabulary at construction; the [`Transport`] performs the
//! actual calls. Every call, including each retry, passes the client's
//! [`RateLimiter`] first.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::batcher::EmbeddingBatcher;
use super::config::ProviderConfig;
use super::kind::ProviderKind;
use super::message::{ChatMessage, ChatRequest, DocumentType, EmbedRequest, Role};
use super::rate_limit::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use super::transport::{Transport, TransportRequest};
use crate::error::{ConfigError, Error, ProviderError};
use crate::settings::Settings;

/// Per-call overrides for text generation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    /// Output token cap; the client default when `None`.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature; the client default when `None`.
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EmbeddingModel {
    id: String,
    size: usize,
}

/// Rate-limited, retrying client for one back-end.
#[derive(Debug)]
pub struct ProviderClient {
    kind: ProviderKind,
    transport: Option<Box<dyn Transport>>,
    config: ProviderConfig,
    limiter: RateLimiter,
    retry: RetryPolicy,
    batcher: EmbeddingBatcher,
    generation_model: Option<String>,
    embedding_model: Option<EmbeddingModel>,
}

impl ProviderClient {
    /// Creates a client with no transport and no models.
    ///
    /// Calls fail with [`ProviderError::NotConfigured`] until a transport
    /// and the relevant model are set.
    #[must_use]
    pub fn new(kind: ProviderKind, config: ProviderConfig) -> Self {
        Self {
            kind,
            transport: None,
            limiter: RateLimiter::from_config(&config),
            retry: RetryPolicy::from_config(&config),
            batcher: EmbeddingBatcher::new(config.batch_size, config.batch_pacing),
            config,
            generation_model: None,
            embedding_model: None,
        }
    }

    /// Attaches the transport used for every call.
    #[must_use]
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the rate limiter, e.g. with one driven by a manual clock.
    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Builds the generation client described by `settings`.
    ///
    /// # Errors
    ///
    /// Fails if the back-end has no built-in transport or lacks credentials.
    pub fn for_generation(settings: &Settings) -> Result<Self, Error> {
        let kind = settings.generation_backend;
        let config = ProviderConfig::from_env(kind)?;
        let mut client = Self::new(kind, config).with_transport(create_transport(kind, settings)?);
        if let Some(model) = &settings.generation_model_id {
            client.set_generation_model(model.clone());
        }
        Ok(client)
    }

    /// Builds the embedding client described by `settings`.
    ///
    /// # Errors
    ///
    /// Fails if the back-end has no built-in transport or lacks credentials.
    pub fn for_embedding(settings: &Settings) -> Result<Self, Error> {
        let kind = settings.embedding_backend;
        let config = ProviderConfig::from_env(kind)?;
        let mut client = Self::new(kind, config).with_transport(create_transport(kind, settings)?);
        if let (Some(model), Some(size)) =
            (&settings.embedding_model_id, settings.embedding_model_size)
        {
            client.set_embedding_model(model.clone(), size);
        }
        Ok(client)
    }

    /// Back-end variant.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Limits this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Sets the generation model.
    pub fn set_generation_model(&mut self, model_id: impl Into<String>) {
        self.generation_model = Some(model_id.into());
    }

    /// Sets the embedding model and the vector length it produces.
    pub fn set_embedding_model(&mut self, model_id: impl Into<String>, embedding_size: usize) {
        self.embedding_model = Some(EmbeddingModel {
            id: model_id.into(),
            size: embedding_size,
        });
    }

    /// Truncates to the input cap (in characters) and trims.
    #[must_use]
    pub fn process_text(&self, text: &str) -> String {
        let cut = text
            .char_indices()
            .nth(self.config.input_max_characters)
            .map_or(text.len(), |(i, _)| i);
        text[..cut].trim().to_string()
    }

    /// Builds a message in this back-end's native shape.
    #[must_use]
    pub fn construct_prompt(&self, content: &str, role: Role) -> ChatMessage {
        let content = self.process_text(content);
        ChatMessage {
            shape: self.kind.message_shape(role, &content),
            role,
            content,
        }
    }

    /// Generates a completion, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotConfigured`] without a transport or
    /// model, [`ProviderError::EmptyResponse`] for blank output, and the
    /// retry loop's terminal error otherwise.
    pub async fn try_generate_text(
        &self,
        prompt: &str,
        history: &[ChatMessage],
        options: GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let transport = self.transport.as_deref().ok_or(ProviderError::NotConfigured {
            what: "generation transport",
        })?;
        let model = self
            .generation_model
            .as_deref()
            .ok_or(ProviderError::NotConfigured {
                what: "generation model",
            })?;

        let request = ChatRequest {
            model: model.to_string(),
            history: history.to_vec(),
            prompt: self.process_text(prompt),
            max_tokens: options
                .max_output_tokens
                .unwrap_or(self.config.generation_max_output_tokens),
            temperature: Some(
                options
                    .temperature
                    .unwrap_or(self.config.generation_temperature),
            ),
        };
        debug!(provider = %self.kind, model, history = history.len(), "generating text");

        let text = self.execute(transport, request, cancel).await?;
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }

    /// Generates a completion; any failure is logged and yields `None`.
    pub async fn generate_text(
        &self,
        prompt: &str,
        history: &[ChatMessage],
        options: GenerationOptions,
        cancel: &CancellationToken,
    ) -> Option<String> {
        match self.try_generate_text(prompt, history, options, cancel).await {
            Ok(text) => Some(text),
            Err(e) => {
                error!(provider = %self.kind, error = %e, "text generation failed");
                None
            }
        }
    }

    /// Embeds one text. Empty text yields `None` without a call.
    pub async fn embed_text(
        &self,
        text: &str,
        document_type: DocumentType,
        cancel: &CancellationToken,
    ) -> Option<Vec<f32>> {
        if text.is_empty() {
            debug!(provider = %self.kind, "skipping embedding of empty text");
            return None;
        }
        self.embed_texts(&[text.to_string()], document_type, cancel)
            .await
            .into_iter()
            .next()
            .flatten()
    }

    /// Embeds many texts in batches.
    ///
    /// The result has one entry per input, in input order; entries are
    /// `None` where a batch failed, the vector had the wrong length, or
    /// the call was cancelled first.
    pub async fn embed_texts(
        &self,
        texts: &[String],
        document_type: DocumentType,
        cancel: &CancellationToken,
    ) -> Vec<Option<Vec<f32>>> {
        if texts.is_empty() {
            return Vec::new();
        }
        let (transport, model) = match (self.transport.as_deref(), self.embedding_model.as_ref()) {
            (Some(transport), Some(model)) => (transport, model),
            (transport, _) => {
                let err = ProviderError::NotConfigured {
                    what: if transport.is_none() {
                        "embedding transport"
                    } else {
                        "embedding model"
                    },
                };
                error!(provider = %self.kind, error = %err, "embedding failed");
                return vec![None; texts.len()];
            }
        };

        let processed: Vec<String> = texts.iter().map(|t| self.process_text(t)).collect();
        let task_type = self.kind.task_type(document_type);
        debug!(
            provider = %self.kind,
            texts = texts.len(),
            batch_size = self.batcher.batch_size(),
            document_type = %document_type,
            "embedding texts"
        );

        let vectors = self
            .batcher
            .run(&processed, cancel, |batch| {
                let request = EmbedRequest {
                    model: model.id.clone(),
                    texts: batch,
                    task_type,
                    dimensions: Some(model.size),
                };
                self.execute(transport, request, cancel)
            })
            .await;

        vectors
            .into_iter()
            .map(|slot| {
                slot.filter(|v| {
                    let fits = v.len() == model.size;
                    if !fits {
                        warn!(
                            provider = %self.kind,
                            expected = model.size,
                            received = v.len(),
                            "embedding has unexpected dimension"
                        );
                    }
                    fits
                })
            })
            .collect()
    }

    /// Sends `request` under admission control and the retry policy.
    async fn execute<R: TransportRequest>(
        &self,
        transport: &dyn Transport,
        mut request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Output, ProviderError> {
        let mut state = RetryState::default();
        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            self.limiter.acquire(cancel).await?;

            let failure = match request.send(transport).await {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

            match self.retry.decide(&failure, &mut state) {
                RetryDecision::RetryAfter {
                    delay,
                    drain_bucket,
                } => {
                    if drain_bucket {
                        self.limiter.drain().await;
                    }
                    warn!(
                        provider = %self.kind,
                        operation = request.operation(),
                        attempt = state.retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %failure,
                        "call failed, backing off"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::StripArgument { param } => {
                    if !request.strip_argument(param.as_deref()) {
                        return Err(ProviderError::InvalidArgument { param });
                    }
                    info!(
                        provider = %self.kind,
                        operation = request.operation(),
                        param = param.as_deref().unwrap_or("<unnamed>"),
                        "back-end rejected an optional argument, retrying without it"
                    );
                }
                RetryDecision::GiveUp(e) => return Err(e),
            }
        }
    }
}

/// Creates the built-in transport for a back-end.
///
/// # Errors
///
/// Returns [`ProviderError::UnsupportedProvider`] for back-ends without a
/// built-in transport and [`ConfigError::ApiKeyMissing`] without a key.
pub fn create_transport(kind: ProviderKind, settings: &Settings) -> Result<Box<dyn Transport>, Error> {
    match kind {
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => {
            let api_key = settings
                .openai_api_key
                .as_deref()
                .ok_or(ConfigError::ApiKeyMissing)?;
            Ok(Box::new(super::transports::OpenAiTransport::new(
                api_key,
                settings.openai_api_url.as_deref(),
            )))
        }
        other => {
            let _ = settings;
            Err(ProviderError::UnsupportedProvider {
                name: other.to_string(),
            }
            .into())
        }
    }
}
