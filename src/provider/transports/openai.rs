//! `OpenAI` transport using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`Settings`](crate::Settings).

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateEmbeddingRequest, CreateEmbeddingRequestArgs,
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::error::TransportError;
use crate::provider::message::{ChatMessage, ChatRequest, EmbedRequest, Role};
use crate::provider::transport::Transport;

/// `OpenAI`-compatible transport for chat completions and embeddings.
pub struct OpenAiTransport {
    client: Client<OpenAIConfig>,
}

impl OpenAiTransport {
    /// Creates a transport for the given key and optional base URL.
    #[must_use]
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(base_url) = base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config).with_backoff(single_attempt()),
        }
    }

    fn convert_message(role: Role, content: &str) -> ChatCompletionRequestMessage {
        match role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(content.to_string()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        content.to_string(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds the chat request: history in order, then the prompt as a user turn.
    fn build_chat_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let mut messages: Vec<_> = request
            .history
            .iter()
            .map(|m: &ChatMessage| Self::convert_message(m.role, &m.content))
            .collect();
        messages.push(Self::convert_message(Role::User, &request.prompt));

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: Some(request.max_tokens),
            ..Default::default()
        }
    }

    /// Builds the embedding request. `OpenAI` has no task-type argument.
    fn build_embed_request(request: &EmbedRequest) -> Result<CreateEmbeddingRequest, TransportError> {
        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&request.model).input(request.texts.clone());
        if let Some(dimensions) = request.dimensions {
            args.dimensions(u32::try_from(dimensions).unwrap_or(u32::MAX));
        }
        args.build().map_err(|e| TransportError::Fatal {
            message: e.to_string(),
        })
    }
}

/// SDK backoff that never retries.
///
/// Every 429 must reach [`classify_error`] on its first response so that
/// admission and the retry budget stay with the provider client.
fn single_attempt() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Maps an SDK failure onto the retry taxonomy.
fn classify_error(err: OpenAIError) -> TransportError {
    match err {
        OpenAIError::ApiError(api) => {
            let invalid_request = api.r#type.as_deref() == Some("invalid_request_error");
            match TransportError::classify(None, &api.message) {
                TransportError::Fatal { message } if invalid_request && api.param.is_some() => {
                    TransportError::InvalidArgument {
                        param: api.param,
                        message,
                    }
                }
                classified => classified,
            }
        }
        OpenAIError::Reqwest(e) => {
            let status = e.status().map(|s| s.as_u16());
            match TransportError::classify(status, &e.to_string()) {
                // No status means the request never completed.
                TransportError::Fatal { message } if status.is_none() => {
                    TransportError::Transient { message }
                }
                classified => classified,
            }
        }
        other => TransportError::Fatal {
            message: other.to_string(),
        },
    }
}

impl std::fmt::Debug for OpenAiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTransport")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, TransportError> {
        let response = self
            .client
            .chat()
            .create(Self::build_chat_request(request))
            .await
            .map_err(classify_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(TransportError::EmptyResponse)
    }

    async fn embed(&self, request: &EmbedRequest) -> Result<Vec<Vec<f32>>, TransportError> {
        let response = self
            .client
            .embeddings()
            .create(Self::build_embed_request(request)?)
            .await
            .map_err(classify_error)?;

        let mut data = response.data;
        if data.is_empty() {
            return Err(TransportError::EmptyResponse);
        }
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}
