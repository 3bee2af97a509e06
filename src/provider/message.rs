//! Provider-agnostic message and request types.
//!
//! [`ChatMessage`] carries both the generic role/content pair and the
//! back-end specific shape produced by
//! [`ProviderClient::construct_prompt`](super::ProviderClient::construct_prompt).
//! Requests are plain data handed to a [`Transport`](super::Transport).

use serde::{Deserialize, Serialize};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// A single chat message, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content (already truncated to the input cap).
    pub content: String,
    /// Back-end specific rendering of this message.
    pub shape: serde_json::Value,
}

/// Logical role of text being embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Source content being indexed.
    #[default]
    Document,
    /// A search query.
    Query,
}

impl DocumentType {
    /// Parses a document type (case-insensitive).
    ///
    /// Unknown values map to [`DocumentType::Document`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "query" => Self::Query,
            _ => Self::Document,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text generation request (provider-agnostic).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Generation model identifier.
    pub model: String,
    /// Prior conversation, typically a single system message.
    pub history: Vec<ChatMessage>,
    /// The current user prompt, already truncated. May be empty.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature. Dropped when a back-end rejects it.
    pub temperature: Option<f32>,
}

/// An embedding request for one batch of texts.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedRequest {
    /// Embedding model identifier.
    pub model: String,
    /// Texts to embed, already truncated.
    pub texts: Vec<String>,
    /// Back-end task-type argument derived from [`DocumentType`].
    pub task_type: Option<&'static str>,
    /// Requested output dimensionality.
    pub dimensions: Option<usize>,
}
