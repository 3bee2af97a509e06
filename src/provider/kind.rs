//! Back-end variants and their vocabularies.
//!
//! Each back-end names roles, shapes messages, and labels embedding tasks
//! differently. The variant is chosen once when a client is built; the
//! client never inspects the transport at call time.

use serde::{Deserialize, Serialize};

use super::message::{DocumentType, Role};
use crate::error::ConfigError;

/// Supported back-end variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `OpenAI` and compatible APIs.
    OpenAi,
    /// Cohere.
    Cohere,
    /// Google Gemini.
    Google,
}

impl ProviderKind {
    /// Parses a back-end name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProvider`] for unrecognised names.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "cohere" => Ok(Self::Cohere),
            "google" | "gemini" => Ok(Self::Google),
            other => Err(ConfigError::UnknownProvider {
                name: other.to_string(),
            }),
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Cohere => "cohere",
            Self::Google => "google",
        }
    }

    /// Role name as the back-end spells it.
    ///
    /// Google has no system role, so system text travels as a user turn.
    #[must_use]
    pub const fn role_name(self, role: Role) -> &'static str {
        match (self, role) {
            (Self::OpenAi, Role::System) => "system",
            (Self::OpenAi | Self::Google, Role::User) | (Self::Google, Role::System) => "user",
            (Self::OpenAi, Role::Assistant) => "assistant",
            (Self::Cohere, Role::System) => "SYSTEM",
            (Self::Cohere, Role::User) => "USER",
            (Self::Cohere, Role::Assistant) => "CHATBOT",
            (Self::Google, Role::Assistant) => "model",
        }
    }

    /// Task-type argument for an embedding call, if the back-end has one.
    #[must_use]
    pub const fn task_type(self, document_type: DocumentType) -> Option<&'static str> {
        match (self, document_type) {
            (Self::OpenAi, _) => None,
            (Self::Cohere, DocumentType::Document) => Some("search_document"),
            (Self::Cohere, DocumentType::Query) => Some("search_query"),
            (Self::Google, DocumentType::Document) => Some("RETRIEVAL_DOCUMENT"),
            (Self::Google, DocumentType::Query) => Some("RETRIEVAL_QUERY"),
        }
    }

    /// Default number of texts per embedding call.
    #[must_use]
    pub const fn default_batch_size(self) -> usize {
        match self {
            Self::OpenAi | Self::Cohere => 10,
            Self::Google => 5,
        }
    }

    /// Renders a message in the back-end's native JSON shape.
    #[must_use]
    pub fn message_shape(self, role: Role, content: &str) -> serde_json::Value {
        let role = self.role_name(role);
        match self {
            Self::OpenAi => serde_json::json!({ "role": role, "content": content }),
            Self::Cohere => serde_json::json!({ "role": role, "text": content }),
            Self::Google => serde_json::json!({ "role": role, "parts": [{ "text": content }] }),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
