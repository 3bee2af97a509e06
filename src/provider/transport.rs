//! Pluggable back-end transport trait.
//!
//! A [`Transport`] performs exactly one outbound call and classifies any
//! failure as a [`TransportError`]. Admission control, retries, and
//! argument stripping live in the provider client, so transports stay thin
//! and tests can script them freely.

use async_trait::async_trait;

use super::message::{ChatRequest, EmbedRequest};
use crate::error::TransportError;

/// Trait for back-end transports.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Transport name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a single chat completion call.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportError`] on any failure.
    async fn chat(&self, request: &ChatRequest) -> Result<String, TransportError>;

    /// Embeds one batch of texts, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportError`] on any failure.
    async fn embed(&self, request: &EmbedRequest) -> Result<Vec<Vec<f32>>, TransportError>;
}

/// A request the retry loop can send and, on rejection, simplify.
#[async_trait]
pub trait TransportRequest: Send + Sync {
    /// Successful result of one call.
    type Output: Send;

    /// Short operation label used in log records.
    fn operation(&self) -> &'static str;

    /// Sends this request through `transport` once.
    ///
    /// # Errors
    ///
    /// Propagates the transport's classified failure.
    async fn send(&self, transport: &dyn Transport) -> Result<Self::Output, TransportError>;

    /// Drops an optional argument the back-end rejected.
    ///
    /// `param` is the name the back-end reported, when it reported one.
    /// Returns `false` when there was nothing left to drop.
    fn strip_argument(&mut self, param: Option<&str>) -> bool;
}

#[async_trait]
impl TransportRequest for ChatRequest {
    type Output = String;

    fn operation(&self) -> &'static str {
        "chat"
    }

    async fn send(&self, transport: &dyn Transport) -> Result<String, TransportError> {
        transport.chat(self).await
    }

    fn strip_argument(&mut self, param: Option<&str>) -> bool {
        match param {
            None | Some("temperature") => self.temperature.take().is_some(),
            Some(_) => false,
        }
    }
}

#[async_trait]
impl TransportRequest for EmbedRequest {
    type Output = Vec<Vec<f32>>;

    fn operation(&self) -> &'static str {
        "embed"
    }

    async fn send(&self, transport: &dyn Transport) -> Result<Vec<Vec<f32>>, TransportError> {
        transport.embed(self).await
    }

    fn strip_argument(&mut self, param: Option<&str>) -> bool {
        match param {
            Some("dimensions") => self.dimensions.take().is_some(),
            Some("task_type" | "input_type") => self.task_type.take().is_some(),
            Some(_) => false,
            None => self.task_type.take().is_some() || self.dimensions.take().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed_request() -> EmbedRequest {
        EmbedRequest {
            model: "m".to_string(),
            texts: vec!["a".to_string()],
            task_type: Some("search_query"),
            dimensions: Some(8),
        }
    }

    #[test]
    fn test_chat_strips_temperature_once() {
        let mut request = ChatRequest {
            model: "m".to_string(),
            history: Vec::new(),
            prompt: "hi".to_string(),
            max_tokens: 10,
            temperature: Some(0.1),
        };
        assert!(request.strip_argument(Some("temperature")));
        assert_eq!(request.temperature, None);
        assert!(!request.strip_argument(None));
    }

    #[test]
    fn test_chat_ignores_foreign_param() {
        let mut request = ChatRequest {
            model: "m".to_string(),
            history: Vec::new(),
            prompt: "hi".to_string(),
            max_tokens: 10,
            temperature: Some(0.1),
        };
        assert!(!request.strip_argument(Some("dimensions")));
        assert_eq!(request.temperature, Some(0.1));
    }

    #[test]
    fn test_embed_strips_named_param() {
        let mut request = embed_request();
        assert!(request.strip_argument(Some("dimensions")));
        assert_eq!(request.dimensions, None);
        assert_eq!(request.task_type, Some("search_query"));
    }

    #[test]
    fn test_embed_unnamed_strip_prefers_task_type() {
        let mut request = embed_request();
        assert!(request.strip_argument(None));
        assert_eq!(request.task_type, None);
        assert_eq!(request.dimensions, Some(8));
        assert!(request.strip_argument(None));
        assert!(!request.strip_argument(None));
    }
}
