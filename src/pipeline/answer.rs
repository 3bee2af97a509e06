//! Retrieval-augmented answer construction.
//!
//! [`AnswerPipeline::answer`] runs gate → prompt building → generation →
//! sanitizing and always returns an [`AnswerResult`]. Failures anywhere
//! along the way end in the apology text, never an error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::gate::{GateOutcome, PipelineMessages, RetrievalGate};
use super::retrieval::{RetrievedDocument, Retriever};
use super::sanitize::Sanitizer;
use super::template::TemplateSource;
use crate::provider::{ChatMessage, GenerationOptions, ProviderClient, Role};

/// Template group holding the RAG prompts.
const RAG_GROUP: &str = "rag";

/// Final output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    /// The answer; `None` when generation produced nothing.
    pub answer: Option<String>,
    /// Prompt sent for generation; empty when generation was skipped.
    pub full_prompt: String,
    /// History sent with the prompt; empty when generation was skipped.
    pub chat_history: Vec<ChatMessage>,
}

impl AnswerResult {
    /// A fixed answer with no prompt and no history.
    #[must_use]
    pub fn fixed(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            full_prompt: String::new(),
            chat_history: Vec::new(),
        }
    }
}

/// Prompt text assembled from templates.
struct Prompt {
    system: String,
    full: String,
}

/// Orchestrates retrieval, templating, generation and sanitizing.
pub struct AnswerPipeline {
    generation: Arc<ProviderClient>,
    embedding: Arc<ProviderClient>,
    retriever: Arc<dyn Retriever>,
    templates: Arc<dyn TemplateSource>,
    gate: RetrievalGate,
    sanitizer: Sanitizer,
    messages: PipelineMessages,
    options: GenerationOptions,
}

impl AnswerPipeline {
    /// Creates a pipeline with Arabic messages and the default retrieval limit.
    #[must_use]
    pub fn new(
        generation: Arc<ProviderClient>,
        embedding: Arc<ProviderClient>,
        retriever: Arc<dyn Retriever>,
        templates: Arc<dyn TemplateSource>,
    ) -> Self {
        let messages = PipelineMessages::default();
        Self {
            generation,
            embedding,
            retriever,
            templates,
            gate: RetrievalGate::new(&messages),
            sanitizer: Sanitizer::new(messages.apology.clone()),
            messages,
            options: GenerationOptions::default(),
        }
    }

    /// Replaces the fixed texts; the gate and sanitizer follow them.
    ///
    /// The sanitizer keeps its other settings, so builder order does not matter.
    #[must_use]
    pub fn with_messages(mut self, messages: PipelineMessages) -> Self {
        let limit = self.gate.limit();
        self.gate = RetrievalGate::new(&messages).with_limit(limit);
        self.sanitizer = self.sanitizer.with_apology(messages.apology.clone());
        self.messages = messages;
        self
    }

    /// Sets how many documents to retrieve.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.gate = self.gate.with_limit(limit);
        self
    }

    /// Replaces the sanitizer, e.g. to add a script guard.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Sets per-call generation overrides.
    #[must_use]
    pub const fn with_generation_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Answers `query` against `collection`.
    pub async fn answer(
        &self,
        collection: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> AnswerResult {
        let documents = match self
            .gate
            .resolve(
                query,
                collection,
                &self.embedding,
                self.retriever.as_ref(),
                cancel,
            )
            .await
        {
            GateOutcome::Canned(answer) => return AnswerResult::fixed(answer),
            GateOutcome::NoContext => return self.apology(),
            GateOutcome::Documents(documents) => documents,
        };

        let Some(prompt) = self.build_prompt(query, &documents) else {
            error!(group = RAG_GROUP, "prompt templates are missing");
            return self.apology();
        };
        let chat_history = vec![self.generation.construct_prompt(&prompt.system, Role::System)];
        debug!(documents = documents.len(), prompt_chars = prompt.full.chars().count(), "generating answer");

        let Some(raw) = self
            .generation
            .generate_text(&prompt.full, &chat_history, self.options, cancel)
            .await
        else {
            return AnswerResult {
                answer: None,
                full_prompt: prompt.full,
                chat_history,
            };
        };

        match self.sanitizer.clean(&raw) {
            Some(answer) => AnswerResult {
                answer: Some(answer),
                full_prompt: prompt.full,
                chat_history,
            },
            None => self.apology(),
        }
    }

    fn apology(&self) -> AnswerResult {
        AnswerResult::fixed(self.messages.apology.clone())
    }

    fn build_prompt(&self, query: &str, documents: &[RetrievedDocument]) -> Option<Prompt> {
        let system = self
            .templates
            .render(RAG_GROUP, "system_prompt", &HashMap::new())?;

        let fragments = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let vars = HashMap::from([
                    ("doc_num".to_string(), (i + 1).to_string()),
                    ("chunk_text".to_string(), doc.text.clone()),
                ]);
                self.templates.render(RAG_GROUP, "document_prompt", &vars)
            })
            .collect::<Option<Vec<_>>>()?;

        let footer = self.templates.render(
            RAG_GROUP,
            "footer_prompt",
            &HashMap::from([("query".to_string(), query.to_string())]),
        )?;

        Some(Prompt {
            system,
            full: format!("{}\n\n{footer}", fragments.join("\n")),
        })
    }
}

impl std::fmt::Debug for AnswerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerPipeline")
            .field("generation", &self.generation.kind())
            .field("embedding", &self.embedding.kind())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
