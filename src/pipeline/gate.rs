//! Canned answers and retrieval gating.
//!
//! [`RetrievalGate`] decides, before any generation, whether a query is
//! answered from the canned map, has no retrievable context, or proceeds
//! with documents.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retrieval::{RetrievedDocument, Retriever};
use crate::provider::{DocumentType, ProviderClient};

/// Default number of documents requested from the retriever.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 10;

const AR_IDENTITY: &str = "أنا مساعد طلاب ومتدربين المعهد السعودي العالي المتخصص للتدريب، هنا لمساعدتك ومعلوماتك عن برامج المعهد.";
const AR_APOLOGY: &str = "عذراً، لا توجد لدي معلومات كافية عن هذا الموضوع. يرجى التواصل مع المعهد السعودي العالي للحصول على مزيد من المعلومات.";
const EN_IDENTITY: &str = "I am the assistant for students and trainees of the Saudi Higher Institute for Specialized Training, here to help you with information about the institute's programs.";
const EN_APOLOGY: &str = "Sorry, I do not have enough information about this topic. Please contact the Saudi Higher Institute for more information.";

/// User-facing fixed texts for one working language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineMessages {
    /// Reply when no trustworthy answer can be produced.
    pub apology: String,
    /// Lowercase query fragments and their fixed answers, checked in order.
    pub canned: Vec<(String, String)>,
}

impl PipelineMessages {
    /// Arabic texts.
    #[must_use]
    pub fn arabic() -> Self {
        Self {
            apology: AR_APOLOGY.to_string(),
            canned: ["من أنت", "من انت", "عرف نفسك"]
                .iter()
                .map(|q| ((*q).to_string(), AR_IDENTITY.to_string()))
                .collect(),
        }
    }

    /// English texts.
    #[must_use]
    pub fn english() -> Self {
        Self {
            apology: EN_APOLOGY.to_string(),
            canned: ["who are you", "introduce yourself"]
                .iter()
                .map(|q| ((*q).to_string(), EN_IDENTITY.to_string()))
                .collect(),
        }
    }

    /// Texts for a language code; anything but `en` gets Arabic.
    #[must_use]
    pub fn for_language(language: &str) -> Self {
        if language.trim().eq_ignore_ascii_case("en") {
            Self::english()
        } else {
            Self::arabic()
        }
    }
}

impl Default for PipelineMessages {
    fn default() -> Self {
        Self::arabic()
    }
}

/// Result of gating a query.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The query matched a canned fragment.
    Canned(String),
    /// Documents to ground the answer on, most relevant first.
    Documents(Vec<RetrievedDocument>),
    /// Nothing to ground an answer on.
    NoContext,
}

/// Short-circuits canned queries and fetches context for the rest.
#[derive(Debug, Clone)]
pub struct RetrievalGate {
    canned: Vec<(String, String)>,
    limit: usize,
}

impl RetrievalGate {
    /// Creates a gate using the canned map from `messages`.
    #[must_use]
    pub fn new(messages: &PipelineMessages) -> Self {
        Self {
            canned: messages
                .canned
                .iter()
                .map(|(q, a)| (q.to_lowercase(), a.clone()))
                .collect(),
            limit: DEFAULT_RETRIEVAL_LIMIT,
        }
    }

    /// Sets how many documents to request.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Documents requested per query.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Canned answer for `query`, matched as a lowercase substring.
    #[must_use]
    pub fn canned_answer(&self, query: &str) -> Option<&str> {
        let lower = query.to_lowercase();
        self.canned
            .iter()
            .find(|(fragment, _)| lower.contains(fragment.as_str()))
            .map(|(_, answer)| answer.as_str())
    }

    /// Resolves `query` to canned text, documents, or no context.
    ///
    /// Retrieval failures are logged and treated as no context.
    pub async fn resolve(
        &self,
        query: &str,
        collection: &str,
        embedder: &ProviderClient,
        retriever: &dyn Retriever,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        if let Some(answer) = self.canned_answer(query) {
            debug!("query matched a canned answer");
            return GateOutcome::Canned(answer.to_string());
        }

        let vector = match embedder.embed_text(query, DocumentType::Query, cancel).await {
            Some(v) if !v.is_empty() => v,
            _ => {
                debug!("query could not be embedded");
                return GateOutcome::NoContext;
            }
        };

        match retriever.search(collection, &vector, self.limit).await {
            Ok(documents) if documents.is_empty() => {
                debug!(collection, "retrieval returned no documents");
                GateOutcome::NoContext
            }
            Ok(documents) => {
                debug!(collection, documents = documents.len(), "retrieved context");
                GateOutcome::Documents(documents)
            }
            Err(e) => {
                warn!(collection, error = %e, "retrieval failed");
                GateOutcome::NoContext
            }
        }
    }
}

impl Default for RetrievalGate {
    fn default() -> Self {
        Self::new(&PipelineMessages::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("من أنت؟" ; "plain")]
    #[test_case("مرحبا، من أنت يا صديقي" ; "inside sentence")]
    #[test_case("عرف نفسك من فضلك" ; "introduce yourself")]
    fn test_arabic_identity_queries_are_canned(query: &str) {
        let gate = RetrievalGate::default();
        assert_eq!(gate.canned_answer(query), Some(AR_IDENTITY));
    }

    #[test]
    fn test_english_match_ignores_case() {
        let gate = RetrievalGate::new(&PipelineMessages::english());
        assert_eq!(gate.canned_answer("Hey, WHO ARE YOU?"), Some(EN_IDENTITY));
        assert_eq!(gate.canned_answer("what are the fees?"), None);
    }

    #[test]
    fn test_messages_for_language() {
        assert_eq!(PipelineMessages::for_language("EN"), PipelineMessages::english());
        assert_eq!(PipelineMessages::for_language("ar"), PipelineMessages::arabic());
        assert_eq!(PipelineMessages::default().apology, AR_APOLOGY);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(RetrievalGate::default().limit(), 10);
        assert_eq!(RetrievalGate::default().with_limit(3).limit(), 3);
    }
}
