//! Retrieval collaborator.
//!
//! The vector index lives outside this crate. [`Retriever`] is the seam it
//! plugs into; [`FixedRetriever`] serves a static document set, which is
//! enough for the command line and for tests.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A document returned by a search, with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Chunk text.
    pub text: String,
    /// Relevance score; higher is more relevant.
    pub score: f32,
}

/// Name of the vector collection holding a project's chunks.
#[must_use]
pub fn collection_name(project_id: &str) -> String {
    format!("collection_{}", project_id.trim())
}

/// Trait for vector search back-ends.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns up to `limit` documents near `vector`, most relevant first.
    ///
    /// An empty result is a valid "no context" answer.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Search`] if the search itself fails.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

/// Retriever over a fixed, in-memory document set.
///
/// The query vector and collection are ignored; results are the top
/// `limit` documents by descending score.
#[derive(Debug, Clone, Default)]
pub struct FixedRetriever {
    documents: Vec<RetrievedDocument>,
}

impl FixedRetriever {
    /// Creates a retriever over `documents`.
    #[must_use]
    pub fn new(mut documents: Vec<RetrievedDocument>) -> Self {
        documents.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { documents }
    }

    /// Parses a JSON array of `{"text", "score"}` objects.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Fixture`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, RetrievalError> {
        let documents: Vec<RetrievedDocument> =
            serde_json::from_str(json).map_err(|e| RetrievalError::Fixture {
                message: e.to_string(),
            })?;
        Ok(Self::new(documents))
    }

    /// Loads a JSON document fixture from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Fixture`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, RetrievalError> {
        let json = std::fs::read_to_string(path).map_err(|e| RetrievalError::Fixture {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }

    /// Number of documents held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the document set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn search(
        &self,
        _collection: &str,
        _vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        Ok(self.documents.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn doc(text: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("42"), "collection_42");
        assert_eq!(collection_name(" 7 "), "collection_7");
    }

    #[tokio::test]
    async fn test_search_orders_by_score_and_limits() {
        let retriever =
            FixedRetriever::new(vec![doc("low", 0.1), doc("high", 0.9), doc("mid", 0.5)]);
        let results = retriever
            .search("collection_1", &[0.0], 2)
            .await
            .unwrap_or_default();
        let texts: Vec<&str> = results.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn test_empty_retriever_returns_nothing() {
        let retriever = FixedRetriever::default();
        assert!(retriever.is_empty());
        let results = retriever.search("c", &[], 10).await.unwrap_or_default();
        assert!(results.is_empty());
    }

    #[test]
    fn test_from_path_reads_fixture() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|_| unreachable!());
        let written = file.write_all(br#"[{"text": "a", "score": 0.3}, {"text": "b", "score": 0.7}]"#);
        assert!(written.is_ok());
        let retriever = FixedRetriever::from_path(file.path()).unwrap_or_default();
        assert_eq!(retriever.len(), 2);
    }

    #[test]
    fn test_malformed_fixture_is_rejected() {
        assert!(matches!(
            FixedRetriever::from_json("{not json"),
            Err(RetrievalError::Fixture { .. })
        ));
    }
}
