//! Retrieval-augmented answer pipeline.
//!
//! ```text
//! query ─▶ RetrievalGate ─┬─▶ canned answer
//!                         ├─▶ no context ─▶ apology
//!                         └─▶ documents ─▶ templates ─▶ generation ─▶ Sanitizer ─▶ answer
//! ```
//!
//! The vector index and template storage are collaborators behind the
//! [`Retriever`] and [`TemplateSource`] traits.

pub mod answer;
pub mod gate;
pub mod retrieval;
pub mod sanitize;
pub mod template;

pub use answer::{AnswerPipeline, AnswerResult};
pub use gate::{DEFAULT_RETRIEVAL_LIMIT, GateOutcome, PipelineMessages, RetrievalGate};
pub use retrieval::{FixedRetriever, RetrievedDocument, Retriever, collection_name};
pub use sanitize::Sanitizer;
pub use template::{TemplateParser, TemplateSource};
