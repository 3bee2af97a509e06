//! # ragrelay
//!
//! A provider layer for text generation and embeddings that stays inside
//! back-end quotas, plus a retrieval-augmented answer pipeline built on it.
//!
//! ## Layers
//!
//! - [`provider`]: token-bucket rate limiting, retry with exponential
//!   backoff and jitter, one-shot stripping of rejected optional arguments,
//!   and order-preserving embedding batches behind a pluggable
//!   [`Transport`](provider::Transport).
//! - [`pipeline`]: canned answers, retrieval gating, templated prompts,
//!   generation and sanitizing of leaked document markers.
//! - [`settings`]: process-wide back-end, model and language selection.
//!
//! ## Example
//!
//! ```
//! use ragrelay::pipeline::Sanitizer;
//!
//! let sanitizer = Sanitizer::new("sorry");
//! let answer = sanitizer.sanitize("## Document No: 1\nThe fee is 500.");
//! assert_eq!(answer, "The fee is 500.");
//! ```

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod settings;

pub use error::{ConfigError, Error, ProviderError, Result, RetrievalError, TransportError};
pub use pipeline::{AnswerPipeline, AnswerResult, Sanitizer, TemplateParser};
pub use provider::{GenerationOptions, ProviderClient, ProviderConfig, ProviderKind};
pub use settings::Settings;
