//! Provider abstraction layer.
//!
//! A [`ProviderClient`] wraps one back-end behind a uniform interface for
//! text generation and embeddings. Each client owns a token-bucket
//! [`RateLimiter`] and a [`RetryPolicy`]; failures reported by the
//! [`Transport`] are classified and either retried with exponential
//! backoff, recovered by stripping an optional argument once, or surfaced.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ ProviderClient ──▶ RateLimiter.acquire ──▶ Transport
//!                 │                                        │
//!                 │◀──── RetryPolicy.decide ◀── TransportError
//!                 │
//!                 └──▶ EmbeddingBatcher (contiguous, paced batches)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ragrelay::provider::{GenerationOptions, ProviderClient, ProviderConfig, ProviderKind};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(transport: Box<dyn ragrelay::provider::Transport>) {
//! let mut client = ProviderClient::new(ProviderKind::OpenAi, ProviderConfig::default())
//!     .with_transport(transport);
//! client.set_generation_model("gpt-4o-mini");
//! let answer = client
//!     .generate_text("Hello", &[], GenerationOptions::default(), &CancellationToken::new())
//!     .await;
//! # }
//! ```

pub mod batcher;
pub mod client;
pub mod config;
pub mod kind;
pub mod message;
pub mod rate_limit;
pub mod retry;
pub mod transport;
pub mod transports;

pub use batcher::EmbeddingBatcher;
pub use client::{GenerationOptions, ProviderClient, create_transport};
pub use config::{ProviderConfig, ProviderConfigBuilder};
pub use kind::ProviderKind;
pub use message::{ChatMessage, ChatRequest, DocumentType, EmbedRequest, Role};
pub use rate_limit::{Clock, RateBucket, RateLimiter, TokioClock};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use transport::{Transport, TransportRequest};
