//! Error types for ragrelay.
//!
//! Each layer owns its error enum. Transport failures are classified into
//! [`TransportError`] variants so the retry loop can act on them without
//! inspecting strings; [`ProviderError`] is the taxonomy seen at the
//! provider client boundary.

use thiserror::Error;

/// Crate-level result alias used by the command-line path.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the binary and command layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider failure that was surfaced instead of absorbed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Invalid or incomplete configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Retrieval collaborator failure.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Command-level failure.
    #[error("{message}")]
    Command {
        /// Human-readable description.
        message: String,
    },
}

/// A single transport call failed, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The back-end refused the call because a quota was exceeded.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Raw message from the back-end.
        message: String,
    },

    /// The back-end rejected an optional request argument.
    #[error("invalid argument{}: {message}", param.as_deref().map(|p| format!(" `{p}`")).unwrap_or_default())]
    InvalidArgument {
        /// Name of the offending parameter, when the back-end reported one.
        param: Option<String>,
        /// Raw message from the back-end.
        message: String,
    },

    /// Network hiccup or server-side failure worth retrying.
    #[error("transient transport failure: {message}")]
    Transient {
        /// Raw message from the back-end.
        message: String,
    },

    /// Any failure that retrying will not fix.
    #[error("transport failure: {message}")]
    Fatal {
        /// Raw message from the back-end.
        message: String,
    },

    /// The call succeeded but carried no usable text or vectors.
    #[error("empty response")]
    EmptyResponse,
}

/// Optional request arguments a back-end may reject.
const STRIPPABLE_PARAMS: &[&str] = &["task_type", "input_type", "dimensions", "temperature"];

impl TransportError {
    /// Classifies a raw failure from its HTTP status (when known) and text.
    ///
    /// Rate limiting wins over everything else, then invalid arguments,
    /// then transient conditions. Unrecognised failures are fatal.
    #[must_use]
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();
        let message = message.to_string();

        if status == Some(429)
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("rate limit")
            || lower.contains("quota")
        {
            return Self::RateLimited { message };
        }

        let param = STRIPPABLE_PARAMS
            .iter()
            .find(|p| lower.contains(*p))
            .map(|p| (*p).to_string());
        let invalid_marker = status == Some(400)
            || lower.contains("invalid argument")
            || lower.contains("unsupported");
        if invalid_marker && param.is_some() {
            return Self::InvalidArgument { param, message };
        }

        if status.is_some_and(|s| (500..600).contains(&s))
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("temporarily")
        {
            return Self::Transient { message };
        }

        Self::Fatal { message }
    }

    /// Returns `true` for failures that indicate a quota was hit.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Failures at the provider client boundary.
///
/// The absorbing client methods turn every variant into an absent result
/// plus a diagnostic log record; the `try_` methods surface them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No transport or no model has been configured.
    #[error("{what} is not configured")]
    NotConfigured {
        /// What is missing (e.g. `"generation model"`).
        what: &'static str,
    },

    /// The transport returned no usable text or vector.
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// Rate limited and not retried further.
    #[error("provider rate limited the request")]
    RateLimited,

    /// An optional argument was rejected and could not be stripped.
    #[error("provider rejected argument {}", param.as_deref().unwrap_or("<unknown>"))]
    InvalidArgument {
        /// Name of the offending parameter, if reported.
        param: Option<String>,
    },

    /// Transient failure that exhausted its recovery.
    #[error("transient transport failure: {message}")]
    Transport {
        /// Transport message.
        message: String,
    },

    /// Non-retryable transport failure.
    #[error("fatal transport failure: {message}")]
    FatalTransport {
        /// Transport message.
        message: String,
    },

    /// Retry budget exhausted.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of transport attempts made.
        attempts: u32,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// No built-in transport exists for the requested back-end.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Back-end name.
        name: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value is out of range.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// No API key was provided for a back-end that needs one.
    #[error("API key missing (set OPENAI_API_KEY)")]
    ApiKeyMissing,

    /// The back-end name is not recognised.
    #[error("unknown provider: {name}")]
    UnknownProvider {
        /// The rejected name.
        name: String,
    },
}

/// Retrieval collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// The search itself failed.
    #[error("search failed: {message}")]
    Search {
        /// Failure description.
        message: String,
    },

    /// A document fixture could not be loaded.
    #[error("failed to load documents: {message}")]
    Fixture {
        /// Failure description.
        message: String,
    },
}
