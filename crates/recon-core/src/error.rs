//! Error types and handling for recon-core operations.
//!
//! Every stage of a reconnaissance query has its own narrow failure type
//! ([`FetchError`](crate::fetcher::FetchError),
//! [`NormalizeError`](crate::recovery::NormalizeError),
//! [`ChainError`](crate::chain::ChainError)). They all convert into the
//! crate-wide [`Error`], which is what orchestration code and the HTTP layer
//! work with.
//!
//! ## Error Categories
//!
//! - **Validation**: missing or malformed caller input
//! - **Upstream**: timeouts, unreachable sources, unexpected statuses
//! - **Parse**: payloads that could not be recovered into a known schema
//! - **Archive**: the archive refused to serve the target (HTTP 451)
//! - **Configuration**: unreadable or invalid config files
//!
//! ```rust
//! use recon_core::Error;
//!
//! let err = Error::Validation("Missing domain".to_string());
//! assert_eq!(err.category(), "validation");
//! assert!(!err.is_recoverable());
//! ```

use crate::chain::SourceAttempt;
use thiserror::Error;

/// Longest body excerpt carried by parse failures.
pub const EXCERPT_CHARS: usize = 200;

/// The main error type for recon-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input was missing or malformed.
    ///
    /// The message is user-facing, e.g. `Missing domain`.
    #[error("{0}")]
    Validation(String),

    /// A URL or hostname could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An upstream call exceeded its time budget and was cancelled.
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// An upstream could not be reached or refused the request.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An upstream answered with a status the caller treats as fatal.
    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus {
        /// HTTP status code returned.
        status: u16,
        /// URL that was requested.
        url: String,
    },

    /// The payload could not be recovered into the expected shape.
    ///
    /// `excerpt` holds at most [`EXCERPT_CHARS`] characters of the raw body
    /// for diagnostics.
    #[error("Unparseable upstream response: {reason}")]
    Unparseable {
        /// Why parsing failed.
        reason: String,
        /// Leading part of the raw body.
        excerpt: String,
    },

    /// The archive reported the target as blocked (HTTP 451).
    #[error("Archive blocked for this target")]
    ArchiveBlocked,

    /// Every candidate of a fallback chain failed.
    #[error("All sources failed ({} attempted)", attempts.len())]
    ChainExhausted {
        /// What was tried and why each attempt failed.
        attempts: Vec<SourceAttempt>,
    },

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if retrying the same query later might succeed.
    ///
    /// Timeouts, unreachable upstreams, exhausted chains and 429/5xx
    /// statuses are transient; everything else is a property of the input
    /// or the payload.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UpstreamTimeout(_)
            | Self::UpstreamUnavailable(_)
            | Self::ChainExhausted { .. } => true,
            Self::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidUrl(_) => "invalid_url",
            Self::UpstreamTimeout(_) => "timeout",
            Self::UpstreamUnavailable(_) | Self::UpstreamStatus { .. } => "upstream",
            Self::Unparseable { .. } => "parse",
            Self::ArchiveBlocked => "archive_blocked",
            Self::ChainExhausted { .. } => "exhausted",
            Self::Config(_) => "config",
        }
    }
}

/// Truncate a body to [`EXCERPT_CHARS`] characters on a char boundary.
pub fn excerpt(body: &str) -> String {
    body.chars().take(EXCERPT_CHARS).collect()
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
