//! Best-effort structured-data recovery from untrusted text payloads.
//!
//! Relay proxies wrap upstream JSON in markdown, HTML shells or banner
//! text. Rather than sprinkling fallbacks through every normalizer, a body
//! is run through an ordered list of [`Strategy`] values; the first one that
//! yields a value of the requested type wins.
//!
//! ```
//! use recon_core::recovery::recover_json;
//!
//! let wrapped = "Title: cdx\n\nMarkdown Content:\n[[\"original\"],[\"https://a.example/\"]]\n";
//! let rows: Vec<Vec<String>> = recover_json(wrapped).unwrap();
//! assert_eq!(rows.len(), 2);
//! ```

use crate::error::{Error, excerpt};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Why a payload could not be turned into the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// No strategy produced a value.
    #[error("unparseable payload: {reason}")]
    Unparseable {
        /// Last strategy failure.
        reason: String,
        /// At most 200 characters of the body.
        excerpt: String,
    },
    /// The body parsed but is not what this source returns (HTML shell,
    /// error object, rate-limit page).
    #[error("rejected payload: {0}")]
    Rejected(String),
}

impl NormalizeError {
    /// Build an [`NormalizeError::Unparseable`] carrying a body excerpt.
    pub fn unparseable(reason: impl Into<String>, body: &str) -> Self {
        Self::Unparseable {
            reason: reason.into(),
            excerpt: excerpt(body),
        }
    }
}

impl From<NormalizeError> for Error {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Unparseable { reason, excerpt } => {
                Self::Unparseable { reason, excerpt }
            },
            NormalizeError::Rejected(reason) => Self::Unparseable {
                reason,
                excerpt: String::new(),
            },
        }
    }
}

/// One way of finding JSON inside a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The whole (trimmed) body is JSON.
    StrictJson,
    /// The outermost `[[ … ]]` span (CDX tables inside wrappers).
    NestedArrayScan,
    /// The outermost `[ … ]` span.
    ArrayScan,
    /// The outermost `{ … }` span.
    ObjectScan,
}

/// Strategies tried by [`recover_json`], in order.
pub const DEFAULT_STRATEGIES: [Strategy; 4] = [
    Strategy::StrictJson,
    Strategy::NestedArrayScan,
    Strategy::ArrayScan,
    Strategy::ObjectScan,
];

impl Strategy {
    /// Try to produce a `T` from `body`.
    pub fn apply<T: DeserializeOwned>(self, body: &str) -> Result<T, NormalizeError> {
        let candidate = match self {
            Self::StrictJson => Some(body.trim()),
            Self::NestedArrayScan => span(body, "[[", "]]"),
            Self::ArrayScan => span(body, "[", "]"),
            Self::ObjectScan => span(body, "{", "}"),
        };
        let Some(candidate) = candidate else {
            return Err(NormalizeError::unparseable(
                format!("{self:?}: no candidate span"),
                body,
            ));
        };
        serde_json::from_str(candidate)
            .map_err(|e| NormalizeError::unparseable(format!("{self:?}: {e}"), body))
    }
}

/// Run [`DEFAULT_STRATEGIES`] over `body`.
pub fn recover_json<T: DeserializeOwned>(body: &str) -> Result<T, NormalizeError> {
    recover_with(body, &DEFAULT_STRATEGIES)
}

/// Run the given strategies in order, returning the first success.
pub fn recover_with<T: DeserializeOwned>(
    body: &str,
    strategies: &[Strategy],
) -> Result<T, NormalizeError> {
    let mut last = NormalizeError::unparseable("no strategies", body);
    for strategy in strategies {
        match strategy.apply(body) {
            Ok(value) => {
                if *strategy != Strategy::StrictJson {
                    tracing::debug!(?strategy, "recovered JSON from wrapped payload");
                }
                return Ok(value);
            },
            Err(err) => last = err,
        }
    }
    Err(last)
}

/// Cheap check run before parsing: a JSON source never answers with markup.
pub fn looks_like_json(body: &str) -> bool {
    let trimmed = body.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with('<')
}

fn span<'a>(body: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    (end >= start).then(|| &body[start..end + close.len()])
}
