//! HTTP mapping of recon errors.
//!
//! Every failure leaves as `{"error": "<message>"}`; unparseable upstream
//! payloads also carry a `debug` excerpt of at most 200 characters.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recon_core::Error;
use tracing::{error, warn};

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input (400).
    BadRequest(String),
    /// The archive refused the target (451).
    ArchiveBlocked(String),
    /// An upstream answered something unusable (502).
    BadGateway {
        /// User-facing message.
        message: String,
        /// Excerpt of the offending body.
        debug: Option<String>,
    },
    /// Every source of a fallback chain failed (503).
    Unavailable(String),
    /// Anything else (500).
    Internal(String),
}

impl ApiError {
    /// Mapping for pass-through endpoints, where any upstream failure is a
    /// gateway error rather than an internal one.
    pub fn upstream(err: Error) -> Self {
        match err {
            Error::UpstreamTimeout(_)
            | Error::UpstreamUnavailable(_)
            | Error::UpstreamStatus { .. } => Self::BadGateway {
                message: err.to_string(),
                debug: None,
            },
            other => other.into(),
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ArchiveBlocked(_) => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Self::BadRequest(msg),
            Error::InvalidUrl(_) => Self::BadRequest(err.to_string()),
            Error::ArchiveBlocked => Self::ArchiveBlocked(err.to_string()),
            Error::Unparseable { ref excerpt, .. } => {
                let debug = (!excerpt.is_empty()).then(|| excerpt.clone());
                Self::BadGateway {
                    message: err.to_string(),
                    debug,
                }
            },
            Error::ChainExhausted { ref attempts } => {
                for attempt in attempts {
                    warn!(source = %attempt.source_id, outcome = ?attempt.outcome, "exhausted chain attempt");
                }
                Self::Unavailable(err.to_string())
            },
            other => {
                if other.is_recoverable() {
                    warn!(category = other.category(), error = %other, "transient upstream failure");
                } else {
                    error!(category = other.category(), error = %other, "request failed");
                }
                Self::Internal(other.to_string())
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadGateway {
                message,
                debug: Some(debug),
            } => serde_json::json!({ "error": message, "debug": debug }),
            Self::BadRequest(message)
            | Self::ArchiveBlocked(message)
            | Self::BadGateway { message, .. }
            | Self::Unavailable(message)
            | Self::Internal(message) => serde_json::json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}
