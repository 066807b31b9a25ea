//! SSL Labs analyze responses and the polling state machine.
//!
//! ```text
//! Requested ──DNS / IN_PROGRESS──▶ InProgress ──READY──▶ Ready
//!     │                              │    ▲
//!     │                              └────┘ DNS / IN_PROGRESS (budgeted)
//!     └──────────── ERROR / unknown ─────────────▶ Error
//! ```
//!
//! Ready and Error are terminal. The caller stops polling when the budget
//! runs out and returns whatever the last response said.

use crate::recovery::{NormalizeError, recover_json};
use serde::Deserialize;
use serde_json::Value;

/// Upstream `status` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsStatus {
    /// Resolving the host.
    Dns,
    /// Assessment running.
    InProgress,
    /// Assessment finished.
    Ready,
    /// Assessment failed, or a status this code does not know.
    Error,
}

impl TlsStatus {
    /// Map the upstream string.
    #[must_use]
    pub fn from_upstream(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "DNS" => Self::Dns,
            "IN_PROGRESS" => Self::InProgress,
            "READY" => Self::Ready,
            _ => Self::Error,
        }
    }
}

/// Where a grading request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPollState {
    /// No response seen yet.
    Requested,
    /// Upstream still working.
    InProgress,
    /// Final result available.
    Ready,
    /// Upstream gave up or answered something unexpected.
    Error,
}

impl TlsPollState {
    /// Next state given the latest upstream status.
    #[must_use]
    pub const fn transition(self, status: TlsStatus) -> Self {
        match (self, status) {
            (Self::Ready, _) => Self::Ready,
            (Self::Error, _) => Self::Error,
            (_, TlsStatus::Dns | TlsStatus::InProgress) => Self::InProgress,
            (_, TlsStatus::Ready) => Self::Ready,
            (_, TlsStatus::Error) => Self::Error,
        }
    }

    /// Whether another poll could change the outcome.
    #[must_use]
    pub const fn wants_poll(self) -> bool {
        matches!(self, Self::Requested | Self::InProgress)
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeEnvelope {
    #[serde(default)]
    status: Option<String>,
}

/// Parse one analyze response into its status and the raw JSON document.
///
/// A document without `status` is treated as [`TlsStatus::Error`].
pub fn parse_analyze(body: &str) -> Result<(TlsStatus, Value), NormalizeError> {
    let value: Value = recover_json(body)?;
    if !value.is_object() {
        return Err(NormalizeError::Rejected(
            "analyze response is not an object".to_string(),
        ));
    }
    let envelope: AnalyzeEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| NormalizeError::unparseable(e.to_string(), body))?;
    let status = envelope
        .status
        .as_deref()
        .map_or(TlsStatus::Error, TlsStatus::from_upstream);
    Ok((status, value))
}
