//! Security header checklist.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Headers every audit reports on, lowercase.
pub const SECURITY_HEADERS: [&str; 8] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
    "cross-origin-opener-policy",
    "cross-origin-resource-policy",
];

/// Note for HSTS without a `max-age` directive.
pub const NOTE_HSTS_NO_MAX_AGE: &str = "HSTS present but missing max-age";
/// Note for an absent Content-Security-Policy.
pub const NOTE_NO_CSP: &str = "No CSP; consider a restrictive policy";
/// Note for an absent X-Frame-Options.
pub const NOTE_NO_XFO: &str = "Missing; clickjacking risk";
/// Note for an absent X-Content-Type-Options.
pub const NOTE_NO_XCTO: &str = "Missing; MIME sniffing possible";

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static MAX_AGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)max-age=\d+").unwrap());

/// Presence and value of one checklist header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCheck {
    /// Whether the response carried the header.
    pub present: bool,
    /// Header value, `null` when absent.
    pub value: Option<String>,
    /// Heuristic warning, omitted when there is nothing to say.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Checklist header name to result.
pub type HeaderReport = BTreeMap<String, HeaderCheck>;

/// Audit `headers` (any name case) against [`SECURITY_HEADERS`].
pub fn audit_headers<'a, I>(headers: I) -> HeaderReport
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let lowered: BTreeMap<String, &str> = headers
        .into_iter()
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value))
        .collect();

    SECURITY_HEADERS
        .iter()
        .map(|&name| {
            let value = lowered.get(name).map(|v| v.trim().to_string());
            let note = note_for(name, value.as_deref()).map(ToString::to_string);
            (
                name.to_string(),
                HeaderCheck {
                    present: value.is_some(),
                    value,
                    note,
                },
            )
        })
        .collect()
}

fn note_for(name: &str, value: Option<&str>) -> Option<&'static str> {
    match (name, value) {
        ("strict-transport-security", Some(v)) if !MAX_AGE.is_match(v) => {
            Some(NOTE_HSTS_NO_MAX_AGE)
        },
        ("content-security-policy", None) => Some(NOTE_NO_CSP),
        ("x-frame-options", None) => Some(NOTE_NO_XFO),
        ("x-content-type-options", None) => Some(NOTE_NO_XCTO),
        _ => None,
    }
}
