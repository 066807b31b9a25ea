//! Query model and target normalization.
//!
//! A [`Query`] is built once per incoming request and never mutated. The
//! helpers here turn whatever the caller typed (a bare domain, a URL
//! without scheme, a URL with port and path) into the forms upstreams
//! expect.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use url::Url;

/// The kind of reconnaissance a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    /// Certificate transparency subdomain enumeration.
    SubdomainEnum,
    /// Wayback Machine capture list.
    WaybackSnapshot,
    /// Wayback Machine archived URL list with summary.
    WaybackUrlList,
    /// DNS-over-HTTPS lookup.
    DnsLookup,
    /// Security header audit of the target.
    HeaderAudit,
    /// SSL Labs grade.
    TlsGrade,
    /// Hosting/technology guesses.
    TechFingerprint,
    /// robots.txt and sitemap.xml retrieval.
    RobotsFetch,
    /// Fixed-wordlist path probe.
    ContentProbe,
    /// ip-api ASN/geo lookup.
    AsnLookup,
    /// Raw status, headers and body sample of the target.
    HttpInfo,
    /// ISC/DShield most-reported ports.
    TopPorts,
    /// GreyNoise community IP classification.
    IpReputation,
}

impl QueryKind {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubdomainEnum => "subdomain-enum",
            Self::WaybackSnapshot => "wayback-snapshot",
            Self::WaybackUrlList => "wayback-url-list",
            Self::DnsLookup => "dns-lookup",
            Self::HeaderAudit => "header-audit",
            Self::TlsGrade => "tls-grade",
            Self::TechFingerprint => "tech-fingerprint",
            Self::RobotsFetch => "robots-fetch",
            Self::ContentProbe => "content-probe",
            Self::AsnLookup => "asn-lookup",
            Self::HttpInfo => "httpinfo",
            Self::TopPorts => "top-ports",
            Self::IpReputation => "ip-reputation",
        }
    }

    /// Name of the query parameter carrying the target, if one is required.
    #[must_use]
    pub const fn required_param(self) -> Option<&'static str> {
        match self {
            Self::SubdomainEnum => Some("domain"),
            Self::WaybackSnapshot
            | Self::WaybackUrlList
            | Self::HeaderAudit
            | Self::TechFingerprint
            | Self::RobotsFetch
            | Self::ContentProbe
            | Self::HttpInfo => Some("url"),
            Self::DnsLookup => Some("name"),
            Self::TlsGrade => Some("host"),
            Self::AsnLookup => Some("target"),
            Self::IpReputation => Some("ip"),
            Self::TopPorts => None,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which view of the Wayback index to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaybackMode {
    /// Individual captures of one URL.
    #[default]
    Snapshots,
    /// Distinct archived URLs under a domain.
    Urls,
}

impl WaybackMode {
    /// Parse the `mode` parameter; anything but `urls` means snapshots.
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("urls") => Self::Urls,
            _ => Self::Snapshots,
        }
    }
}

/// Kind-specific parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// DNS record type (`A`, `AAAA`, `MX`, ...).
    pub record_type: Option<String>,
    /// Wayback view.
    pub mode: WaybackMode,
    /// Result cap requested by the caller.
    pub limit: Option<u32>,
}

/// One validated reconnaissance request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    kind: QueryKind,
    target: String,
    options: QueryOptions,
}

impl Query {
    /// Build a query, rejecting a blank target for kinds that need one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with `Missing <field>` when the target
    /// is required and blank.
    pub fn new(kind: QueryKind, target: Option<&str>, options: QueryOptions) -> Result<Self> {
        let target = target.map(str::trim).unwrap_or_default();
        if let Some(field) = kind.required_param() {
            if target.is_empty() {
                return Err(missing(field));
            }
        }
        Ok(Self {
            kind,
            target: target.to_string(),
            options,
        })
    }

    /// What is being asked for.
    #[must_use]
    pub const fn kind(&self) -> QueryKind {
        self.kind
    }

    /// The trimmed target as supplied.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Kind-specific parameters.
    #[must_use]
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// The target as an absolute URL (`https://` added when missing).
    #[must_use]
    pub fn target_url(&self) -> String {
        ensure_scheme(&self.target)
    }

    /// The target reduced to a bare hostname.
    #[must_use]
    pub fn target_domain(&self) -> String {
        to_domain(&self.target)
    }
}

/// The fixed-shape validation error for an absent parameter.
pub fn missing(field: &str) -> Error {
    Error::Validation(format!("Missing {field}"))
}

/// Prefix `https://` unless the input already carries an http(s) scheme.
///
/// ```
/// use recon_core::query::ensure_scheme;
///
/// assert_eq!(ensure_scheme("example.com"), "https://example.com");
/// assert_eq!(ensure_scheme("http://example.com/a"), "http://example.com/a");
/// ```
pub fn ensure_scheme(input: &str) -> String {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Reduce a URL or domain-ish string to its lowercase hostname.
///
/// Strips scheme, userinfo, path, query, fragment, port and trailing dots.
/// Applying it twice gives the same result as applying it once.
///
/// ```
/// use recon_core::query::to_domain;
///
/// assert_eq!(to_domain("https://User@Sub.Example.com:8443/a?b#c"), "sub.example.com");
/// assert_eq!(to_domain("example.com."), "example.com");
/// ```
pub fn to_domain(input: &str) -> String {
    let mut rest = input.trim();

    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
    }
    if let Some(idx) = rest.find(['/', '?', '#']) {
        rest = &rest[..idx];
    }
    if let Some(idx) = rest.rfind('@') {
        rest = &rest[idx + 1..];
    }

    // A bare IPv6 address has colons but no port.
    let host = if rest.starts_with('[') {
        rest.find(']').map_or(rest, |end| &rest[..=end])
    } else if rest.parse::<Ipv6Addr>().is_ok() {
        rest
    } else if let Some(idx) = rest.find(':') {
        &rest[..idx]
    } else {
        rest
    };

    host.trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_lowercase()
}

/// `scheme://host[:port]` of a URL or bare domain.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] when the input cannot be parsed or has no
/// host.
pub fn origin_of(input: &str) -> Result<String> {
    let parsed = parse_target(input)?;
    Ok(parsed.origin().ascii_serialization())
}

/// Parse a caller-supplied target into a URL, adding `https://` if needed.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] when the input cannot be parsed or has no
/// host.
pub fn parse_target(input: &str) -> Result<Url> {
    let with_scheme = ensure_scheme(input);
    let parsed = Url::parse(&with_scheme).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(input.to_string()));
    }
    Ok(parsed)
}
