//! Final payload shapes and the combinators that build them.
//!
//! Every report owns its data; nothing here borrows from a
//! [`SourceAttempt`](crate::chain::SourceAttempt).

use crate::normalize::{
    HeaderReport, PortStat, ProbeHit, RobotsDirectives, Snapshot, Technology, UrlListSummary,
    merge_technologies, summarize_urls,
};
use crate::query::WaybackMode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Pick between two variants of the same query.
///
/// The larger set wins; on equal size the first (priority) variant is kept.
/// A failed variant loses to a successful one, and when both fail the first
/// error is returned.
pub fn prefer_larger<T, E>(
    first: Result<Vec<T>, E>,
    second: Result<Vec<T>, E>,
) -> Result<Vec<T>, E> {
    match (first, second) {
        (Ok(a), Ok(b)) => Ok(if b.len() > a.len() { b } else { a }),
        (Ok(a), Err(_)) => Ok(a),
        (Err(_), Ok(b)) => Ok(b),
        (Err(e), Err(_)) => Err(e),
    }
}

/// `/api/subdomains` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubdomainReport {
    /// Base domain searched.
    pub domain: String,
    /// Number of hostnames.
    pub total: usize,
    /// Sorted, unique hostnames.
    pub subdomains: Vec<String>,
}

impl SubdomainReport {
    /// Wrap a normalized hostname list.
    pub fn new(domain: impl Into<String>, subdomains: Vec<String>) -> Self {
        Self {
            domain: domain.into(),
            total: subdomains.len(),
            subdomains,
        }
    }
}

/// `/api/wayback` payload in snapshot mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotsReport {
    /// Captures in CDX order.
    pub snapshots: Vec<Snapshot>,
    /// Candidate that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Set when the archive refused the target.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
}

/// `/api/wayback` payload in URL-list mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlListReport {
    /// Archived URLs in upstream order.
    pub urls: Vec<String>,
    /// Directory ranking and classification.
    pub summary: UrlListSummary,
    /// Candidate that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Set when the archive refused the target.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
}

impl UrlListReport {
    /// Build the list view with its summary.
    pub fn new(urls: Vec<String>, top_directories: usize, source: impl Into<String>) -> Self {
        let summary = summarize_urls(&urls, top_directories);
        Self {
            urls,
            summary,
            source: Some(source.into()),
            blocked: false,
        }
    }
}

/// Either Wayback view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WaybackReport {
    /// Capture list.
    Snapshots(SnapshotsReport),
    /// URL list with summary.
    Urls(UrlListReport),
}

impl WaybackReport {
    /// Empty result for a target the archive refuses to serve.
    #[must_use]
    pub fn blocked(mode: WaybackMode) -> Self {
        match mode {
            WaybackMode::Snapshots => Self::Snapshots(SnapshotsReport {
                blocked: true,
                ..SnapshotsReport::default()
            }),
            WaybackMode::Urls => Self::Urls(UrlListReport {
                blocked: true,
                ..UrlListReport::default()
            }),
        }
    }

    /// Whether this is the archive-blocked empty result.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        match self {
            Self::Snapshots(report) => report.blocked,
            Self::Urls(report) => report.blocked,
        }
    }
}

/// `/api/headers` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderAuditReport {
    /// URL requested (after scheme normalization).
    pub url: String,
    /// Status of the final response.
    pub status: u16,
    /// Checklist results.
    pub headers: HeaderReport,
}

/// `/api/techstack` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechReport {
    /// URL inspected.
    pub url: String,
    /// Number of technologies.
    pub total: usize,
    /// Deduplicated guesses, URL heuristics first.
    pub technologies: Vec<Technology>,
    /// Which heuristics contributed.
    pub source: String,
}

impl TechReport {
    /// Merge URL-based guesses with header-based ones, if the HEAD request
    /// succeeded.
    pub fn new(
        url: impl Into<String>,
        platforms: Vec<Technology>,
        from_headers: Option<Vec<Technology>>,
    ) -> Self {
        let source = if from_headers.is_some() { "url+headers" } else { "url" };
        let technologies = merge_technologies(platforms, from_headers.unwrap_or_default());
        Self {
            url: url.into(),
            total: technologies.len(),
            technologies,
            source: source.to_string(),
        }
    }
}

/// Parsed part of the robots payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsParsed {
    /// robots.txt directives.
    pub robots: RobotsDirectives,
    /// `<loc>` entries of sitemap.xml.
    pub sitemap_urls: Vec<String>,
}

/// `/api/robots` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsReport {
    /// Where robots.txt was requested.
    pub robots_url: String,
    /// Where sitemap.xml was requested.
    pub sitemap_url: String,
    /// robots.txt body, `null` when it could not be fetched.
    pub robots: Option<String>,
    /// sitemap.xml body, `null` when it could not be fetched.
    pub sitemap: Option<String>,
    /// Directives and locations extracted from both.
    pub parsed: RobotsParsed,
}

/// `/api/content-discovery` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// `scheme://host[:port]` probed.
    pub origin: String,
    /// Hits in wordlist order.
    pub hits: Vec<ProbeHit>,
}

/// `/api/httpinfo` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpInfoReport {
    /// URL requested.
    pub url: String,
    /// Status of the final response.
    pub status: u16,
    /// Response headers, lowercase names.
    pub headers: BTreeMap<String, String>,
    /// Leading part of the body.
    pub body_sample: String,
}

/// `/api/topports` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPortsReport {
    /// Ports by report volume, highest first.
    pub ports: Vec<PortStat>,
}

/// The first `max` characters of `body`.
pub fn sample_body(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefer_larger() {
        let a: Result<Vec<u8>, &str> = Ok(vec![1]);
        let b: Result<Vec<u8>, &str> = Ok(vec![1, 2]);
        assert_eq!(prefer_larger(a, b).unwrap(), vec![1, 2]);

        let tie = prefer_larger::<u8, &str>(Ok(vec![1]), Ok(vec![2]));
        assert_eq!(tie.unwrap(), vec![1]);

        assert_eq!(prefer_larger::<u8, &str>(Err("x"), Ok(vec![])).unwrap(), Vec::<u8>::new());
        assert_eq!(prefer_larger::<u8, &str>(Ok(vec![3]), Err("y")).unwrap(), vec![3]);
        assert_eq!(prefer_larger::<u8, &str>(Err("x"), Err("y")).unwrap_err(), "x");
    }

    #[test]
    fn test_empty_subdomain_report() {
        let report = SubdomainReport::new("example.com", Vec::new());
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            json!({"domain": "example.com", "total": 0, "subdomains": []})
        );
    }

    #[test]
    fn test_blocked_wayback_shapes() {
        let snaps = WaybackReport::blocked(WaybackMode::Snapshots);
        assert!(snaps.is_blocked());
        assert_eq!(
            serde_json::to_value(&snaps).unwrap(),
            json!({"snapshots": [], "blocked": true})
        );

        let urls = serde_json::to_value(WaybackReport::blocked(WaybackMode::Urls)).unwrap();
        assert_eq!(urls["urls"], json!([]));
        assert_eq!(urls["summary"]["total"], 0);
        assert_eq!(urls["blocked"], true);
    }

    #[test]
    fn test_unblocked_report_omits_flag() {
        let report = WaybackReport::Snapshots(SnapshotsReport {
            snapshots: Vec::new(),
            source: Some("web.archive.org".to_string()),
            blocked: false,
        });
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            json!({"snapshots": [], "source": "web.archive.org"})
        );
    }

    #[test]
    fn test_tech_report_source() {
        let url = "https://x.vercel.app";
        let report = TechReport::new(url, crate::normalize::detect_platforms(url), None);
        assert_eq!(report.source, "url");
        assert_eq!(report.total, 1);
    }

    #[test]
    fn test_sample_body_counts_chars() {
        assert_eq!(sample_body("héllo", 2), "hé");
        assert_eq!(sample_body("hi", 20_000), "hi");
    }
}
