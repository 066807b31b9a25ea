//! Ordered fallback over a direct source and relay proxies.
//!
//! A [`FallbackChain`] is built once from configuration (the proxy list is
//! injected, never global) and executed per query:
//!
//! 1. The direct source is tried first, then each proxy in listed order.
//! 2. Each candidate is tried at most once.
//! 3. A candidate fails on network error, timeout, non-2xx status, a body
//!    that fails the [`Expect`] heuristic, or a normalizer error; the
//!    failure is logged and the next candidate is tried.
//! 4. The first candidate whose body normalizes wins.
//! 5. HTTP 451 from the direct source ends the chain at once: a relay
//!    cannot unblock an archive. A relay answering 451 is an ordinary
//!    failed attempt.

use crate::config::{ENCODED_URL_PLACEHOLDER, URL_PLACEHOLDER};
use crate::error::Error;
use crate::fetcher::{FetchOptions, Fetcher};
use crate::recovery::{NormalizeError, looks_like_json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Status an archive uses to refuse a target.
pub const STATUS_BLOCKED: u16 = 451;

/// A relay URL template containing `{url}` or `{url_encoded}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTemplate {
    template: String,
}

impl ProxyTemplate {
    /// Wrap a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The relay URL that fetches `target`.
    #[must_use]
    pub fn expand(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        self.template
            .replace(ENCODED_URL_PLACEHOLDER, &encoded)
            .replace(URL_PLACEHOLDER, target)
    }

    /// Identifier used in attempt logs: the relay host, or the raw template.
    #[must_use]
    pub fn source_id(&self) -> String {
        let probe = self
            .template
            .replace(ENCODED_URL_PLACEHOLDER, "")
            .replace(URL_PLACEHOLDER, "");
        url::Url::parse(&probe)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string))
            .unwrap_or_else(|| self.template.clone())
    }
}

/// One source to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Identifier used in logs and attempt records.
    pub source_id: String,
    /// Fully built request URL.
    pub url: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl Candidate {
    /// A candidate without extra headers.
    pub fn new(source_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }
}

/// Shape a candidate body must have before it reaches the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Non-empty and not markup.
    Json,
    /// Not markup; an empty body is handed to the normalizer.
    JsonOrEmpty,
}

impl Expect {
    fn accepts(self, body: &str) -> bool {
        match self {
            Self::Json => looks_like_json(body),
            Self::JsonOrEmpty => body.trim().is_empty() || looks_like_json(body),
        }
    }
}

/// Record of one candidate tried during a chain execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttempt {
    /// Candidate identifier.
    pub source_id: String,
    /// Requested URL.
    pub url: String,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// How it ended.
    pub outcome: AttemptOutcome,
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum AttemptOutcome {
    /// The body normalized.
    #[serde(rename_all = "camelCase")]
    Success {
        /// Status returned.
        http_status: u16,
        /// Size of the raw body.
        body_bytes: usize,
    },
    /// The candidate was unusable.
    #[serde(rename_all = "camelCase")]
    Failure {
        /// Why it was rejected.
        reason: String,
        /// Status, when a response arrived.
        http_status: Option<u16>,
    },
}

/// The winning candidate and its normalized payload.
#[derive(Debug, Clone)]
pub struct ChainSuccess<T> {
    /// Candidate that produced the payload.
    pub source_id: String,
    /// Normalized payload.
    pub payload: T,
    /// Every attempt made, the winner last.
    pub attempts: Vec<SourceAttempt>,
}

/// Why a chain produced no payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A candidate answered 451.
    #[error("target blocked by archive")]
    Blocked {
        /// Attempts up to and including the blocked one.
        attempts: Vec<SourceAttempt>,
    },
    /// Every candidate failed.
    #[error("all {} candidates failed", attempts.len())]
    Exhausted {
        /// One record per candidate.
        attempts: Vec<SourceAttempt>,
    },
}

impl From<ChainError> for Error {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Blocked { .. } => Self::ArchiveBlocked,
            ChainError::Exhausted { attempts } => Self::ChainExhausted { attempts },
        }
    }
}

/// Direct-then-proxies executor for one logical query.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    fetcher: Fetcher,
    proxies: Vec<ProxyTemplate>,
}

impl FallbackChain {
    /// Build a chain over the given relay templates.
    pub fn new(fetcher: Fetcher, proxies: &[String]) -> Self {
        Self {
            fetcher,
            proxies: proxies.iter().cloned().map(ProxyTemplate::new).collect(),
        }
    }

    /// The direct candidate followed by one candidate per proxy.
    #[must_use]
    pub fn candidates_for(&self, source_id: &str, direct_url: &str) -> Vec<Candidate> {
        std::iter::once(Candidate::new(source_id, direct_url))
            .chain(
                self.proxies
                    .iter()
                    .map(|proxy| Candidate::new(proxy.source_id(), proxy.expand(direct_url))),
            )
            .collect()
    }

    /// Try `candidates` in order until one body normalizes.
    pub async fn execute<T, F>(
        &self,
        candidates: &[Candidate],
        timeout: Duration,
        expect: Expect,
        normalize: F,
    ) -> Result<ChainSuccess<T>, ChainError>
    where
        F: Fn(&str) -> Result<T, NormalizeError>,
    {
        let mut attempts = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            let started_at = Utc::now();
            let mut opts = FetchOptions::get(timeout);
            opts.headers.clone_from(&candidate.headers);

            let failure = |reason: String, http_status: Option<u16>| SourceAttempt {
                source_id: candidate.source_id.clone(),
                url: candidate.url.clone(),
                started_at,
                outcome: AttemptOutcome::Failure {
                    reason,
                    http_status,
                },
            };

            let response = match self.fetcher.fetch(&candidate.url, &opts).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(source = %candidate.source_id, error = %err, "candidate failed, trying next");
                    attempts.push(failure(err.to_string(), None));
                    continue;
                },
            };

            if index == 0 && response.status == STATUS_BLOCKED {
                info!(source = %candidate.source_id, "target blocked (451), stopping chain");
                attempts.push(failure("blocked".to_string(), Some(STATUS_BLOCKED)));
                return Err(ChainError::Blocked { attempts });
            }

            if !response.is_success() {
                warn!(source = %candidate.source_id, status = response.status, "candidate returned non-2xx, trying next");
                attempts.push(failure(
                    format!("HTTP {}", response.status),
                    Some(response.status),
                ));
                continue;
            }

            if !expect.accepts(&response.body) {
                warn!(source = %candidate.source_id, "candidate returned markup or empty body, trying next");
                attempts.push(failure(
                    "body is not JSON".to_string(),
                    Some(response.status),
                ));
                continue;
            }

            match normalize(&response.body) {
                Ok(payload) => {
                    debug!(source = %candidate.source_id, tried = attempts.len() + 1, "candidate accepted");
                    attempts.push(SourceAttempt {
                        source_id: candidate.source_id.clone(),
                        url: candidate.url.clone(),
                        started_at,
                        outcome: AttemptOutcome::Success {
                            http_status: response.status,
                            body_bytes: response.body.len(),
                        },
                    });
                    return Ok(ChainSuccess {
                        source_id: candidate.source_id.clone(),
                        payload,
                        attempts,
                    });
                },
                Err(err) => {
                    warn!(source = %candidate.source_id, error = %err, "candidate payload unusable, trying next");
                    attempts.push(failure(err.to_string(), Some(response.status)));
                },
            }
        }

        warn!(tried = attempts.len(), "fallback chain exhausted");
        Err(ChainError::Exhausted { attempts })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::recovery::recover_json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chain(proxies: &[String]) -> FallbackChain {
        FallbackChain::new(Fetcher::new("recon-test/1.0").unwrap(), proxies)
    }

    fn parse_numbers(body: &str) -> Result<Vec<u32>, NormalizeError> {
        recover_json(body)
    }

    #[test]
    fn test_template_expansion() {
        let raw = ProxyTemplate::new("https://r.jina.ai/{url}");
        assert_eq!(
            raw.expand("https://web.archive.org/cdx?url=a&x=1"),
            "https://r.jina.ai/https://web.archive.org/cdx?url=a&x=1"
        );
        assert_eq!(raw.source_id(), "r.jina.ai");

        let encoded = ProxyTemplate::new("https://api.allorigins.win/raw?url={url_encoded}");
        assert_eq!(
            encoded.expand("https://a.b/c?d=1"),
            "https://api.allorigins.win/raw?url=https%3A%2F%2Fa.b%2Fc%3Fd%3D1"
        );
        assert_eq!(encoded.source_id(), "api.allorigins.win");
    }

    #[test]
    fn test_candidate_order_direct_first() {
        let chain = chain(&[
            "https://one.example/{url}".to_string(),
            "https://two.example/?u={url_encoded}".to_string(),
        ]);
        let candidates = chain.candidates_for("crt.sh", "https://crt.sh/?q=a");
        let ids: Vec<_> = candidates.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["crt.sh", "one.example", "two.example"]);
    }

    #[tokio::test]
    async fn test_falls_through_html_and_errors_to_first_usable() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("result: [1,2,3]"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-c"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[9]"))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let chain = chain(&[
            format!("{base}/relay-a?u={{url_encoded}}"),
            format!("{base}/relay-b?u={{url_encoded}}"),
            format!("{base}/relay-c?u={{url_encoded}}"),
        ]);
        let candidates = chain.candidates_for("direct", &format!("{base}/direct"));

        let success = chain
            .execute(&candidates, Duration::from_secs(2), Expect::Json, parse_numbers)
            .await
            .unwrap();

        assert_eq!(success.payload, vec![1, 2, 3]);
        assert_eq!(success.attempts.len(), 3);
        assert!(matches!(
            success.attempts[0].outcome,
            AttemptOutcome::Failure {
                http_status: Some(503),
                ..
            }
        ));
        assert!(matches!(
            success.attempts[2].outcome,
            AttemptOutcome::Success { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_lists_every_attempt() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let base = server.uri();
        let chain = chain(&[format!("{base}/p?u={{url_encoded}}")]);
        let candidates = chain.candidates_for("direct", &format!("{base}/d"));

        let err = chain
            .execute(&candidates, Duration::from_secs(2), Expect::Json, parse_numbers)
            .await
            .unwrap_err();

        match err {
            ChainError::Exhausted { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].source_id, "direct");
            },
            ChainError::Blocked { .. } => panic!("expected exhaustion"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_blocked_stops_chain() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct"))
            .respond_with(ResponseTemplate::new(451))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1]"))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let chain = chain(&[format!("{base}/relay?u={{url_encoded}}")]);
        let candidates = chain.candidates_for("direct", &format!("{base}/direct"));

        let err = chain
            .execute(&candidates, Duration::from_secs(2), Expect::Json, parse_numbers)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Blocked { .. }));
        assert!(matches!(Error::from(err), Error::ArchiveBlocked));
        Ok(())
    }

    #[tokio::test]
    async fn test_relay_451_is_an_ordinary_failure() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-a"))
            .respond_with(ResponseTemplate::new(451))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/relay-b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[7]"))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let chain = chain(&[
            format!("{base}/relay-a?u={{url_encoded}}"),
            format!("{base}/relay-b?u={{url_encoded}}"),
        ]);
        let candidates = chain.candidates_for("direct", &format!("{base}/direct"));

        let success = chain
            .execute(&candidates, Duration::from_secs(2), Expect::Json, parse_numbers)
            .await
            .unwrap();
        assert_eq!(success.payload, vec![7]);
        assert!(matches!(
            success.attempts[1].outcome,
            AttemptOutcome::Failure {
                http_status: Some(451),
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_body_reaches_normalizer_only_when_allowed() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let chain = chain(&[]);
        let candidates = chain.candidates_for("direct", &server.uri());
        let empty_is_none = |body: &str| -> Result<Vec<u32>, NormalizeError> {
            if body.trim().is_empty() {
                Ok(Vec::new())
            } else {
                recover_json(body)
            }
        };

        let success = chain
            .execute(&candidates, Duration::from_secs(2), Expect::JsonOrEmpty, empty_is_none)
            .await
            .unwrap();
        assert!(success.payload.is_empty());

        let err = chain
            .execute(&candidates, Duration::from_secs(2), Expect::Json, empty_is_none)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Exhausted { .. }));
        Ok(())
    }

    #[test]
    fn test_expect_heuristics() {
        assert!(Expect::JsonOrEmpty.accepts("  "));
        assert!(!Expect::JsonOrEmpty.accepts("<html>"));
        assert!(!Expect::Json.accepts(""));
        assert!(Expect::Json.accepts("[1]"));
    }

    #[tokio::test]
    async fn test_candidate_headers_are_sent() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/h"))
            .and(query_param("x", "1"))
            .and(wiremock::matchers::header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[4]"))
            .mount(&server)
            .await;

        let chain = chain(&[]);
        let mut candidate = Candidate::new("direct", format!("{}/h?x=1", server.uri()));
        candidate
            .headers
            .push(("accept".to_string(), "application/json".to_string()));

        let success = chain
            .execute(&[candidate], Duration::from_secs(2), Expect::Json, parse_numbers)
            .await
            .unwrap();
        assert_eq!(success.source_id, "direct");
        assert_eq!(success.payload, vec![4]);
        Ok(())
    }
}
