//! Single bounded HTTP calls to upstream sources.
//!
//! A [`Fetcher`] owns two immutable `reqwest` clients, one that follows
//! redirects and one that does not. Every call carries its own timeout and
//! is never retried here; any HTTP status comes back as `Ok` so callers
//! decide what counts as failure ([`FetchResponse::require_success`]).

use crate::Error;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Redirect hops followed by the redirect-following client.
const MAX_REDIRECTS: usize = 10;

/// Why a single upstream call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The call exceeded its timeout and was cancelled.
    #[error("timed out after {}ms", after.as_millis())]
    Timeout {
        /// URL that was requested.
        url: String,
        /// Budget that was exceeded.
        after: Duration,
    },
    /// Connection, TLS or protocol failure.
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx status, for callers that treat it as fatal.
    #[error("HTTP {status}")]
    Status {
        /// Status code returned.
        status: u16,
        /// URL that was requested.
        url: String,
    },
    /// The body could not be decoded as text.
    #[error("could not decode body: {0}")]
    Decode(String),
    /// The URL was rejected before any request was sent.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { url, after } => {
                Self::UpstreamTimeout(format!("{url} after {}ms", after.as_millis()))
            },
            FetchError::Network(msg) => Self::UpstreamUnavailable(msg),
            FetchError::Status { status, url } => Self::UpstreamStatus { status, url },
            FetchError::Decode(msg) => Self::Unparseable {
                reason: msg,
                excerpt: String::new(),
            },
            FetchError::InvalidUrl(msg) => Self::InvalidUrl(msg),
        }
    }
}

/// Per-call request settings.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// HTTP method; only GET and HEAD are used.
    pub method: Method,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Hard budget for the whole call, body included.
    pub timeout: Duration,
    /// Whether 3xx responses are followed.
    pub follow_redirects: bool,
}

impl FetchOptions {
    /// GET with redirects followed.
    #[must_use]
    pub const fn get(timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            timeout,
            follow_redirects: true,
        }
    }

    /// HEAD with redirects followed.
    #[must_use]
    pub const fn head(timeout: Duration) -> Self {
        Self {
            method: Method::HEAD,
            headers: Vec::new(),
            timeout,
            follow_redirects: true,
        }
    }

    /// Leave 3xx responses as they are.
    #[must_use]
    pub const fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Add a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// What an upstream answered, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lowercase names; repeated headers are joined with `, `.
    pub headers: BTreeMap<String, String>,
    /// Body as text (empty for HEAD).
    pub body: String,
    /// URL after redirects.
    pub final_url: String,
}

impl FetchResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Turn a non-2xx response into [`FetchError::Status`].
    pub fn require_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                url: self.final_url,
            })
        }
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// HTTP client for single upstream calls.
///
/// Holds two immutable clients (one following redirects, one not) and no
/// other state, so one instance is shared by every request. It never
/// retries; retrying other sources is the fallback chain's job.
#[derive(Debug, Clone)]
pub struct Fetcher {
    following: Client,
    direct: Client,
}

impl Fetcher {
    /// Creates a fetcher sending the given `User-Agent`.
    pub fn new(user_agent: &str) -> crate::Result<Self> {
        let following = Self::builder(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        let direct = Self::builder(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { following, direct })
    }

    fn builder(user_agent: &str) -> reqwest::ClientBuilder {
        Client::builder()
            .user_agent(user_agent.to_string())
            .gzip(true)
            .brotli(true)
    }

    /// Perform one request and return the response regardless of status.
    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let headers = build_headers(&opts.headers)?;

        let client = if opts.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let request = client
            .request(opts.method.clone(), parsed)
            .headers(headers)
            .timeout(opts.timeout);

        // The reqwest timeout covers the whole exchange; the outer guard also
        // bounds body streaming on servers that trickle data.
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let headers = collect_headers(response.headers());
            let body = if opts.method == Method::HEAD {
                String::new()
            } else {
                response.text().await?
            };
            Ok::<_, reqwest::Error>(FetchResponse {
                status,
                headers,
                body,
                final_url,
            })
        };

        match tokio::time::timeout(opts.timeout, exchange).await {
            Err(_) => Err(timeout(url, opts.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(timeout(url, opts.timeout)),
            Ok(Err(e)) if e.is_decode() || e.is_body() => Err(FetchError::Decode(e.to_string())),
            Ok(Err(e)) => Err(FetchError::Network(e.without_url().to_string())),
            Ok(Ok(response)) => {
                debug!(
                    url = %url,
                    status = response.status,
                    bytes = response.body.len(),
                    "upstream responded"
                );
                Ok(response)
            },
        }
    }

    /// GET `url` and return the body of a 2xx response.
    pub async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self.fetch(url, &FetchOptions::get(timeout)).await?;
        Ok(response.require_success()?.body)
    }

    /// GET `url` and decode a 2xx body as strict JSON.
    ///
    /// Use [`crate::recovery::recover_json`] instead when an intermediary
    /// may have wrapped the payload.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T, FetchError> {
        let body = self.fetch_text(url, timeout).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn timeout(url: &str, after: Duration) -> FetchError {
    debug!(url = %url, after_ms = after.as_millis(), "upstream call timed out");
    FetchError::Timeout {
        url: url.to_string(),
        after,
    }
}

fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::InvalidUrl(format!("bad header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::InvalidUrl(format!("bad header value for {name}: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}
