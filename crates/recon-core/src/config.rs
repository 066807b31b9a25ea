//! Configuration for upstream endpoints, relay proxies, timeouts and limits.
//!
//! Configuration is stored in TOML. Every section has defaults, so a file
//! only needs to mention what it overrides:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8787"
//!
//! [upstreams]
//! crt_sh = "https://crt.sh"
//!
//! [proxies]
//! wayback = ["https://r.jina.ai/{url}"]
//!
//! [tls]
//! max_polls = 6
//! poll_delay_ms = 4000
//! ```
//!
//! ## Resolution order
//!
//! 1. `RECON_CONFIG` (explicit file path)
//! 2. Platform config directory (`…/recon-relay/config.toml`)
//! 3. Built-in defaults
//!
//! `RECON_BIND` and `RECON_USER_AGENT` override the corresponding
//! `[server]` keys after the file is read.
//!
//! Base URLs are injected into [`Recon`](crate::Recon) rather than read
//! from constants, which is what lets tests point every upstream at a
//! local mock server.

use crate::query::QueryKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RECON_CONFIG";
/// Environment variable overriding `server.bind`.
pub const BIND_ENV: &str = "RECON_BIND";
/// Environment variable overriding `server.user_agent`.
pub const USER_AGENT_ENV: &str = "RECON_USER_AGENT";

/// Placeholder replaced by the raw target URL in proxy templates.
pub const URL_PLACEHOLDER: &str = "{url}";
/// Placeholder replaced by the percent-encoded target URL in proxy templates.
pub const ENCODED_URL_PLACEHOLDER: &str = "{url_encoded}";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener and outbound identity.
    pub server: ServerConfig,
    /// Base URLs of the third-party sources.
    pub upstreams: UpstreamsConfig,
    /// Relay proxies tried after a direct source fails.
    pub proxies: ProxiesConfig,
    /// Per-kind timeouts.
    pub timeouts: TimeoutsConfig,
    /// TLS grade polling budget.
    pub tls: TlsPollConfig,
    /// Result size limits.
    pub limits: LimitsConfig,
}

/// Listener and outbound identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub bind: String,
    /// `User-Agent` sent on every outbound request.
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            user_agent: concat!("recon-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Base URLs of the third-party sources, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamsConfig {
    /// Certificate transparency search.
    pub crt_sh: String,
    /// DNS-over-HTTPS resolver.
    pub dns_google: String,
    /// SSL Labs API root (including the version segment).
    pub ssllabs: String,
    /// Wayback Machine root; CDX lives under `/cdx/search/cdx`.
    pub wayback: String,
    /// ip-api.com root.
    pub ip_api: String,
    /// ISC/DShield API root.
    pub isc: String,
    /// GreyNoise community API root.
    pub greynoise: String,
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            crt_sh: "https://crt.sh".to_string(),
            dns_google: "https://dns.google".to_string(),
            ssllabs: "https://api.ssllabs.com/api/v3".to_string(),
            wayback: "https://web.archive.org".to_string(),
            ip_api: "http://ip-api.com".to_string(),
            isc: "https://isc.sans.edu/api".to_string(),
            greynoise: "https://api.greynoise.io/v3/community".to_string(),
        }
    }
}

/// Relay proxy templates, tried in listed order after the direct source.
///
/// Each template must contain `{url}` or `{url_encoded}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxiesConfig {
    /// Fallbacks for certificate transparency searches.
    pub subdomains: Vec<String>,
    /// Fallbacks for Wayback CDX queries.
    pub wayback: Vec<String>,
}

impl Default for ProxiesConfig {
    fn default() -> Self {
        Self {
            subdomains: vec!["https://r.jina.ai/{url}".to_string()],
            wayback: vec![
                "https://r.jina.ai/{url}".to_string(),
                "https://api.allorigins.win/raw?url={url_encoded}".to_string(),
                "https://corsproxy.io/?{url_encoded}".to_string(),
            ],
        }
    }
}

/// Per-kind upstream timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Certificate transparency searches.
    pub subdomains_secs: u64,
    /// Wayback CDX queries (per candidate).
    pub wayback_secs: u64,
    /// DNS-over-HTTPS.
    pub dns_secs: u64,
    /// Header audit fetch.
    pub headers_secs: u64,
    /// Each SSL Labs analyze call.
    pub tls_secs: u64,
    /// Technology fingerprint HEAD request.
    pub fingerprint_secs: u64,
    /// robots.txt and sitemap.xml fetches.
    pub robots_secs: u64,
    /// Each content-discovery probe.
    pub probe_secs: u64,
    /// ip-api lookups.
    pub asn_secs: u64,
    /// Raw HTTP info fetch.
    pub httpinfo_secs: u64,
    /// ISC and GreyNoise lookups.
    pub intel_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            subdomains_secs: 12,
            wayback_secs: 10,
            dns_secs: 8,
            headers_secs: 10,
            tls_secs: 10,
            fingerprint_secs: 8,
            robots_secs: 8,
            probe_secs: 5,
            asn_secs: 8,
            httpinfo_secs: 10,
            intel_secs: 8,
        }
    }
}

impl TimeoutsConfig {
    /// Timeout applied to each upstream call made for `kind`.
    #[must_use]
    pub const fn for_kind(&self, kind: QueryKind) -> Duration {
        let secs = match kind {
            QueryKind::SubdomainEnum => self.subdomains_secs,
            QueryKind::WaybackSnapshot | QueryKind::WaybackUrlList => self.wayback_secs,
            QueryKind::DnsLookup => self.dns_secs,
            QueryKind::HeaderAudit => self.headers_secs,
            QueryKind::TlsGrade => self.tls_secs,
            QueryKind::TechFingerprint => self.fingerprint_secs,
            QueryKind::RobotsFetch => self.robots_secs,
            QueryKind::ContentProbe => self.probe_secs,
            QueryKind::AsnLookup => self.asn_secs,
            QueryKind::HttpInfo => self.httpinfo_secs,
            QueryKind::TopPorts | QueryKind::IpReputation => self.intel_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Polling budget for TLS grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPollConfig {
    /// Re-polls allowed after the first analyze call.
    pub max_polls: u32,
    /// Wait between polls, in milliseconds.
    pub poll_delay_ms: u64,
}

impl Default for TlsPollConfig {
    fn default() -> Self {
        Self {
            max_polls: 6,
            poll_delay_ms: 4_000,
        }
    }
}

impl TlsPollConfig {
    /// Wait between polls.
    #[must_use]
    pub const fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }
}

/// Result size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// CDX `limit` when the caller gives none.
    pub wayback_default: u32,
    /// Largest CDX `limit` a caller may request.
    pub wayback_max: u32,
    /// Characters of body kept by the httpinfo endpoint.
    pub body_sample_chars: usize,
    /// Entries in the wayback top-directories ranking.
    pub top_directories: usize,
    /// `<loc>` entries kept from a sitemap.
    pub sitemap_urls: usize,
    /// Rows requested from the ISC top ports feed when the caller gives none.
    pub top_ports_default: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            wayback_default: 50,
            wayback_max: 5_000,
            body_sample_chars: 20_000,
            top_directories: 10,
            sitemap_urls: 500,
            top_ports_default: 10,
        }
    }
}

impl Config {
    /// Load configuration from `RECON_CONFIG`, the platform config
    /// directory, or defaults, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or
    /// parsed, or if the resulting configuration fails validation.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Where the config file is looked up when no path is given.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(explicit));
        }
        directories::ProjectDirs::from("dev", "recon", "recon-relay")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply `RECON_BIND` / `RECON_USER_AGENT` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(bind) = non_empty_env(BIND_ENV) {
            tracing::debug!(bind = %bind, "bind address overridden from environment");
            self.server.bind = bind;
        }
        if let Some(agent) = non_empty_env(USER_AGENT_ENV) {
            self.server.user_agent = agent;
        }
    }

    /// Reject configurations that would make every request fail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        for template in self
            .proxies
            .subdomains
            .iter()
            .chain(self.proxies.wayback.iter())
        {
            if !template.contains(URL_PLACEHOLDER) && !template.contains(ENCODED_URL_PLACEHOLDER) {
                return Err(Error::Config(format!(
                    "proxy template '{template}' has no {URL_PLACEHOLDER} or {ENCODED_URL_PLACEHOLDER} placeholder"
                )));
            }
        }

        let t = &self.timeouts;
        let all = [
            ("subdomains_secs", t.subdomains_secs),
            ("wayback_secs", t.wayback_secs),
            ("dns_secs", t.dns_secs),
            ("headers_secs", t.headers_secs),
            ("tls_secs", t.tls_secs),
            ("fingerprint_secs", t.fingerprint_secs),
            ("robots_secs", t.robots_secs),
            ("probe_secs", t.probe_secs),
            ("asn_secs", t.asn_secs),
            ("httpinfo_secs", t.httpinfo_secs),
            ("intel_secs", t.intel_secs),
        ];
        if let Some((key, _)) = all.iter().find(|(_, secs)| *secs == 0) {
            return Err(Error::Config(format!("timeouts.{key} must be positive")));
        }

        if self.limits.wayback_default == 0 || self.limits.wayback_default > self.limits.wayback_max
        {
            return Err(Error::Config(
                "limits.wayback_default must be between 1 and limits.wayback_max".to_string(),
            ));
        }

        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
