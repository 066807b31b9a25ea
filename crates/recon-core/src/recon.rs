//! Per-kind orchestration: fetch, normalize, aggregate.
//!
//! [`Recon`] is built once from [`Config`] and shared by every request. It
//! holds no mutable state; each method runs one query from start to finish
//! and dropping its future cancels whatever upstream call is in flight.

use crate::aggregate::{
    HeaderAuditReport, HttpInfoReport, ProbeReport, RobotsParsed, RobotsReport, SnapshotsReport,
    SubdomainReport, TechReport, TopPortsReport, UrlListReport, WaybackReport, prefer_larger,
    sample_body,
};
use crate::chain::{AttemptOutcome, ChainError, ChainSuccess, Expect, FallbackChain};
use crate::config::Config;
use crate::fetcher::{FetchOptions, FetchResponse, Fetcher};
use crate::normalize::{
    ProbeHit, TlsPollState, WORDLIST, audit_headers, detect_from_headers, detect_platforms,
    is_hit, normalize_subdomains, parse_analyze, parse_cdx_rows, parse_crt_records, parse_robots,
    parse_sitemap_locs, parse_top_ports, probe_url, snapshots_from_rows, urls_from_rows,
};
use crate::query::{Query, QueryKind, WaybackMode, origin_of, to_domain};
use crate::recovery::recover_json;
use crate::{Error, Result};
use serde_json::Value;
use std::net::IpAddr;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Source id of the certificate transparency log.
const CRT_SH: &str = "crt.sh";
/// Source id of the Wayback CDX index.
const WAYBACK: &str = "web.archive.org";
/// CDX columns requested in snapshot mode, in [`Snapshot`](crate::normalize::Snapshot) order.
const SNAPSHOT_FIELDS: &str = "timestamp,original,statuscode,mimetype,length";
/// Upper bound on the ISC feed size a caller may request.
const TOP_PORTS_MAX: u32 = 1_000;

/// Entry point for every reconnaissance query.
#[derive(Debug, Clone)]
pub struct Recon {
    config: Config,
    fetcher: Fetcher,
    subdomain_chain: FallbackChain,
    wayback_chain: FallbackChain,
}

impl Recon {
    /// Build the HTTP clients and fallback chains described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config.server.user_agent)?;
        let subdomain_chain = FallbackChain::new(fetcher.clone(), &config.proxies.subdomains);
        let wayback_chain = FallbackChain::new(fetcher.clone(), &config.proxies.wayback);
        Ok(Self {
            config,
            fetcher,
            subdomain_chain,
            wayback_chain,
        })
    }

    /// Configuration this instance was built from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Certificate transparency subdomains of the target's domain.
    ///
    /// The exact (`q=domain`) and wildcard (`q=%.domain`) searches run
    /// concurrently, each through its own fallback chain; the larger result
    /// wins.
    #[instrument(skip_all, fields(target = %query.target()))]
    pub async fn subdomains(&self, query: &Query) -> Result<SubdomainReport> {
        let domain = query.target_domain();
        if domain.is_empty() {
            return Err(Error::InvalidUrl(query.target().to_string()));
        }
        let timeout = self.timeout(query);
        let hostnames = |body: &str| {
            parse_crt_records(body).map(|records| normalize_subdomains(&records, &domain))
        };

        let exact = self.crt_sh_url(&domain)?;
        let wildcard = self.crt_sh_url(&format!("%.{domain}"))?;
        let exact = self.subdomain_chain.candidates_for(CRT_SH, &exact);
        let wildcard = self.subdomain_chain.candidates_for(CRT_SH, &wildcard);

        let (exact, wildcard) = tokio::join!(
            self.subdomain_chain
                .execute(&exact, timeout, Expect::Json, hostnames),
            self.subdomain_chain
                .execute(&wildcard, timeout, Expect::Json, hostnames),
        );

        let subdomains = prefer_larger(
            exact.map(settle).map(|(_, hosts)| hosts),
            wildcard.map(settle).map(|(_, hosts)| hosts),
        )?;
        info!(domain = %domain, total = subdomains.len(), "subdomain enumeration complete");
        Ok(SubdomainReport::new(domain, subdomains))
    }

    /// Wayback captures or archived URLs, depending on the query kind.
    ///
    /// A target the archive refuses (HTTP 451) yields an empty report with
    /// `blocked` set rather than an error.
    #[instrument(skip_all, fields(target = %query.target(), kind = %query.kind()))]
    pub async fn wayback(&self, query: &Query) -> Result<WaybackReport> {
        let mode = match query.kind() {
            QueryKind::WaybackUrlList => WaybackMode::Urls,
            _ => WaybackMode::Snapshots,
        };
        let direct = self.cdx_url(query, mode)?;
        let candidates = self.wayback_chain.candidates_for(WAYBACK, &direct);
        let timeout = self.timeout(query);

        let outcome = match mode {
            WaybackMode::Snapshots => self
                .wayback_chain
                .execute(&candidates, timeout, Expect::JsonOrEmpty, |body| {
                    parse_cdx_rows(body).map(|rows| snapshots_from_rows(&rows))
                })
                .await
                .map(settle)
                .map(|(source, snapshots)| {
                    WaybackReport::Snapshots(SnapshotsReport {
                        snapshots,
                        source: Some(source),
                        blocked: false,
                    })
                }),
            WaybackMode::Urls => self
                .wayback_chain
                .execute(&candidates, timeout, Expect::JsonOrEmpty, |body| {
                    parse_cdx_rows(body).map(|rows| urls_from_rows(&rows))
                })
                .await
                .map(settle)
                .map(|(source, urls)| {
                    WaybackReport::Urls(UrlListReport::new(
                        urls,
                        self.config.limits.top_directories,
                        source,
                    ))
                }),
        };

        match outcome {
            Ok(report) => Ok(report),
            Err(ChainError::Blocked { attempts }) => {
                info!(tried = attempts.len(), "archive blocked target, returning empty result");
                Ok(WaybackReport::blocked(mode))
            },
            Err(err) => Err(err.into()),
        }
    }

    /// DNS-over-HTTPS answer, passed through as-is.
    #[instrument(skip_all, fields(name = %query.target()))]
    pub async fn dns(&self, query: &Query) -> Result<Value> {
        let record_type = query
            .options()
            .record_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("A");
        let url = with_query(
            &format!("{}/resolve", self.config.upstreams.dns_google),
            &[("name", query.target()), ("type", record_type)],
        )?;
        Ok(self.fetcher.fetch_json(&url, self.timeout(query)).await?)
    }

    /// Security header checklist of the target, redirects followed.
    #[instrument(skip_all, fields(url = %query.target()))]
    pub async fn headers(&self, query: &Query) -> Result<HeaderAuditReport> {
        let url = query.target_url();
        let response = self
            .fetcher
            .fetch(&url, &FetchOptions::get(self.timeout(query)))
            .await?;
        let headers = audit_headers(
            response
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        Ok(HeaderAuditReport {
            url,
            status: response.status,
            headers,
        })
    }

    /// SSL Labs analysis, polled until ready, failed, or out of budget.
    ///
    /// The last document received is returned as-is, so a still-running
    /// assessment comes back with its in-progress status.
    #[instrument(skip_all, fields(host = %query.target()))]
    pub async fn tls_grade(&self, query: &Query) -> Result<Value> {
        let host = query.target_domain();
        let url = with_query(
            &format!("{}/analyze", self.config.upstreams.ssllabs),
            &[("host", host.as_str()), ("all", "done")],
        )?;
        let timeout = self.timeout(query);
        let tls = &self.config.tls;

        let mut state = TlsPollState::Requested;
        let mut polls = 0;
        loop {
            let body = self.fetcher.fetch_text(&url, timeout).await?;
            let (status, document) = parse_analyze(&body)?;
            state = state.transition(status);
            debug!(?state, polls, "analyze response");

            if !state.wants_poll() || polls >= tls.max_polls {
                if state.wants_poll() {
                    warn!(polls, "TLS assessment still running, returning pending state");
                }
                return Ok(document);
            }
            polls += 1;
            tokio::time::sleep(tls.poll_delay()).await;
        }
    }

    /// Hosting and technology guesses.
    ///
    /// A failed HEAD request falls back to URL heuristics alone.
    #[instrument(skip_all, fields(url = %query.target()))]
    pub async fn techstack(&self, query: &Query) -> Result<TechReport> {
        let url = query.target_url();
        let platforms = detect_platforms(&url);

        let from_headers = match self
            .fetcher
            .fetch(&url, &FetchOptions::head(self.timeout(query)))
            .await
        {
            Ok(response) => Some(detect_from_headers(|name| response.header(name))),
            Err(err) => {
                warn!(error = %err, "HEAD failed, using URL heuristics only");
                None
            },
        };

        Ok(TechReport::new(url, platforms, from_headers))
    }

    /// robots.txt and sitemap.xml of the target's origin, fetched together.
    #[instrument(skip_all, fields(url = %query.target()))]
    pub async fn robots(&self, query: &Query) -> Result<RobotsReport> {
        let origin = origin_of(query.target())?;
        let robots_url = format!("{origin}/robots.txt");
        let sitemap_url = format!("{origin}/sitemap.xml");
        let timeout = self.timeout(query);

        let (robots, sitemap) = tokio::join!(
            self.fetcher.fetch_text(&robots_url, timeout),
            self.fetcher.fetch_text(&sitemap_url, timeout),
        );
        let robots = robots
            .inspect_err(|err| debug!(error = %err, "robots.txt unavailable"))
            .ok();
        let sitemap = sitemap
            .inspect_err(|err| debug!(error = %err, "sitemap.xml unavailable"))
            .ok();

        let parsed = RobotsParsed {
            robots: robots.as_deref().map(parse_robots).unwrap_or_default(),
            sitemap_urls: sitemap
                .as_deref()
                .map(|xml| parse_sitemap_locs(xml, self.config.limits.sitemap_urls))
                .unwrap_or_default(),
        };

        Ok(RobotsReport {
            robots_url,
            sitemap_url,
            robots,
            sitemap,
            parsed,
        })
    }

    /// Request every wordlist path once, in order, without following
    /// redirects.
    #[instrument(skip_all, fields(url = %query.target()))]
    pub async fn content_probe(&self, query: &Query) -> Result<ProbeReport> {
        let origin = origin_of(query.target())?;
        let opts = FetchOptions::get(self.timeout(query)).no_redirects();

        let mut hits = Vec::new();
        for entry in WORDLIST {
            match self.fetcher.fetch(&probe_url(&origin, entry), &opts).await {
                Ok(response) if is_hit(response.status) => {
                    hits.push(ProbeHit::new(entry, response.status));
                },
                Ok(response) => debug!(path = entry, status = response.status, "miss"),
                Err(err) => debug!(path = entry, error = %err, "probe failed"),
            }
        }

        info!(origin = %origin, hits = hits.len(), "content probe complete");
        Ok(ProbeReport { origin, hits })
    }

    /// ip-api ASN/geo record for an IP or hostname.
    #[instrument(skip_all, fields(target = %query.target()))]
    pub async fn asn(&self, query: &Query) -> Result<Value> {
        let target = match query.target().trim().parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => to_domain(query.target()),
        };
        let url = join_path(&self.config.upstreams.ip_api, &["json", &target])?;
        self.passthrough(&url, self.timeout(query)).await
    }

    /// Status, headers and the first part of the body of the target.
    #[instrument(skip_all, fields(url = %query.target()))]
    pub async fn http_info(&self, query: &Query) -> Result<HttpInfoReport> {
        let url = query.target_url();
        let FetchResponse {
            status,
            headers,
            body,
            ..
        } = self
            .fetcher
            .fetch(&url, &FetchOptions::get(self.timeout(query)))
            .await?;
        Ok(HttpInfoReport {
            url,
            status,
            headers,
            body_sample: sample_body(&body, self.config.limits.body_sample_chars),
        })
    }

    /// Most-reported destination ports from ISC/DShield.
    #[instrument(skip_all)]
    pub async fn top_ports(&self, query: &Query) -> Result<TopPortsReport> {
        let limit = query
            .options()
            .limit
            .unwrap_or(self.config.limits.top_ports_default)
            .clamp(1, TOP_PORTS_MAX);
        let mut url = join_path(
            &self.config.upstreams.isc,
            &["topports", "records", &limit.to_string()],
        )?;
        url.push_str("?json");

        let body = self.fetcher.fetch_text(&url, self.timeout(query)).await?;
        let ports = parse_top_ports(&body, limit as usize)?;
        Ok(TopPortsReport { ports })
    }

    /// GreyNoise community classification of an IP.
    ///
    /// GreyNoise answers 404 with a JSON explanation for IPs it has never
    /// seen; that body is passed through like a 200.
    #[instrument(skip_all, fields(ip = %query.target()))]
    pub async fn ip_reputation(&self, query: &Query) -> Result<Value> {
        let ip: IpAddr = query
            .target()
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid ip: {}", query.target())))?;
        let url = join_path(&self.config.upstreams.greynoise, &[&ip.to_string()])?;
        let opts = FetchOptions::get(self.timeout(query)).header("Accept", "application/json");
        let response = self.fetcher.fetch(&url, &opts).await?;
        let response = if response.status == 404 {
            response
        } else {
            response.require_success()?
        };
        parse_passthrough(&response.body)
    }

    async fn passthrough(&self, url: &str, timeout: std::time::Duration) -> Result<Value> {
        let body = self.fetcher.fetch_text(url, timeout).await?;
        parse_passthrough(&body)
    }

    fn timeout(&self, query: &Query) -> std::time::Duration {
        self.config.timeouts.for_kind(query.kind())
    }

    fn crt_sh_url(&self, q: &str) -> Result<String> {
        with_query(
            &format!("{}/", self.config.upstreams.crt_sh.trim_end_matches('/')),
            &[("q", q), ("output", "json")],
        )
    }

    fn cdx_url(&self, query: &Query, mode: WaybackMode) -> Result<String> {
        let limits = &self.config.limits;
        let limit = query
            .options()
            .limit
            .unwrap_or(limits.wayback_default)
            .clamp(1, limits.wayback_max)
            .to_string();
        let base = format!(
            "{}/cdx/search/cdx",
            self.config.upstreams.wayback.trim_end_matches('/')
        );

        match mode {
            WaybackMode::Snapshots => {
                let target = query.target_url();
                with_query(
                    &base,
                    &[
                        ("url", target.as_str()),
                        ("output", "json"),
                        ("fl", SNAPSHOT_FIELDS),
                        ("limit", limit.as_str()),
                    ],
                )
            },
            WaybackMode::Urls => {
                let domain = query.target_domain();
                with_query(
                    &base,
                    &[
                        ("url", domain.as_str()),
                        ("matchType", "domain"),
                        ("output", "json"),
                        ("fl", "original"),
                        ("collapse", "urlkey"),
                        ("limit", limit.as_str()),
                    ],
                )
            },
        }
    }
}

/// Winning source and payload of a chain, noting when relays were needed.
fn settle<T>(win: ChainSuccess<T>) -> (String, T) {
    let failed = win.attempts.len().saturating_sub(1);
    if failed > 0 {
        let reasons: Vec<String> = win
            .attempts
            .iter()
            .filter_map(|attempt| match &attempt.outcome {
                AttemptOutcome::Failure { reason, .. } => {
                    Some(format!("{}: {reason}", attempt.source_id))
                },
                AttemptOutcome::Success { .. } => None,
            })
            .collect();
        info!(source = %win.source_id, failed, ?reasons, "answered after fallback");
    }
    (win.source_id, win.payload)
}

/// Upstream JSON, accepted even when wrapped by an intermediary.
fn parse_passthrough(body: &str) -> Result<Value> {
    Ok(recover_json(body)?)
}

fn parse_upstream(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| Error::Config(format!("bad upstream URL {base}: {e}")))
}

fn with_query(base: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut url = parse_upstream(base)?;
    url.query_pairs_mut().extend_pairs(pairs);
    Ok(url.into())
}

fn join_path(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = parse_upstream(base)?;
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("upstream URL {base} cannot have a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}
