//! # recon-core
//!
//! Fallback-aware aggregation over public reconnaissance data sources.
//!
//! Given a domain, URL, host or IP, this crate queries third-party sources
//! (certificate transparency, DNS-over-HTTPS, SSL Labs, the Wayback
//! Machine, ip-api, ISC/DShield, GreyNoise) or the target itself, falls back
//! to relay proxies when a source is unusable, and reshapes heterogeneous
//! payloads into stable report types.
//!
//! ## Architecture
//!
//! - **Fetcher**: one bounded HTTP call, typed failures, no retries
//! - **Fallback chain**: direct source first, then injected relay proxies
//! - **Normalizers**: per-source schemas validated at the boundary, with
//!   best-effort JSON recovery for wrapped payloads
//! - **Aggregation**: dedupe, tie-breaks, summaries and final payloads
//! - **Recon**: one async entry point per query kind
//!
//! ## Quick Start
//!
//! ```no_run
//! use recon_core::{Config, Query, QueryKind, QueryOptions, Recon};
//!
//! # async fn example() -> recon_core::Result<()> {
//! let recon = Recon::new(Config::load()?)?;
//! let query = Query::new(QueryKind::SubdomainEnum, Some("example.com"), QueryOptions::default())?;
//! let report = recon.subdomains(&query).await?;
//! println!("{} subdomains", report.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Stage-local failures convert into [`Error`], whose
//! [`category`](Error::category) drives HTTP status mapping:
//!
//! ```rust
//! use recon_core::{Query, QueryKind, QueryOptions};
//!
//! let err = Query::new(QueryKind::DnsLookup, None, QueryOptions::default()).unwrap_err();
//! assert_eq!(err.to_string(), "Missing name");
//! ```

/// Final payload shapes and combinators
pub mod aggregate;
/// Ordered fallback over direct sources and relay proxies
pub mod chain;
/// Configuration for upstreams, proxies, timeouts and limits
pub mod config;
/// Error types and result aliases
pub mod error;
/// Single bounded upstream HTTP calls
pub mod fetcher;
/// Per-source payload normalizers
pub mod normalize;
/// Query model and target normalization
pub mod query;
/// Per-kind orchestration
pub mod recon;
/// Best-effort JSON recovery
pub mod recovery;

// Re-export commonly used types
pub use aggregate::{
    HeaderAuditReport, HttpInfoReport, ProbeReport, RobotsReport, SubdomainReport, TechReport,
    TopPortsReport, WaybackReport,
};
pub use chain::{AttemptOutcome, ChainError, FallbackChain, SourceAttempt};
pub use config::Config;
pub use error::{Error, Result};
pub use fetcher::{FetchError, Fetcher};
pub use query::{Query, QueryKind, QueryOptions, WaybackMode};
pub use recon::Recon;
pub use recovery::NormalizeError;
