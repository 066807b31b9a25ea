//! Per-source adapters from raw upstream payloads to canonical records.
//!
//! Every adapter owns the serde schema of its upstream and validates at the
//! boundary; nothing past a normalizer handles optional upstream fields.
//! Parsers are total over 2xx bodies: malformed input yields a
//! [`NormalizeError`](crate::recovery::NormalizeError), never a panic.

pub mod fingerprint;
pub mod headers;
pub mod intel;
pub mod probe;
pub mod robots;
pub mod subdomains;
pub mod tls;
pub mod wayback;

pub use fingerprint::{Technology, detect_from_headers, detect_platforms, merge_technologies};
pub use headers::{HeaderCheck, HeaderReport, SECURITY_HEADERS, audit_headers};
pub use intel::{PortStat, parse_top_ports};
pub use probe::{ProbeHit, WORDLIST, is_hit, probe_url};
pub use robots::{RobotsDirectives, parse_robots, parse_sitemap_locs};
pub use subdomains::{CrtRecord, normalize_subdomains, parse_crt_records};
pub use tls::{TlsPollState, TlsStatus, parse_analyze};
pub use wayback::{
    DirectoryCount, Snapshot, UrlListSummary, parse_cdx_rows, snapshots_from_rows, summarize_urls,
    urls_from_rows,
};
