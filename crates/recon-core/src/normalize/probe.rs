//! Fixed-wordlist content discovery.

use serde::Serialize;

/// Paths requested from the target, in output order.
pub const WORDLIST: [&str; 16] = [
    "robots.txt",
    "sitemap.xml",
    "admin",
    "login",
    "backup",
    ".git/HEAD",
    "server-status",
    "crossdomain.xml",
    "config",
    "config.php",
    ".env",
    "api",
    "static",
    "uploads",
    ".well-known/security.txt",
    ".well-known/assetlinks.json",
];

/// A wordlist path that answered with a success or redirect status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeHit {
    /// Path with a leading `/`.
    pub path: String,
    /// Status returned (redirects are not followed).
    pub status: u16,
}

impl ProbeHit {
    /// Record a hit for a wordlist entry.
    pub fn new(entry: &str, status: u16) -> Self {
        Self {
            path: format!("/{}", entry.trim_start_matches('/')),
            status,
        }
    }
}

/// Statuses in `[200, 400)` count as hits.
#[must_use]
pub const fn is_hit(status: u16) -> bool {
    status >= 200 && status < 400
}

/// `origin/entry` with exactly one slash between them.
pub fn probe_url(origin: &str, entry: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        entry.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_range() {
        assert!(!is_hit(199));
        assert!(is_hit(200));
        assert!(is_hit(301));
        assert!(is_hit(399));
        assert!(!is_hit(400));
        assert!(!is_hit(404));
        assert!(!is_hit(500));
    }

    #[test]
    fn test_paths_get_leading_slash() {
        assert_eq!(ProbeHit::new("robots.txt", 200).path, "/robots.txt");
        assert_eq!(ProbeHit::new(".git/HEAD", 200).path, "/.git/HEAD");
        assert_eq!(
            probe_url("https://example.com/", ".well-known/security.txt"),
            "https://example.com/.well-known/security.txt"
        );
    }

    #[test]
    fn test_wordlist_order() {
        assert_eq!(WORDLIST[0], "robots.txt");
        assert_eq!(WORDLIST[2], "admin");
        assert_eq!(WORDLIST[15], ".well-known/assetlinks.json");
    }
}
