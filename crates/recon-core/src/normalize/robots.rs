//! robots.txt directives and sitemap `<loc>` extraction.
//!
//! Both parsers are total: a garbled robots file yields whatever lines
//! could be read, and malformed XML yields the locations seen before the
//! first error.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use tracing::debug;

/// Directives pulled out of a robots.txt file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RobotsDirectives {
    /// `Sitemap:` URLs.
    pub sitemaps: Vec<String>,
    /// `Allow:` paths.
    pub allow: Vec<String>,
    /// `Disallow:` paths (empty values skipped).
    pub disallow: Vec<String>,
}

/// Extract `Sitemap`, `Allow` and `Disallow` directives.
///
/// Directive names are matched case-insensitively, `#` comments are
/// stripped and repeated values are kept once.
pub fn parse_robots(text: &str) -> RobotsDirectives {
    let mut out = RobotsDirectives::default();

    for line in text.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let bucket = match name.trim().to_ascii_lowercase().as_str() {
            "sitemap" => &mut out.sitemaps,
            "allow" => &mut out.allow,
            "disallow" => &mut out.disallow,
            _ => continue,
        };
        if !bucket.iter().any(|existing| existing == value) {
            bucket.push(value.to_string());
        }
    }

    out
}

/// Collect `<loc>` values from a sitemap or sitemap index, up to `max`.
pub fn parse_sitemap_locs(xml: &str, max: usize) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut in_loc = false;

    while locs.len() < max {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_loc = e.local_name().as_ref() == b"loc",
            Ok(Event::End(_)) => in_loc = false,
            Ok(Event::Text(e)) if in_loc => match e.unescape() {
                Ok(text) if !text.trim().is_empty() => locs.push(text.trim().to_string()),
                Ok(_) => {},
                Err(err) => debug!(error = %err, "skipping undecodable <loc>"),
            },
            Ok(Event::CData(e)) if in_loc => {
                let text = String::from_utf8_lossy(&e).trim().to_string();
                if !text.is_empty() {
                    locs.push(text);
                }
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                debug!(error = %err, parsed = locs.len(), "sitemap XML error, keeping what was read");
                break;
            },
            _ => {},
        }
    }

    locs
}
