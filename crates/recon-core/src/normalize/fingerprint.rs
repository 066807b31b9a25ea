//! Hosting and technology guesses from the URL and response headers.

use serde::Serialize;
use std::collections::HashSet;

/// URL substring to hosting platform.
const PLATFORMS: &[(&str, &str)] = &[
    ("github.io", "GitHub Pages"),
    ("netlify", "Netlify"),
    ("vercel", "Vercel"),
    ("herokuapp", "Heroku"),
    ("amazonaws", "AWS"),
];

/// Headers whose presence alone is reported as a technology.
const SECURITY_MARKERS: [&str; 3] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
];

/// One detected technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Technology {
    /// Display name; also the dedupe key (case-insensitive).
    pub name: String,
    /// Broad grouping.
    pub category: String,
    /// What triggered the detection.
    pub evidence: String,
}

impl Technology {
    fn new(name: impl Into<String>, category: &str, evidence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.to_string(),
            evidence: evidence.into(),
        }
    }
}

/// Hosting platforms whose marker appears in `url`.
pub fn detect_platforms(url: &str) -> Vec<Technology> {
    let lower = url.to_ascii_lowercase();
    PLATFORMS
        .iter()
        .filter(|(marker, _)| lower.contains(marker))
        .map(|(marker, name)| Technology::new(*name, "Hosting", format!("url contains {marker}")))
        .collect()
}

/// Technologies revealed by response headers.
///
/// `header` looks a header up by lowercase name.
pub fn detect_from_headers<'a>(header: impl Fn(&str) -> Option<&'a str>) -> Vec<Technology> {
    let mut found = Vec::new();

    let named = [
        ("server", "Web Server"),
        ("x-powered-by", "Framework"),
        ("x-generator", "Generator"),
    ];
    for (name, category) in named {
        if let Some(value) = header(name).map(str::trim).filter(|v| !v.is_empty()) {
            found.push(Technology::new(value, category, format!("{name} header")));
        }
    }

    if let Some(marker) = SECURITY_MARKERS.iter().find(|name| header(name).is_some()) {
        found.push(Technology::new(
            "Security Headers",
            "Security",
            format!("{marker} header"),
        ));
    }

    found
}

/// Concatenate both lists, keeping the first entry per name (ignoring case).
pub fn merge_technologies(
    first: Vec<Technology>,
    second: Vec<Technology>,
) -> Vec<Technology> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|tech| seen.insert(tech.name.to_lowercase()))
        .collect()
}
