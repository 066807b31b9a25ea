//! Wayback CDX tables to snapshots, URL lists and URL summaries.
//!
//! CDX `output=json` is a 2-D array whose first row names the columns.
//! Cells are usually strings but some mirrors emit numbers, so rows are
//! read as loose JSON values and stringified.

use crate::recovery::{NormalizeError, recover_json};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;
use url::Url;

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "csv"];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar", "gz", "bz2", "7z"];
const CONFIG_EXTENSIONS: &[&str] = &["json", "xml", "yaml", "yml", "ini", "env", "conf"];

/// Path fragments worth a closer look.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static INTERESTING_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)admin|login|config|backup|export|api|download").unwrap());

/// One archived capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// CDX timestamp (`yyyyMMddhhmmss`).
    pub timestamp: String,
    /// URL as originally captured.
    pub original: String,
    /// HTTP status recorded at capture time.
    pub status_code: String,
    /// MIME type recorded at capture time.
    pub mimetype: String,
    /// Stored length.
    pub length: String,
    /// Replay URL.
    pub archive_url: String,
}

/// A directory prefix and how many archived URLs fall under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryCount {
    /// `/first/second` path prefix.
    pub path: String,
    /// URLs under the prefix.
    pub count: usize,
}

/// Classification of an archived URL list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlListSummary {
    /// URLs in the list.
    pub total: usize,
    /// Most frequent two-segment prefixes.
    pub top_directories: Vec<DirectoryCount>,
    /// URLs with a query string.
    pub with_query: Vec<String>,
    /// Office documents and CSV.
    pub documents: Vec<String>,
    /// Compressed archives.
    pub archives: Vec<String>,
    /// Configuration and data files.
    pub config_or_data: Vec<String>,
    /// Admin/API-looking paths plus everything with a query string.
    pub interesting_endpoints: Vec<String>,
}

/// Parse a CDX JSON body (possibly relay-wrapped) into rows.
pub fn parse_cdx_rows(body: &str) -> Result<Vec<Vec<Value>>, NormalizeError> {
    // An empty CDX result is an empty body, not `[]`.
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    recover_json(body)
}

/// Rows after the header mapped positionally to snapshots.
pub fn snapshots_from_rows(rows: &[Vec<Value>]) -> Vec<Snapshot> {
    rows.iter()
        .skip(1)
        .map(|row| {
            let timestamp = cell(row, 0);
            let original = cell(row, 1);
            Snapshot {
                archive_url: format!("https://web.archive.org/web/{timestamp}/{original}"),
                status_code: cell(row, 2),
                mimetype: cell(row, 3),
                length: cell(row, 4),
                timestamp,
                original,
            }
        })
        .collect()
}

/// Column 0 of every row after the header, in upstream order.
///
/// Repeats and blank cells are dropped; the first occurrence keeps its
/// position.
pub fn urls_from_rows(rows: &[Vec<Value>]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .skip(1)
        .map(|row| cell(row, 0))
        .filter(|url| !url.is_empty() && seen.insert(url.clone()))
        .collect()
}

/// Rank directories and classify `urls`.
pub fn summarize_urls(urls: &[String], top_n: usize) -> UrlListSummary {
    let mut order: Vec<DirectoryCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let mut with_query = BTreeSet::new();
    let mut documents = BTreeSet::new();
    let mut archives = BTreeSet::new();
    let mut config_or_data = BTreeSet::new();
    let mut interesting = BTreeSet::new();

    for raw in urls {
        let Some(parsed) = parse_archived(raw) else {
            continue;
        };

        let key = directory_key(parsed.path());
        match index.get(&key) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(key.clone(), order.len());
                order.push(DirectoryCount { path: key, count: 1 });
            },
        }

        if parsed.query().is_some_and(|q| !q.is_empty()) {
            with_query.insert(raw.clone());
            interesting.insert(raw.clone());
        }

        if let Some(ext) = extension(parsed.path()) {
            let ext = ext.as_str();
            if DOCUMENT_EXTENSIONS.contains(&ext) {
                documents.insert(raw.clone());
            } else if ARCHIVE_EXTENSIONS.contains(&ext) {
                archives.insert(raw.clone());
            } else if CONFIG_EXTENSIONS.contains(&ext) {
                config_or_data.insert(raw.clone());
            }
        }

        if INTERESTING_PATH.is_match(parsed.path()) {
            interesting.insert(raw.clone());
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(top_n);

    UrlListSummary {
        total: urls.len(),
        top_directories: order,
        with_query: with_query.into_iter().collect(),
        documents: documents.into_iter().collect(),
        archives: archives.into_iter().collect(),
        config_or_data: config_or_data.into_iter().collect(),
        interesting_endpoints: interesting.into_iter().collect(),
    }
}

fn cell(row: &[Value], idx: usize) -> String {
    match row.get(idx) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn parse_archived(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("http://{raw}")))
        .ok()
}

fn directory_key(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).take(2).collect();
    format!("/{}", segments.join("/"))
}

fn extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() || last.starts_with('.'))
        .then(|| ext.to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}
