//! ISC/DShield top-ports feed.
//!
//! The feed answers an object keyed by rank (`"0"`, `"1"`, ...) next to
//! metadata keys such as `limit` and `date`; some mirrors answer a plain
//! array. Counts arrive as numbers or numeric strings.

use crate::recovery::{NormalizeError, recover_json};
use serde::Serialize;
use serde_json::Value;

/// Report volume for one destination port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStat {
    /// Destination port.
    pub port: u16,
    /// Firewall log records.
    pub records: u64,
    /// Distinct targets hit.
    pub targets: u64,
    /// Distinct sources seen.
    pub sources: u64,
}

/// Parse the feed into stats sorted by `records` descending, capped at `limit`.
///
/// Entries without a usable port are skipped.
pub fn parse_top_ports(body: &str, limit: usize) -> Result<Vec<PortStat>, NormalizeError> {
    let value: Value = recover_json(body)?;

    let entries: Vec<&Value> = match &value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().filter(|v| v.is_object()).collect(),
        _ => {
            return Err(NormalizeError::Rejected(
                "top ports feed is neither an object nor an array".to_string(),
            ));
        },
    };

    let mut stats: Vec<PortStat> = entries.into_iter().filter_map(port_stat).collect();
    stats.sort_by(|a, b| b.records.cmp(&a.records).then(a.port.cmp(&b.port)));
    stats.truncate(limit);
    Ok(stats)
}

fn port_stat(entry: &Value) -> Option<PortStat> {
    let port = count(entry.get("targetport").or_else(|| entry.get("port"))?)?;
    Some(PortStat {
        port: u16::try_from(port).ok()?,
        records: entry.get("records").and_then(count).unwrap_or_default(),
        targets: entry.get("targets").and_then(count).unwrap_or_default(),
        sources: entry.get("sources").and_then(count).unwrap_or_default(),
    })
}

fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
