//! Certificate transparency records to a hostname set.

use crate::recovery::{NormalizeError, recover_json};
use serde::Deserialize;
use std::collections::BTreeSet;

/// One crt.sh JSON row; only the name fields are used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CrtRecord {
    /// Newline-separated SAN entries.
    #[serde(default)]
    pub name_value: Option<String>,
    /// Certificate subject CN.
    #[serde(default)]
    pub common_name: Option<String>,
}

/// Parse a crt.sh body (possibly relay-wrapped) into records.
///
/// crt.sh answers an error object or an HTML page when overloaded; both are
/// rejected so the chain moves on.
pub fn parse_crt_records(body: &str) -> Result<Vec<CrtRecord>, NormalizeError> {
    recover_json(body)
}

/// Hostnames under `base`, lowercased, without wildcards, sorted and unique.
///
/// `base` itself is kept when present in the certificates.
pub fn normalize_subdomains(records: &[CrtRecord], base: &str) -> Vec<String> {
    let base = base.trim().to_lowercase();
    let suffix = format!(".{base}");

    let names = records.iter().flat_map(|record| {
        record
            .name_value
            .iter()
            .flat_map(|value| value.split('\n'))
            .chain(record.common_name.as_deref())
    });

    names
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty() && !name.contains('*'))
        .filter(|name| *name == base || name.ends_with(&suffix))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
