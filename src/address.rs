use crate::models::{AddressRecord, NormalizedAddress};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

const NAME_COLUMN: &str = "법정동명";
const STATUS_COLUMN: &str = "폐지여부";
const ACTIVE_STATUS: &str = "존재";

/// The one special municipality searched by its own name
const SEJONG: &str = "세종특별자치시";
const METRO_SUFFIXES: [&str; 2] = ["광역시", "특별시"];
const NEIGHBORHOOD_SUFFIXES: [&str; 4] = ["동", "읍", "면", "가"];
const DISTRICT_SUFFIXES: [&str; 2] = ["구", "군"];

/// Legacy administrative names, applied in order
const LEGACY_RENAMES: [(&str, &str); 3] = [
    ("직할", "광역"),
    ("울산시", "울산광역시"),
    ("전북특별자치도", "전라북도"),
];

/// Read the government address table (tab separated, CP949)
pub fn read_address_table(path: &Path) -> Result<Vec<AddressRecord>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read address table {}", path.display()))?;

    let (text, _, had_errors) = encoding_rs::EUC_KR.decode(&bytes);
    if had_errors {
        warn!("Address table {} contains bytes outside CP949", path.display());
    }

    parse_address_table(&text)
}

/// Parse already-decoded table text
pub fn parse_address_table(text: &str) -> Result<Vec<AddressRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("Address table has no header row")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .with_context(|| format!("Address table is missing the {name} column"))
    };
    let name_idx = column(NAME_COLUMN)?;
    let status_idx = column(STATUS_COLUMN)?;

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Malformed address row {}", line + 2))?;
        let Some(name) = row.get(name_idx) else {
            debug!("Skipping short address row {}", line + 2);
            continue;
        };
        records.push(AddressRecord {
            legal_name: name.trim().to_string(),
            active: row.get(status_idx).map(str::trim) == Some(ACTIVE_STATUS),
        });
    }

    Ok(records)
}

/// Rewrite legacy administrative unit names
pub fn rename_legacy(name: &str) -> String {
    LEGACY_RENAMES
        .iter()
        .fold(name.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Derive the search query for a legal name.
///
/// Returns `None` for names without any tokens.
pub fn derive_query(name: &str) -> Option<String> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let first = *tokens.first()?;

    let take = if first == SEJONG {
        1
    } else if METRO_SUFFIXES.iter().any(|s| first.ends_with(s)) {
        2
    } else {
        match tokens.get(2) {
            Some(third) if NEIGHBORHOOD_SUFFIXES.iter().any(|s| third.ends_with(s)) => 2,
            Some(third) if DISTRICT_SUFFIXES.iter().any(|s| third.ends_with(s)) => 3,
            _ => 3,
        }
    };

    Some(tokens[..take.min(tokens.len())].join(" "))
}

/// Keep active rows, rename, derive queries and drop duplicate queries.
/// The first legal name seen for a query is the one kept.
pub fn normalize(records: &[AddressRecord]) -> Vec<NormalizedAddress> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for record in records.iter().filter(|r| r.active) {
        let legal_name = rename_legacy(&record.legal_name);
        let Some(search_query) = derive_query(&legal_name) else {
            debug!("Skipping empty legal name");
            continue;
        };
        if seen.insert(search_query.clone()) {
            out.push(NormalizedAddress { legal_name, search_query });
        }
    }

    info!(
        "Normalized {} address rows into {} unique queries",
        records.len(),
        out.len()
    );
    out
}
