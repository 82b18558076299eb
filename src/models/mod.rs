use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Seconds east of UTC for Korean Standard Time.
const SEOUL_UTC_OFFSET: i32 = 9 * 3600;

/// Operator clock offset (Asia/Seoul, no DST)
pub fn seoul() -> FixedOffset {
    FixedOffset::east_opt(SEOUL_UTC_OFFSET).unwrap_or_else(|| Utc.fix())
}

/// One row of the administrative address table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub legal_name: String,
    pub active: bool,
}

/// A legal name together with the search query derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    #[serde(rename = "법정동명")]
    pub legal_name: String,
    pub search_query: String,
}

/// A resolved region link for one search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMapping {
    #[serde(rename = "검색어")]
    pub query: String,
    pub region_name: String,
    pub region_code: String,
    pub link_text: String,
    pub link_href: String,
}

/// A searchable region: the query it was resolved from plus name and code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub query: String,
    pub name: String,
    pub code: String,
}

impl Region {
    /// The `<name>-<code>` tag the listings endpoint expects
    pub fn tag(&self) -> String {
        format!("{}-{}", self.name, self.code)
    }
}

impl From<&RegionMapping> for Region {
    fn from(mapping: &RegionMapping) -> Self {
        Self {
            query: mapping.query.clone(),
            name: mapping.region_name.clone(),
            code: mapping.region_code.clone(),
        }
    }
}

/// Marketplace listing as used by the filter pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub content: String,
    /// `None` when the remote price was not numeric
    pub price: Option<i64>,
    /// `None` when the remote timestamp could not be parsed
    pub created_at: Option<DateTime<FixedOffset>>,
    pub status: String,
    pub href: String,
    pub thumbnail: Option<String>,
    pub seller: String,
}

impl Listing {
    pub fn is_sold(&self) -> bool {
        self.status.eq_ignore_ascii_case("closed")
    }
}

/// A filtered listing tagged with the region it was found in
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub address: String,
    pub region_name: String,
    pub listing: Listing,
}

/// Parse a remote price the way the marketplace sends it: a numeric string
/// or a JSON number, fractional part truncated.
pub fn parse_price(value: &serde_json::Value) -> Option<i64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.trunc() as i64)
}

/// Parse `createdAt`. Offset-less timestamps are taken as Seoul local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| seoul().from_local_datetime(&naive).single())
}
