use chrono::{DateTime, FixedOffset, Months, TimeDelta};
use serde::{Deserialize, Serialize};

pub const MAX_PAGE: u32 = 100;
pub const MAX_PER_PAGE: u32 = 100;

/// Query parameters for one listings page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text item query
    pub query: String,
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page
    pub limit: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            page: 1,
            limit: 10,
        }
    }
}

impl SearchParams {
    /// Build params with page and limit clamped to the accepted 1..=100 range
    pub fn new(query: impl Into<String>, page: u32, limit: u32) -> Self {
        Self {
            query: query.into(),
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, MAX_PER_PAGE),
        }
    }
}

/// Relative registration window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum DateWindow {
    #[default]
    #[value(name = "all")]
    All,
    #[value(name = "1d")]
    Day,
    #[value(name = "7d")]
    Week,
    #[value(name = "1m")]
    Month,
    #[value(name = "3m")]
    ThreeMonths,
    #[value(name = "6m")]
    SixMonths,
    #[value(name = "1y")]
    Year,
}

impl DateWindow {
    /// Earliest eligible registration time, or `None` for no constraint
    pub fn cutoff(self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::All => None,
            Self::Day => now.checked_sub_signed(TimeDelta::days(1)),
            Self::Week => now.checked_sub_signed(TimeDelta::days(7)),
            Self::Month => now.checked_sub_months(Months::new(1)),
            Self::ThreeMonths => now.checked_sub_months(Months::new(3)),
            Self::SixMonths => now.checked_sub_months(Months::new(6)),
            Self::Year => now.checked_sub_months(Months::new(12)),
        }
    }
}

/// One anchor of the rendered region search results
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedLink {
    pub text: String,
    pub href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_clamped() {
        let params = SearchParams::new("노트북", 0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 100);
    }

    #[test]
    fn month_windows_are_calendar_months() {
        let now = DateTime::parse_from_rfc3339("2024-03-31T12:00:00+09:00").unwrap();
        assert_eq!(DateWindow::All.cutoff(now), None);
        assert_eq!(
            DateWindow::Month.cutoff(now),
            Some(DateTime::parse_from_rfc3339("2024-02-29T12:00:00+09:00").unwrap())
        );
        assert_eq!(
            DateWindow::Year.cutoff(now),
            Some(DateTime::parse_from_rfc3339("2023-03-31T12:00:00+09:00").unwrap())
        );
        assert_eq!(
            DateWindow::Week.cutoff(now),
            Some(DateTime::parse_from_rfc3339("2024-03-24T12:00:00+09:00").unwrap())
        );
    }
}
