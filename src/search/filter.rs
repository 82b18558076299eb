use crate::models::Listing;
use chrono::{DateTime, FixedOffset};

/// Client-side listing filter. All checks must pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    /// Lowercase substrings that must all occur in title + body
    pub keywords: Vec<String>,
    pub min_price: i64,
    /// `0` means no upper bound
    pub max_price: i64,
    /// Earliest registration time, `None` for no constraint
    pub cutoff: Option<DateTime<FixedOffset>>,
    pub available_only: bool,
}

type Check = fn(&ListingFilter, &Listing) -> bool;

/// Checks in evaluation order
const CHECKS: [(&str, Check); 5] = [
    ("cutoff", ListingFilter::registered_in_window),
    ("keywords", ListingFilter::has_keywords),
    ("availability", ListingFilter::is_available),
    ("max_price", ListingFilter::under_max_price),
    ("min_price", ListingFilter::over_min_price),
];

impl ListingFilter {
    /// Split a comma-separated keyword list into trimmed lowercase terms
    pub fn parse_keywords(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.rejection(listing).is_none()
    }

    /// Name of the first failing check
    pub fn rejection(&self, listing: &Listing) -> Option<&'static str> {
        CHECKS
            .iter()
            .find(|(_, check)| !check(self, listing))
            .map(|(name, _)| *name)
    }

    // Listings without a parseable timestamp cannot be shown to be recent
    fn registered_in_window(&self, listing: &Listing) -> bool {
        match (self.cutoff, listing.created_at) {
            (None, _) => true,
            (Some(cutoff), Some(created)) => created >= cutoff,
            (Some(_), None) => false,
        }
    }

    fn has_keywords(&self, listing: &Listing) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let text = format!("{} {}", listing.title, listing.content).to_lowercase();
        self.keywords.iter().all(|kw| text.contains(kw.as_str()))
    }

    fn is_available(&self, listing: &Listing) -> bool {
        !(self.available_only && listing.is_sold())
    }

    fn under_max_price(&self, listing: &Listing) -> bool {
        match listing.price {
            Some(price) if self.max_price > 0 => price <= self.max_price,
            _ => true,
        }
    }

    fn over_min_price(&self, listing: &Listing) -> bool {
        listing.price.map_or(true, |price| price >= self.min_price)
    }
}
