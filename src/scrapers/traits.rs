use crate::error::ScoutError;
use crate::models::{Listing, Region};
use crate::scrapers::types::{RenderedLink, SearchParams};
use anyhow::Result;
use async_trait::async_trait;

/// Source of marketplace listings, one page per region.
/// Implemented over HTTP in production and in memory in tests.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch a single page of listings for a region
    async fn fetch_page(&self, region: &Region, params: &SearchParams) -> Result<Vec<Listing>, ScoutError>;

    /// Get the name of the listing source
    fn source_name(&self) -> &'static str;
}

/// A stateful search page the region resolver types into.
///
/// One session is reused for a whole batch. Any error returned here is
/// treated as loss of the session.
pub trait SearchSession {
    /// Clear the search box, type `query` and submit it
    fn submit_query(&mut self, query: &str) -> Result<()>;

    /// Currently rendered result anchors
    fn rendered_links(&mut self) -> Result<Vec<RenderedLink>>;

    /// Empty the search box before the next query
    fn clear_input(&mut self) -> Result<()>;
}
