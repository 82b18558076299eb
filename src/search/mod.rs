//! Listing search across resolved regions.
//!
//! One page is fetched per region, filtered with [`ListingFilter`] and merged
//! into a result set deduplicated by listing URL. Regions run one at a time or
//! through a bounded worker pool; either way the final rows are merged in
//! region order, so both modes return the same set for the same data.

pub mod filter;

pub use filter::ListingFilter;

use crate::error::ScoutError;
use crate::models::{ListingRow, Region};
use crate::scrapers::traits::ListingSource;
use crate::scrapers::types::SearchParams;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How region fetches are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    /// At most this many fetches in flight
    Concurrent(usize),
}

/// Everything a search needs besides the regions
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub params: SearchParams,
    pub filter: ListingFilter,
}

/// Receives progress as regions complete
pub trait SearchObserver: Send {
    /// Called after each region with the number of distinct listings so far
    fn region_done(&mut self, _done: usize, _total: usize, _distinct: usize) {}

    /// Called when a region's fetch failed
    fn region_failed(&mut self, _region: &Region, _error: &ScoutError) {}
}

/// A no-op observer
#[derive(Debug, Default)]
pub struct NullObserver;
impl SearchObserver for NullObserver {}

/// Outcome of a search batch
#[derive(Debug, Default)]
pub struct SearchReport {
    pub rows: Vec<ListingRow>,
    pub total: usize,
    pub completed: usize,
    pub failed: Vec<(Region, String)>,
    pub cancelled: bool,
}

/// Per-region results, merged in region order
#[derive(Debug)]
pub struct Collector {
    slots: Vec<Option<Vec<ListingRow>>>,
    urls: HashSet<String>,
}

impl Collector {
    pub fn new(regions: usize) -> Self {
        Self { slots: vec![None; regions], urls: HashSet::new() }
    }

    pub fn insert(&mut self, index: usize, rows: Vec<ListingRow>) {
        if let Some(slot) = self.slots.get_mut(index) {
            self.urls.extend(rows.iter().map(|row| row.listing.href.clone()));
            *slot = Some(rows);
        }
    }

    /// Distinct listing URLs inserted so far
    pub fn distinct(&self) -> usize {
        self.urls.len()
    }

    /// Completed rows in region order, first occurrence of each URL kept
    pub fn rows(&self) -> Vec<ListingRow> {
        let mut seen = HashSet::new();
        self.slots
            .iter()
            .flatten()
            .flatten()
            .filter(|row| seen.insert(row.listing.href.as_str()))
            .cloned()
            .collect()
    }
}

/// Fetch one region and keep the listings that pass the filter
pub async fn fetch_region<S>(source: &S, region: &Region, request: &SearchRequest) -> Result<Vec<ListingRow>, ScoutError>
where
    S: ListingSource + ?Sized,
{
    let listings = source.fetch_page(region, &request.params).await?;
    let fetched = listings.len();

    let rows: Vec<ListingRow> = listings
        .into_iter()
        .filter(|listing| match request.filter.rejection(listing) {
            Some(check) => {
                debug!("{} rejected by {}", listing.href, check);
                false
            }
            None => true,
        })
        .map(|listing| ListingRow {
            address: region.query.clone(),
            region_name: region.name.clone(),
            listing,
        })
        .collect();

    debug!("{}: kept {} of {} listings", region.tag(), rows.len(), fetched);
    Ok(rows)
}

struct Batch<'r, 'o> {
    regions: &'r [Region],
    collector: Collector,
    report: SearchReport,
    observer: &'o mut dyn SearchObserver,
}

impl<'r, 'o> Batch<'r, 'o> {
    fn new(regions: &'r [Region], observer: &'o mut dyn SearchObserver) -> Self {
        Self {
            regions,
            collector: Collector::new(regions.len()),
            report: SearchReport { total: regions.len(), ..SearchReport::default() },
            observer,
        }
    }

    fn absorb(&mut self, index: usize, outcome: Result<Vec<ListingRow>, ScoutError>) {
        let region = &self.regions[index];
        match outcome {
            Ok(rows) => self.collector.insert(index, rows),
            Err(e) => {
                warn!("Skipping {}: {}", region.tag(), e);
                self.observer.region_failed(region, &e);
                self.report.failed.push((region.clone(), e.to_string()));
            }
        }
        self.report.completed += 1;
        self.observer
            .region_done(self.report.completed, self.report.total, self.collector.distinct());
    }

    fn finish(mut self, cancelled: bool) -> SearchReport {
        self.report.rows = self.collector.rows();
        self.report.cancelled = cancelled && self.report.completed < self.report.total;
        self.report
    }
}

/// Search every region with the given mode.
///
/// A failed region is logged and skipped. Cancellation is checked before each
/// fetch starts and after each completes; rows already merged are kept.
pub async fn run_search<S>(
    source: &S,
    regions: &[Region],
    request: &SearchRequest,
    mode: ExecutionMode,
    cancel: &CancellationToken,
    observer: &mut dyn SearchObserver,
) -> SearchReport
where
    S: ListingSource + ?Sized,
{
    info!(
        "Searching {} regions on {} for {:?} ({:?})",
        regions.len(),
        source.source_name(),
        request.params.query,
        mode
    );

    let mut batch = Batch::new(regions, observer);

    let cancelled = match mode {
        ExecutionMode::Sequential => {
            let mut cancelled = false;
            for (index, region) in regions.iter().enumerate() {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let outcome = fetch_region(source, region, request).await;
                batch.absorb(index, outcome);
            }
            cancelled
        }
        ExecutionMode::Concurrent(workers) => {
            let mut pending = stream::iter(regions.iter().enumerate())
                .map(|(index, region)| async move {
                    if cancel.is_cancelled() {
                        return (index, None);
                    }
                    (index, Some(fetch_region(source, region, request).await))
                })
                .buffer_unordered(workers.max(1));

            let mut cancelled = false;
            while let Some((index, outcome)) = pending.next().await {
                if let Some(outcome) = outcome {
                    batch.absorb(index, outcome);
                }
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
            }
            cancelled
        }
    };

    let report = batch.finish(cancelled);
    if report.cancelled {
        info!("Search stopped after {} of {} regions", report.completed, report.total);
    }
    info!(
        "✅ {} listings from {} regions ({} failed)",
        report.rows.len(),
        report.completed,
        report.failed.len()
    );
    report
}
