use async_trait::async_trait;
use daangn_scout::error::ScoutError;
use daangn_scout::models::{parse_timestamp, Listing, ListingRow, Region};
use daangn_scout::scrapers::traits::ListingSource;
use daangn_scout::scrapers::types::SearchParams;
use daangn_scout::search::{run_search, ExecutionMode, ListingFilter, NullObserver, SearchObserver, SearchRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-memory listings keyed by region tag, with a per-region delay
#[derive(Default)]
struct FakeMarket {
    pages: HashMap<String, (u64, Vec<Listing>)>,
    broken: Vec<String>,
    calls: AtomicUsize,
}

impl FakeMarket {
    fn with_page(mut self, region: &Region, delay_ms: u64, listings: Vec<Listing>) -> Self {
        self.pages.insert(region.tag(), (delay_ms, listings));
        self
    }

    fn with_broken(mut self, region: &Region) -> Self {
        self.broken.push(region.tag());
        self
    }
}

#[async_trait]
impl ListingSource for FakeMarket {
    async fn fetch_page(&self, region: &Region, _params: &SearchParams) -> Result<Vec<Listing>, ScoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = region.tag();
        if self.broken.contains(&tag) {
            return Err(ScoutError::Decode { region: tag, message: "expected value at line 1".to_string() });
        }
        let (delay_ms, listings) = self.pages.get(&tag).cloned().unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

fn region(query: &str, name: &str, code: &str) -> Region {
    Region { query: query.to_string(), name: name.to_string(), code: code.to_string() }
}

fn listing(id: &str, title: &str, price: &str, status: &str) -> Listing {
    Listing {
        title: title.to_string(),
        content: "직거래 가능".to_string(),
        price: daangn_scout::models::parse_price(&serde_json::Value::String(price.to_string())),
        created_at: parse_timestamp("2024-05-01T10:00:00+09:00"),
        status: status.to_string(),
        href: format!("https://www.daangn.com/kr/buy-sell/{id}"),
        thumbnail: None,
        seller: "이웃".to_string(),
    }
}

fn hrefs(rows: &[ListingRow]) -> Vec<&str> {
    rows.iter().map(|r| r.listing.href.as_str()).collect()
}

fn three_regions() -> Vec<Region> {
    vec![
        region("서울특별시 강남구", "역삼동", "6035"),
        region("서울특별시 강남구", "삼성동", "6047"),
        region("부산광역시 해운대구", "우동", "100"),
    ]
}

fn market(regions: &[Region]) -> FakeMarket {
    // slower regions first so concurrent completion order is reversed
    FakeMarket::default()
        .with_page(&regions[0], 60, vec![listing("a", "노트북 게이밍", "900000", "Ongoing"), listing("shared", "노트북", "500000", "Ongoing")])
        .with_page(&regions[1], 30, vec![listing("shared", "노트북", "500000", "Ongoing"), listing("b", "노트북 가방", "나눔", "Closed")])
        .with_page(&regions[2], 0, vec![listing("c", "노트북 거치대", "15000.0", "Ongoing")])
}

#[tokio::test]
async fn shared_url_is_kept_once() {
    let regions = three_regions();
    let source = market(&regions);

    let report = run_search(
        &source,
        &regions,
        &SearchRequest::default(),
        ExecutionMode::Sequential,
        &CancellationToken::new(),
        &mut NullObserver,
    )
    .await;

    assert_eq!(hrefs(&report.rows).iter().filter(|h| h.ends_with("/shared")).count(), 1);
    assert_eq!(report.rows.len(), 4);
    // first region that returned it owns the row
    let shared = report.rows.iter().find(|r| r.listing.href.ends_with("/shared")).unwrap();
    assert_eq!(shared.region_name, "역삼동");
}

#[tokio::test]
async fn concurrent_and_sequential_agree() {
    let regions = three_regions();
    let request = SearchRequest {
        params: SearchParams::new("노트북", 1, 10),
        filter: ListingFilter { max_price: 600_000, ..ListingFilter::default() },
    };

    let sequential = run_search(
        &market(&regions),
        &regions,
        &request,
        ExecutionMode::Sequential,
        &CancellationToken::new(),
        &mut NullObserver,
    )
    .await;
    let concurrent = run_search(
        &market(&regions),
        &regions,
        &request,
        ExecutionMode::Concurrent(10),
        &CancellationToken::new(),
        &mut NullObserver,
    )
    .await;

    assert_eq!(sequential.rows, concurrent.rows);
    assert_eq!(
        hrefs(&sequential.rows),
        vec![
            "https://www.daangn.com/kr/buy-sell/shared",
            "https://www.daangn.com/kr/buy-sell/b",
            "https://www.daangn.com/kr/buy-sell/c",
        ]
    );
}

#[tokio::test]
async fn failed_region_is_skipped() {
    let regions = three_regions();
    let source = market(&regions).with_broken(&regions[1]);

    for mode in [ExecutionMode::Sequential, ExecutionMode::Concurrent(2)] {
        let report = run_search(
            &source,
            &regions,
            &SearchRequest::default(),
            mode,
            &CancellationToken::new(),
            &mut NullObserver,
        )
        .await;

        assert_eq!(report.completed, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.name, "삼성동");
        assert_eq!(hrefs(&report.rows).len(), 3);
        assert!(!report.cancelled);
    }
}

/// Cancels the run once `after` regions have completed
struct StopAfter {
    after: usize,
    token: CancellationToken,
    seen: Vec<usize>,
}

impl SearchObserver for StopAfter {
    fn region_done(&mut self, done: usize, _total: usize, distinct: usize) {
        self.seen.push(distinct);
        if done == self.after {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_keeps_fetched_rows() {
    let regions = three_regions();
    let source = market(&regions);
    let token = CancellationToken::new();
    let mut observer = StopAfter { after: 1, token: token.clone(), seen: Vec::new() };

    let report = run_search(
        &source,
        &regions,
        &SearchRequest::default(),
        ExecutionMode::Sequential,
        &token,
        &mut observer,
    )
    .await;

    assert!(report.cancelled);
    assert_eq!(report.completed, 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.rows.len(), 2);
    assert_eq!(observer.seen, vec![2]);
}

#[tokio::test]
async fn cancelling_pool_midway_keeps_fetched_rows() {
    let regions = three_regions();
    let source = market(&regions);
    let token = CancellationToken::new();
    let mut observer = StopAfter { after: 1, token: token.clone(), seen: Vec::new() };

    let report = run_search(
        &source,
        &regions,
        &SearchRequest::default(),
        ExecutionMode::Concurrent(1),
        &token,
        &mut observer,
    )
    .await;

    assert!(report.cancelled);
    assert_eq!(report.completed, 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        hrefs(&report.rows),
        vec!["https://www.daangn.com/kr/buy-sell/a", "https://www.daangn.com/kr/buy-sell/shared"]
    );
    assert_eq!(observer.seen, vec![2]);
}

#[tokio::test]
async fn pre_cancelled_pool_fetches_nothing() {
    let regions = three_regions();
    let source = market(&regions);
    let token = CancellationToken::new();
    token.cancel();

    let report = run_search(
        &source,
        &regions,
        &SearchRequest::default(),
        ExecutionMode::Concurrent(2),
        &token,
        &mut NullObserver,
    )
    .await;

    assert!(report.cancelled);
    assert!(report.rows.is_empty());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn filters_apply_per_listing() {
    let regions = three_regions();
    let request = SearchRequest {
        params: SearchParams::default(),
        filter: ListingFilter {
            keywords: ListingFilter::parse_keywords("노트북, 게이밍"),
            available_only: true,
            ..ListingFilter::default()
        },
    };

    let report = run_search(
        &market(&regions),
        &regions,
        &request,
        ExecutionMode::Concurrent(3),
        &CancellationToken::new(),
        &mut NullObserver,
    )
    .await;

    assert_eq!(hrefs(&report.rows), vec!["https://www.daangn.com/kr/buy-sell/a"]);
}
