//! Region code resolution.
//!
//! Each query is typed into the marketplace's location search, the rendered
//! result list is polled until it reflects the query (or a timeout passes),
//! and every result link carrying an `in=<name>-<digits>` segment becomes a
//! [`RegionMapping`].

use crate::config::ResolverConfig;
use crate::error::ScoutError;
use crate::models::RegionMapping;
use crate::scrapers::traits::SearchSession;
use crate::scrapers::types::RenderedLink;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

static REGION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"in=[^/]+-(\d+)").expect("region code pattern is valid"));

/// Time source for the polling loop
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Terminal state of a polling loop. Both carry the last fetched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Matched(T),
    TimedOut(T),
}

impl<T> PollOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Matched(v) | Self::TimedOut(v) => v,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Fetch, check, sleep; repeat while less than `timeout` has elapsed.
///
/// Fetch errors are returned as-is. A zero timeout never fetches.
pub fn poll_until<T, C, F, P>(
    clock: &C,
    interval: Duration,
    timeout: Duration,
    mut fetch: F,
    is_match: P,
) -> Result<PollOutcome<T>>
where
    T: Default,
    C: Clock + ?Sized,
    F: FnMut() -> Result<T>,
    P: Fn(&T) -> bool,
{
    let start = clock.now();
    let mut last = T::default();

    while clock.now().duration_since(start) < timeout {
        last = fetch()?;
        if is_match(&last) {
            return Ok(PollOutcome::Matched(last));
        }
        clock.sleep(interval);
    }

    Ok(PollOutcome::TimedOut(last))
}

/// Token that must show up in the results: the second word of the query, else the first
pub fn check_token(query: &str) -> Option<&str> {
    let mut tokens = query.split_whitespace();
    let first = tokens.next()?;
    Some(tokens.next().unwrap_or(first))
}

/// Numeric region code of a result link, if the link carries one
pub fn extract_region_code(href: &str) -> Option<&str> {
    REGION_CODE
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Region name shown after the last comma of the link text
pub fn region_name(text: &str) -> &str {
    text.rsplit(',').next().unwrap_or(text).trim()
}

/// Turn rendered links into mappings, dropping links without a code
pub fn parse_mappings(query: &str, links: &[RenderedLink]) -> Vec<RegionMapping> {
    links
        .iter()
        .filter_map(|link| {
            let Some(code) = extract_region_code(&link.href) else {
                debug!("Dropping link without region code: {}", link.href);
                return None;
            };
            Some(RegionMapping {
                query: query.to_string(),
                region_name: region_name(&link.text).to_string(),
                region_code: code.to_string(),
                link_text: link.text.clone(),
                link_href: link.href.clone(),
            })
        })
        .collect()
}

/// Result of resolving one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResolution {
    pub mappings: Vec<RegionMapping>,
    pub timed_out: bool,
}

/// Resolve one query on an open session.
///
/// A timeout is not an error: whatever was rendered last is parsed.
/// Session errors are returned and end the batch.
pub fn resolve_query<S, C>(
    session: &mut S,
    clock: &C,
    cfg: &ResolverConfig,
    query: &str,
) -> Result<QueryResolution>
where
    S: SearchSession + ?Sized,
    C: Clock + ?Sized,
{
    let Some(token) = check_token(query) else {
        warn!("Skipping empty region query");
        return Ok(QueryResolution { mappings: Vec::new(), timed_out: false });
    };

    session
        .submit_query(query)
        .with_context(|| format!("Failed to submit region query {query:?}"))?;

    let outcome = poll_until(
        clock,
        cfg.poll_interval(),
        cfg.poll_timeout(),
        || session.rendered_links(),
        |links: &Vec<RenderedLink>| links.iter().any(|l| l.text.contains(token)),
    )
    .with_context(|| format!("Failed to read results for {query:?}"))?;

    let timed_out = outcome.is_timed_out();
    if timed_out {
        warn!("[!] Incomplete results (timeout): {}", query);
    }

    let mappings = parse_mappings(query, &outcome.into_inner());
    debug!("{} -> {} region links", query, mappings.len());

    session
        .clear_input()
        .with_context(|| format!("Failed to clear input after {query:?}"))?;
    clock.sleep(cfg.settle_delay());

    Ok(QueryResolution { mappings, timed_out })
}

/// Outcome of a resolver batch
#[derive(Debug, Default)]
pub struct ResolveReport {
    pub mappings: Vec<RegionMapping>,
    pub timed_out: Vec<String>,
    pub processed: usize,
    pub cancelled: bool,
    /// Set when the session was lost; `mappings` holds what was resolved before
    pub aborted: Option<anyhow::Error>,
}

/// Resolve queries one after another on a single session.
///
/// Cancellation is checked before each query. The first session error stops
/// the batch and is kept in [`ResolveReport::aborted`].
pub fn resolve_batch<S, C>(
    session: &mut S,
    clock: &C,
    cfg: &ResolverConfig,
    queries: &[String],
    cancel: &CancellationToken,
) -> ResolveReport
where
    S: SearchSession + ?Sized,
    C: Clock + ?Sized,
{
    let mut report = ResolveReport::default();

    for (idx, query) in queries.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Resolution cancelled after {} of {} queries", idx, queries.len());
            report.cancelled = true;
            break;
        }

        match resolve_query(session, clock, cfg, query) {
            Ok(resolution) => {
                if resolution.timed_out {
                    report.timed_out.push(query.clone());
                }
                report.mappings.extend(resolution.mappings);
                report.processed += 1;
            }
            Err(e) => {
                report.aborted = Some(e.context(ScoutError::Session(query.clone())));
                break;
            }
        }

        info!("[{}/{}] {}", idx + 1, queries.len(), query);
    }

    report
}
