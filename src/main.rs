use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use daangn_scout::address;
use daangn_scout::config::{load_config, AppConfig};
use daangn_scout::error::ScoutError;
use daangn_scout::export::{read_records, render, write_records, write_results, View};
use daangn_scout::models::{seoul, NormalizedAddress, Region};
use daangn_scout::regions::{RegionCatalog, RegionSelection};
use daangn_scout::resolver::{resolve_batch, SystemClock};
use daangn_scout::scrapers::types::{DateWindow, SearchParams};
use daangn_scout::scrapers::{ChromeSession, DaangnClient};
use daangn_scout::search::{run_search, ExecutionMode, ListingFilter, SearchObserver, SearchRequest};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resolve Daangn region codes and search listings by region")]
struct Cli {
    /// Config file (defaults to ./daangn-scout.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn the address table into unique search queries
    Normalize(NormalizeArgs),
    /// Resolve search queries into region codes with a browser
    Resolve(ResolveArgs),
    /// Search listings in resolved regions
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Tab-separated address table (CP949)
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Normalized query file
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, default_value_t = false)]
    headful: bool,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Item to look for (e.g. 노트북)
    #[arg(default_value = "")]
    item: String,

    /// Region code file
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Search every resolved region
    #[arg(long, default_value_t = false)]
    nationwide: bool,

    /// Major area to include (repeatable; defaults to the first three)
    #[arg(long = "major")]
    majors: Vec<String>,

    /// Exact region query to include (repeatable; defaults to all in the majors)
    #[arg(long = "area")]
    areas: Vec<String>,

    /// Comma-separated keywords that must all appear in title + body
    #[arg(short, long, default_value = "")]
    keywords: String,

    /// Only listings registered within this window
    #[arg(long, value_enum, default_value_t = DateWindow::All)]
    period: DateWindow,

    /// Hide sold listings
    #[arg(long, default_value_t = false)]
    available_only: bool,

    #[arg(long, default_value_t = 0)]
    min_price: i64,

    /// 0 means no limit
    #[arg(long, default_value_t = 0)]
    max_price: i64,

    /// Items per page (1-100)
    #[arg(long)]
    limit: Option<u32>,

    /// Page number (1-100)
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Fetch regions through the worker pool
    #[arg(long, default_value_t = false)]
    parallel: bool,

    #[arg(long, value_enum, default_value_t = View::Table)]
    view: View,

    /// Results CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Logs search progress as regions complete
struct LogObserver;

impl SearchObserver for LogObserver {
    fn region_done(&mut self, done: usize, total: usize, distinct: usize) {
        info!("[{}/{}] {} listings so far", done, total, distinct);
    }

    fn region_failed(&mut self, region: &Region, error: &ScoutError) {
        warn!("❌ {} ({}): {}", region.query, region.name, error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!("🥕 Daangn Scout");
    info!("==========================================");

    let cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Normalize(args) => normalize(&cfg, args),
        Command::Resolve(args) => resolve(&cfg, args).await,
        Command::Search(args) => search(&cfg, args).await,
    }
}

fn normalize(cfg: &AppConfig, args: NormalizeArgs) -> Result<()> {
    let input = args.input.unwrap_or_else(|| cfg.files.address_table.clone());
    let output = args.output.unwrap_or_else(|| cfg.files.queries.clone());

    let records = address::read_address_table(&input)?;
    let normalized = address::normalize(&records);
    write_records(&output, &normalized)
}

async fn resolve(cfg: &AppConfig, args: ResolveArgs) -> Result<()> {
    let input = args.input.unwrap_or_else(|| cfg.files.queries.clone());
    let output = args.output.unwrap_or_else(|| cfg.files.region_codes.clone());

    let queries: Vec<String> = read_records::<NormalizedAddress>(&input)?
        .into_iter()
        .map(|a| a.search_query)
        .collect();
    info!("Resolving {} queries from {}", queries.len(), input.display());

    let mut resolver_cfg = cfg.resolver.clone();
    if args.headful {
        resolver_cfg.headless = false;
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    // The browser session is blocking and single-threaded
    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut session = ChromeSession::launch(&resolver_cfg)?;
        Ok(resolve_batch(&mut session, &SystemClock, &resolver_cfg, &queries, &cancel))
    })
    .await
    .context("Resolver task panicked")??;

    write_records(&output, &report.mappings)?;
    info!(
        "✅ Resolved {} queries into {} region rows ({} timed out)",
        report.processed,
        report.mappings.len(),
        report.timed_out.len()
    );
    for query in &report.timed_out {
        warn!("Incomplete: {}", query);
    }

    if let Some(e) = report.aborted {
        return Err(e.context(format!(
            "Browser session lost; {} rows resolved so far were saved to {}",
            report.mappings.len(),
            output.display()
        )));
    }
    Ok(())
}

async fn search(cfg: &AppConfig, args: SearchArgs) -> Result<()> {
    let regions_path = args.regions.unwrap_or_else(|| cfg.files.region_codes.clone());
    let output = args.output.unwrap_or_else(|| cfg.files.results.clone());

    let catalog = RegionCatalog::load(&regions_path)?;
    let selection = if args.nationwide {
        RegionSelection::Nationwide
    } else {
        RegionSelection::regional(args.majors, args.areas)
    };
    let regions = catalog.select(&selection);
    if regions.is_empty() {
        warn!("No regions match the selection");
        return Ok(());
    }

    let now = Utc::now().with_timezone(&seoul());
    let request = SearchRequest {
        params: SearchParams::new(args.item, args.page, args.limit.unwrap_or(cfg.search.per_page)),
        filter: ListingFilter {
            keywords: ListingFilter::parse_keywords(&args.keywords),
            min_price: args.min_price,
            max_price: args.max_price,
            cutoff: args.period.cutoff(now),
            available_only: args.available_only,
        },
    };
    let mode = if args.parallel {
        ExecutionMode::Concurrent(cfg.search.concurrency)
    } else {
        ExecutionMode::Sequential
    };

    let client = DaangnClient::new(cfg.http.clone())?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = run_search(&client, &regions, &request, mode, &cancel, &mut LogObserver).await;

    if report.rows.is_empty() {
        info!("No listings matched");
        return Ok(());
    }

    render(std::io::stdout().lock(), &report.rows, args.view)?;
    write_results(&output, &report.rows)?;
    info!("✅ {} listings found", report.rows.len());
    Ok(())
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Stop requested, finishing the current unit of work...");
            token.cancel();
        }
    });
}
