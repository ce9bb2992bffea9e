//! CLI entry point for the GTFS metrics tool.
//!
//! Provides subcommands for analysing a static GTFS feed on one or more
//! service dates, validating a feed, listing active services, drilling into a
//! route and printing plain key/value facts.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use gtfs_metrics::{
    cache::MetricsCache,
    config::AnalysisConfig,
    facts::{facts, render},
    fetch::{BasicClient, HttpClient, auth::ApiKey, auth::UrlParam},
    gtfs::{GtfsFeed, RouteId},
    loader::{self, FeedSource},
    metrics::MetricsEngine,
    output::{SummaryRow, append_summary, print_json, print_pretty, write_bundle},
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_metrics")]
#[command(about = "A tool to compute descriptive metrics for GTFS static feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path to a GTFS zip or URL to fetch
    #[arg(value_name = "FILE_OR_URL")]
    source: String,

    /// Send the key from GTFS_API_KEY in this HTTP header
    #[arg(long, conflicts_with = "api_key_param")]
    api_key_header: Option<String>,

    /// Send the key from GTFS_API_KEY as this URL query parameter
    #[arg(long)]
    api_key_param: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics for one or more service dates
    Analyze {
        #[command(flatten)]
        source: SourceArgs,

        /// Service date (YYYY-MM-DD); repeat for several dates. Defaults to today
        #[arg(short, long = "date")]
        dates: Vec<NaiveDate>,

        /// JSON analysis config (falls back to GTFS_METRICS_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory to write per-date JSON/CSV tables into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Gzip compress written files
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// CSV file to append one summary row per date to
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Load, validate and parse a feed without computing metrics
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List the service ids active on a date
    Services {
        #[command(flatten)]
        source: SourceArgs,

        /// Service date (YYYY-MM-DD). Defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Show the detail of one route on a date
    Route {
        #[command(flatten)]
        source: SourceArgs,

        /// Route id as found in routes.txt
        route_id: String,

        /// Service date (YYYY-MM-DD). Defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// JSON analysis config (falls back to GTFS_METRICS_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print metrics as key/value facts
    Facts {
        #[command(flatten)]
        source: SourceArgs,

        /// Service date (YYYY-MM-DD). Defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// JSON analysis config (falls back to GTFS_METRICS_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of stops and hubs to list
        #[arg(short, long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_metrics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_metrics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            source,
            dates,
            config,
            output_dir,
            gzip,
            summary,
        } => {
            let config = load_config(config)?;
            let facts_top_n = config.facts_top_n;
            let mut engine = load_engine(&source, config).await?;
            let dates = if dates.is_empty() { vec![today()] } else { dates };

            for date in dates {
                let bundle = engine.analyze(date);
                if bundle.is_empty() {
                    warn!(%date, "No service runs on this date; writing an empty bundle");
                }
                print_pretty(&bundle);

                match &output_dir {
                    Some(dir) => {
                        write_bundle(dir, &bundle, facts_top_n, gzip)?;
                    }
                    None => print_json(&*bundle)?,
                }
                if let Some(path) = &summary {
                    append_summary(path, &SummaryRow::from_bundle(&engine.identity().source, &bundle))?;
                }
            }
        }
        Commands::Validate { source } => {
            let (feed, identity) = load_feed(&source).await?;
            for (table, crc) in &identity.checksums {
                info!(table = %table, crc = %format!("{crc:08x}"), "Table");
            }
            info!(
                source = %identity.source,
                agencies = feed.agencies.len(),
                routes = feed.routes.len(),
                stops = feed.stops.len(),
                trips = feed.trips.len(),
                services = feed.calendar.services.len(),
                "Feed is valid"
            );
        }
        Commands::Services { source, date } => {
            let (feed, _) = load_feed(&source).await?;
            let date = date.unwrap_or_else(today);
            let active = feed.calendar.active_services(date);
            info!(%date, count = active.len(), "Active services");
            for service_id in active {
                let rule = feed
                    .calendar
                    .services
                    .get(service_id)
                    .and_then(|service| service.weekly.as_ref())
                    .map(|w| format!("{} from {} to {}", w.days.describe(), w.start_date, w.end_date))
                    .unwrap_or_else(|| "calendar_dates only".to_string());
                info!(service_id = %service_id, rule = %rule, "Service");
            }
        }
        Commands::Route {
            source,
            route_id,
            date,
            config,
        } => {
            let engine = load_engine(&source, load_config(config)?).await?;
            let detail = engine.route_detail(&RouteId::new(route_id), date.unwrap_or_else(today))?;
            print_json(&detail)?;
        }
        Commands::Facts {
            source,
            date,
            config,
            top,
        } => {
            let config = load_config(config)?;
            let top_n = top.unwrap_or(config.facts_top_n);
            let mut engine = load_engine(&source, config).await?;
            let bundle = engine.analyze(date.unwrap_or_else(today));
            print!("{}", render(&facts(&bundle, top_n)));
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Reads the analysis config from `path`, then `GTFS_METRICS_CONFIG`, falling
/// back to the defaults.
fn load_config(path: Option<PathBuf>) -> Result<AnalysisConfig> {
    let path = path.or_else(|| std::env::var_os("GTFS_METRICS_CONFIG").map(PathBuf::from));
    match path {
        Some(path) => {
            let config = AnalysisConfig::load(&path)?;
            info!(path = %path.display(), "Analysis config loaded");
            Ok(config)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

/// Builds the HTTP client, stacking an API-key wrapper when requested.
fn http_client(args: &SourceArgs) -> Result<Box<dyn HttpClient>> {
    let api_key = || {
        std::env::var("GTFS_API_KEY").context("GTFS_API_KEY must be set to authenticate feed requests")
    };
    let client: Box<dyn HttpClient> = if let Some(header) = &args.api_key_header {
        Box::new(ApiKey::new(BasicClient::new(), header, &api_key()?)?)
    } else if let Some(param) = &args.api_key_param {
        Box::new(UrlParam::new(BasicClient::new(), param, &api_key()?)?)
    } else {
        Box::new(BasicClient::new())
    };
    Ok(client)
}

/// Retrieves, validates and parses the feed named by `args`.
#[tracing::instrument(skip_all, fields(source = %args.source))]
async fn load_feed(args: &SourceArgs) -> Result<(GtfsFeed, loader::FeedIdentity)> {
    let client = http_client(args)?;
    let source = FeedSource::parse(&args.source);
    let loaded = loader::load(&client, &source)
        .await
        .with_context(|| format!("Failed to load feed {source}"))?;
    let feed = GtfsFeed::parse(&loaded.extracted)
        .with_context(|| format!("Failed to parse feed {source}"))?;
    Ok((feed, loaded.identity))
}

async fn load_engine(args: &SourceArgs, config: AnalysisConfig) -> Result<MetricsEngine> {
    let (feed, identity) = load_feed(args).await?;
    Ok(MetricsEngine::new(feed, identity, config, MetricsCache::new()))
}
