//! Output formatting and persistence for metrics bundles.
//!
//! Supports pretty-printing, JSON serialization, per-date CSV/JSON tables
//! (optionally gzip-compressed) and a CSV summary history.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::facts::{facts, render};
use crate::gtfs::ServiceTime;
use crate::metrics::{HeadwaySummary, MetricsBundle, RouteMetrics, StopActivity};

/// Logs a bundle using Rust's debug pretty-print format.
pub fn print_pretty(bundle: &MetricsBundle) {
    debug!("{:#?}", bundle);
}

/// Logs a bundle as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes every table of `bundle` into `<dir>/date=<YYYY-MM-DD>/`, returning
/// that directory. With `gzip`, each file is compressed and gets a `.gz`
/// suffix.
#[tracing::instrument(skip(bundle), fields(date = %bundle.date))]
pub fn write_bundle(dir: &Path, bundle: &MetricsBundle, facts_top_n: usize, gzip: bool) -> Result<PathBuf> {
    let date_dir = dir.join(format!("date={}", bundle.date.format("%Y-%m-%d")));
    fs::create_dir_all(&date_dir)
        .with_context(|| format!("Failed to create output directory {}", date_dir.display()))?;

    write_file(&date_dir, "metrics.json", &serde_json::to_vec_pretty(bundle)?, gzip)?;
    let routes = to_csv(ROUTE_COLUMNS, bundle.routes.iter().map(RouteRow::from))?;
    write_file(&date_dir, "routes.csv", &routes, gzip)?;
    let stops = to_csv(STOP_COLUMNS, bundle.stops.iter().map(StopRow::from))?;
    write_file(&date_dir, "stops.csv", &stops, gzip)?;
    write_file(&date_dir, "hours.csv", &to_csv(HOUR_COLUMNS, &bundle.trips_by_hour)?, gzip)?;
    write_file(&date_dir, "dayparts.csv", &to_csv(DAYPART_COLUMNS, &bundle.dayparts)?, gzip)?;
    write_file(&date_dir, "facts.txt", render(&facts(bundle, facts_top_n)).as_bytes(), gzip)?;

    info!(dir = %date_dir.display(), gzip, "Metrics written");
    Ok(date_dir)
}

fn write_file(dir: &Path, name: &str, contents: &[u8], gzip: bool) -> Result<()> {
    let (path, body) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents)?;
        (dir.join(format!("{name}.gz")), encoder.finish()?)
    } else {
        (dir.join(name), contents.to_vec())
    };
    fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), "File written");
    Ok(())
}

const ROUTE_COLUMNS: &[&str] = &[
    "route_id",
    "name",
    "route_type",
    "trips",
    "revenue_hours",
    "avg_trip_minutes",
    "first_departure",
    "last_departure",
    "span_hours",
    "headway_mean_min",
    "headway_median_min",
    "headway_stddev_min",
    "grade",
    "scheduled_headway_min",
];
const STOP_COLUMNS: &[&str] = &["stop_id", "name", "trips", "routes", "lat", "lon"];
const HOUR_COLUMNS: &[&str] = &["hour", "trips"];
const DAYPART_COLUMNS: &[&str] = &["name", "trips", "routes", "percent"];

/// Header first, even when there are no rows, so empty dates still give
/// readable tables. `header` must list the row struct's fields in order.
fn to_csv<I>(header: &[&str], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator,
    I::Item: Serialize,
{
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// One line of `routes.csv`.
#[derive(Serialize)]
struct RouteRow<'a> {
    route_id: &'a str,
    name: &'a str,
    route_type: &'a str,
    trips: usize,
    revenue_hours: f64,
    avg_trip_minutes: f64,
    first_departure: ServiceTime,
    last_departure: ServiceTime,
    span_hours: f64,
    headway_mean_min: Option<f64>,
    headway_median_min: Option<f64>,
    headway_stddev_min: Option<f64>,
    grade: Option<&'a str>,
    scheduled_headway_min: Option<f64>,
}

impl<'a> From<&'a RouteMetrics> for RouteRow<'a> {
    fn from(route: &'a RouteMetrics) -> Self {
        let (mean, median, stddev) = match &route.headway {
            HeadwaySummary::Measured {
                mean_min,
                median_min,
                stddev_min,
                ..
            } => (Some(*mean_min), Some(*median_min), Some(*stddev_min)),
            HeadwaySummary::InsufficientData { .. } => (None, None, None),
        };
        Self {
            route_id: route.route_id.as_str(),
            name: &route.name,
            route_type: &route.route_type,
            trips: route.trips,
            revenue_hours: route.revenue_hours,
            avg_trip_minutes: route.avg_trip_minutes,
            first_departure: route.span.first_departure,
            last_departure: route.span.last_departure,
            span_hours: route.span.hours,
            headway_mean_min: mean,
            headway_median_min: median,
            headway_stddev_min: stddev,
            grade: route.grade.as_deref(),
            scheduled_headway_min: route.scheduled_headway_min,
        }
    }
}

/// One line of `stops.csv`.
#[derive(Serialize)]
struct StopRow<'a> {
    stop_id: &'a str,
    name: &'a str,
    trips: usize,
    routes: usize,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl<'a> From<&'a StopActivity> for StopRow<'a> {
    fn from(stop: &'a StopActivity) -> Self {
        Self {
            stop_id: stop.stop_id.as_str(),
            name: &stop.name,
            trips: stop.trips,
            routes: stop.routes,
            lat: stop.position.map(|p| p.lat),
            lon: stop.position.map(|p| p.lon),
        }
    }
}

/// One analysed (feed, date) pair in the summary history.
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub date: NaiveDate,
    pub active_services: usize,
    pub active_routes: usize,
    pub active_stops: usize,
    pub trips: usize,
    pub revenue_hours: f64,
    pub span_hours: Option<f64>,
    pub peak_trips: usize,
    pub off_peak_trips: usize,
}

impl SummaryRow {
    pub fn from_bundle(source: &str, bundle: &MetricsBundle) -> Self {
        let system = &bundle.system;
        Self {
            timestamp: Utc::now(),
            source: source.to_string(),
            date: bundle.date,
            active_services: system.active_services,
            active_routes: system.active_routes,
            active_stops: system.active_stops,
            trips: system.qualifying_trips,
            revenue_hours: system.revenue_hours,
            span_hours: system.span.map(|s| s.hours),
            peak_trips: bundle.peak.peak_trips,
            off_peak_trips: bundle.peak.off_peak_trips,
        }
    }
}

/// Appends a [`SummaryRow`] to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summary(path: &Path, row: &SummaryRow) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending summary row");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::gtfs::GtfsFeed;
    use crate::gtfs::fixtures::sample_feed;
    use crate::metrics::compute_metrics;
    use flate2::read::GzDecoder;
    use std::env;
    use std::io::Read;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("gtfs_metrics_{}_{name}", std::process::id()))
    }

    fn monday_bundle() -> MetricsBundle {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        compute_metrics(
            &feed,
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            &AnalysisConfig::default(),
        )
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&monday_bundle());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&monday_bundle()).unwrap();
    }

    #[test]
    fn test_write_bundle_plain() {
        let dir = temp_path("plain");
        let _ = fs::remove_dir_all(&dir);

        let out = write_bundle(&dir, &monday_bundle(), 10, false).unwrap();
        assert!(out.ends_with("date=2024-01-08"));
        for name in ["metrics.json", "routes.csv", "stops.csv", "hours.csv", "dayparts.csv", "facts.txt"] {
            assert!(out.join(name).exists(), "{name} missing");
        }

        let routes = fs::read_to_string(out.join("routes.csv")).unwrap();
        let lines: Vec<&str> = routes.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("route_id,name,route_type,trips"));
        assert!(lines[1].starts_with("A,1 - Downtown,Bus,4"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("metrics.json")).unwrap()).unwrap();
        assert_eq!(json["routes"][1]["headway"]["status"], "insufficient_data");
        assert_eq!(json["system"]["span"]["last_departure"], "25:30:00");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_bundle_tables_keep_headers() {
        let dir = temp_path("empty");
        let _ = fs::remove_dir_all(&dir);

        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        let bundle = compute_metrics(&feed, sunday, &AnalysisConfig::default());
        assert!(bundle.is_empty());

        let out = write_bundle(&dir, &bundle, 10, false).unwrap();
        let routes = fs::read_to_string(out.join("routes.csv")).unwrap();
        assert_eq!(routes, format!("{}\n", ROUTE_COLUMNS.join(",")));
        let stops = fs::read_to_string(out.join("stops.csv")).unwrap();
        assert_eq!(stops, "stop_id,name,trips,routes,lat,lon\n");
        let hours = fs::read_to_string(out.join("hours.csv")).unwrap();
        assert_eq!(hours, "hour,trips\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    fn serde_header<T: Serialize>(row: T) -> String {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        text.lines().next().unwrap().to_string()
    }

    #[test]
    fn test_header_matches_serialized_fields() {
        let bundle = monday_bundle();
        assert_eq!(serde_header(RouteRow::from(&bundle.routes[0])), ROUTE_COLUMNS.join(","));
        assert_eq!(serde_header(StopRow::from(&bundle.stops[0])), STOP_COLUMNS.join(","));
        assert_eq!(serde_header(bundle.trips_by_hour[0]), HOUR_COLUMNS.join(","));
        assert_eq!(serde_header(&bundle.dayparts[0]), DAYPART_COLUMNS.join(","));
    }

    #[test]
    fn test_write_bundle_gzip() {
        let dir = temp_path("gzip");
        let _ = fs::remove_dir_all(&dir);

        let out = write_bundle(&dir, &monday_bundle(), 10, true).unwrap();
        assert!(!out.join("facts.txt").exists());
        let compressed = fs::read(out.join("facts.txt.gz")).unwrap();
        let mut text = String::new();
        GzDecoder::new(&compressed[..]).read_to_string(&mut text).unwrap();
        assert!(text.starts_with("date: 2024-01-08\n"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_append_summary_writes_header_once() {
        let path = temp_path("summary.csv");
        let _ = fs::remove_file(&path);

        let row = SummaryRow::from_bundle("sample.zip", &monday_bundle());
        append_summary(&path, &row).unwrap();
        append_summary(&path, &row).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        // 1 header + 2 data rows
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
        assert!(lines[1].contains("sample.zip,2024-01-08,1,2,3,5"));

        fs::remove_file(&path).unwrap();
    }
}
