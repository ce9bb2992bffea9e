//! Typed GTFS tables.
//!
//! [`GtfsFeed::parse`] turns the raw tables of an [`ExtractedFeed`] into one
//! structured bundle. Required tables must parse cleanly; optional tables are
//! skipped when absent but still rejected when present and malformed.

mod agency;
pub mod calendar;
mod frequencies;
mod ids;
mod routes;
mod shapes;
mod stops;
pub mod time;
mod trips;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use csv::StringRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

pub use agency::Agency;
pub use calendar::{Calendar, DaysOfWeek, Service, WeeklyRule};
pub use frequencies::Frequency;
pub use ids::{RouteId, ServiceId, ShapeId, StopId, TripId};
pub use routes::{Route, RouteType};
pub use stops::Stop;
pub use time::ServiceTime;
pub use trips::{StopTime, Trip};

/// A WGS84 coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Default)]
pub struct GtfsFeed {
    pub agencies: Vec<Agency>,
    pub stops: BTreeMap<StopId, Stop>,
    pub routes: BTreeMap<RouteId, Route>,
    /// Every trip has at least one stop time, sorted by `stop_sequence`.
    pub trips: BTreeMap<TripId, Trip>,
    pub calendar: Calendar,
    /// Empty when `shapes.txt` is absent.
    pub shapes: BTreeMap<ShapeId, Vec<LatLon>>,
    /// Empty when `frequencies.txt` is absent.
    pub frequencies: BTreeMap<TripId, Vec<Frequency>>,
}

impl GtfsFeed {
    #[tracing::instrument(skip_all)]
    pub fn parse(feed: &ExtractedFeed) -> Result<Self, FeedError> {
        let agencies = agency::load(feed)?;
        let stops = stops::load(feed)?;
        let routes = routes::load(feed)?;
        let calendar = calendar::load(feed)?;
        let trips = trips::load(feed, &routes, &stops, &calendar)?;
        let shapes = shapes::load(feed)?;
        let frequencies = frequencies::load(feed, &trips)?;

        info!(
            agencies = agencies.len(),
            stops = stops.len(),
            routes = routes.len(),
            trips = trips.len(),
            services = calendar.services.len(),
            shapes = shapes.len(),
            frequency_trips = frequencies.len(),
            "GTFS feed parsed"
        );

        Ok(Self {
            agencies,
            stops,
            routes,
            trips,
            calendar,
            shapes,
            frequencies,
        })
    }

    /// Trips whose service runs on `date`, in trip id order.
    pub fn active_trips(&self, date: NaiveDate) -> impl Iterator<Item = &Trip> {
        let services = self.calendar.active_services(date);
        self.trips
            .values()
            .filter(move |trip| services.contains(&trip.service_id))
    }
}

/// A deserialised row together with its 1-based line in the source file.
pub(crate) struct Row<T> {
    pub line: u64,
    pub record: T,
}

/// Reads every row of `table`, or `None` when the table is absent.
///
/// Headers and fields are trimmed, required columns are checked before any
/// row is read, and deserialisation errors are reported against the column
/// that failed.
pub(crate) fn read_table<T: DeserializeOwned>(
    feed: &ExtractedFeed,
    table: Table,
) -> Result<Option<Vec<Row<T>>>, FeedError> {
    let Some(data) = feed.table(table) else {
        return Ok(None);
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);
    let headers = rdr
        .headers()
        .map_err(|e| csv_error(table, None, e))?
        .clone();

    for column in table.required_columns() {
        if !headers.iter().any(|h| h == *column) {
            return Err(FeedError::MissingColumn {
                table: table.name().to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(table, Some(&headers), e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let parsed: T = record
            .deserialize(Some(&headers))
            .map_err(|e| csv_error_at(table, &headers, line, e))?;
        rows.push(Row {
            line,
            record: parsed,
        });
    }
    Ok(Some(rows))
}

/// Like [`read_table`], but an absent table is a validation failure.
pub(crate) fn read_required<T: DeserializeOwned>(
    feed: &ExtractedFeed,
    table: Table,
) -> Result<Vec<Row<T>>, FeedError> {
    read_table(feed, table)?.ok_or_else(|| FeedError::MissingTables {
        missing: vec![table.name().to_string()],
    })
}

fn csv_error(table: Table, headers: Option<&StringRecord>, err: csv::Error) -> FeedError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match headers {
        Some(headers) => csv_error_at(table, headers, line, err),
        None => FeedError::parse(table.name(), "(header)", line, err),
    }
}

fn csv_error_at(table: Table, headers: &StringRecord, line: u64, err: csv::Error) -> FeedError {
    match err.kind() {
        csv::ErrorKind::Deserialize { err: de, .. } => {
            let column = de
                .field()
                .and_then(|i| headers.get(i as usize))
                .unwrap_or("(row)");
            FeedError::parse(table.name(), column, line, de)
        }
        _ => FeedError::parse(table.name(), "(row)", line, &err),
    }
}

/// Parses a GTFS `YYYYMMDD` date found at `table.column` on `line`.
pub(crate) fn parse_date(table: Table, column: &str, line: u64, value: &str) -> Result<NaiveDate, FeedError> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map_err(|e| FeedError::parse(table.name(), column, line, format!("invalid date {value:?}: {e}")))
}

/// Parses an optional GTFS time found at `table.column` on `line`; an empty
/// field is `None`.
pub(crate) fn parse_time(
    table: Table,
    column: &str,
    line: u64,
    value: Option<&str>,
) -> Result<Option<ServiceTime>, FeedError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| ServiceTime::parse(v).map_err(|e| FeedError::parse(table.name(), column, line, e)))
        .transpose()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::loader::ExtractedFeed;

    /// A small two-route feed used across the parser and metrics tests.
    ///
    /// Route A runs WK trips from S1 to S3 at 08:00, 08:10 and 16:00 plus a
    /// post-midnight trip; route B runs one WK trip from S2 to S3 and one SAT
    /// trip. WK runs Monday to Friday in January 2024, except it is removed on
    /// 2024-01-15; SAT runs on Saturdays and is added on 2024-01-15.
    pub fn sample_tables() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "agency",
                "agency_id,agency_name,agency_url,agency_timezone\nAG,Sample Transit,https://example.com,America/Chicago\n",
            ),
            (
                "stops",
                "stop_id,stop_name,stop_lat,stop_lon\nS1,First St,29.40,-98.50\nS2,Second St,29.41,-98.51\nS3,Central Station,29.42,-98.52\nS4,Unused,29.43,-98.53\n",
            ),
            (
                "routes",
                "route_id,agency_id,route_short_name,route_long_name,route_type\nA,AG,1,Downtown,3\nB,AG,2,Crosstown,3\n",
            ),
            (
                "trips",
                "route_id,service_id,trip_id,trip_headsign,direction_id,shape_id\n\
                 A,WK,A1,Central,0,SH_A\n\
                 A,WK,A2,Central,0,SH_A\n\
                 A,WK,A3,Central,0,SH_A\n\
                 A,WK,A4,Central,1,SH_A2\n\
                 B,WK,B1,Central,0,\n\
                 B,SAT,B2,Central,0,\n",
            ),
            (
                "stop_times",
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
                 A1,08:00:00,08:00:00,S1,1\n\
                 A1,08:20:00,08:21:00,S3,2\n\
                 A2,08:10:00,08:10:00,S1,1\n\
                 A2,08:30:00,08:30:00,S3,2\n\
                 A3,16:00:00,16:00:00,S1,1\n\
                 A3,,,S2,2\n\
                 A3,16:45:00,16:45:00,S3,3\n\
                 A4,25:30:00,25:30:00,S3,1\n\
                 A4,26:00:00,26:00:00,S1,2\n\
                 B1,07:00:00,07:00:00,S2,1\n\
                 B1,07:30:00,07:30:00,S3,2\n\
                 B2,10:00:00,10:00:00,S2,1\n\
                 B2,10:15:00,10:15:00,S3,2\n",
            ),
            (
                "calendar",
                "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
                 WK,1,1,1,1,1,0,0,20240101,20240131\n\
                 SAT,0,0,0,0,0,1,0,20240101,20240131\n",
            ),
            (
                "calendar_dates",
                "service_id,date,exception_type\nWK,20240115,2\nSAT,20240115,1\n",
            ),
            (
                "shapes",
                "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
                 SH_A,29.42,-98.52,2\n\
                 SH_A,29.40,-98.50,1\n\
                 SH_A2,29.42,-98.52,1\n\
                 SH_A2,29.40,-98.50,2\n",
            ),
        ]
    }

    pub fn extracted(tables: &[(&str, &str)]) -> ExtractedFeed {
        ExtractedFeed::from_tables(
            tables
                .iter()
                .map(|(name, data)| (name.to_string(), data.as_bytes().to_vec())),
        )
    }

    /// The sample feed with `table` replaced by `contents`.
    pub fn with_table(table: &'static str, contents: &'static str) -> ExtractedFeed {
        let mut tables = sample_tables();
        tables.retain(|(name, _)| *name != table);
        tables.push((table, contents));
        extracted(&tables)
    }

    /// The sample feed without `table`.
    pub fn without_table(table: &str) -> ExtractedFeed {
        let mut tables = sample_tables();
        tables.retain(|(name, _)| *name != table);
        extracted(&tables)
    }

    pub fn sample_feed() -> ExtractedFeed {
        extracted(&sample_tables())
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_sample_feed() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        assert_eq!(feed.agencies.len(), 1);
        assert_eq!(feed.stops.len(), 4);
        assert_eq!(feed.routes.len(), 2);
        assert_eq!(feed.trips.len(), 6);
        assert_eq!(feed.shapes.len(), 2);
        assert!(feed.frequencies.is_empty());

        let a4 = &feed.trips[&TripId::from("A4")];
        assert_eq!(a4.start_time, ServiceTime::from_hms(25, 30, 0));
        assert_eq!(a4.end_time, ServiceTime::from_hms(26, 0, 0));
    }

    #[test]
    fn test_optional_tables_may_be_absent() {
        let mut tables = sample_tables();
        tables.retain(|(name, _)| !matches!(*name, "shapes" | "agency" | "calendar"));
        let feed = GtfsFeed::parse(&extracted(&tables)).unwrap();
        assert!(feed.shapes.is_empty());
        assert!(feed.agencies.is_empty());
        assert_eq!(feed.trips.len(), 6);
    }

    #[test]
    fn test_missing_required_column_names_table_and_column() {
        let feed = with_table("routes", "route_id,route_short_name\nA,1\n");
        match GtfsFeed::parse(&feed).unwrap_err() {
            FeedError::MissingColumn { table, column } => {
                assert_eq!(table, "routes");
                assert_eq!(column, "route_type");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_malformed_optional_table_is_still_an_error() {
        let feed = with_table(
            "shapes",
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\nSH_A,north,-98.5,1\n",
        );
        match GtfsFeed::parse(&feed).unwrap_err() {
            FeedError::Parse { table, column, line, .. } => {
                assert_eq!(table, "shapes");
                assert_eq!(column, "shape_pt_lat");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let feed = with_table("routes", "route_id,route_type\nA,3\n,\nB,3\n");
        let parsed = GtfsFeed::parse(&feed).unwrap();
        assert_eq!(parsed.routes.len(), 2);
    }

    #[test]
    fn test_active_trips_follow_calendar() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let ids: Vec<_> = feed
            .active_trips(monday)
            .map(|t| t.trip_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A1", "A2", "A3", "A4", "B1"]);
    }
}
