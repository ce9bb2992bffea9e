//! Data types produced by the metrics engine.

use chrono::NaiveDate;
use serde::Serialize;

use crate::gtfs::{LatLon, RouteId, ServiceId, ServiceTime, ShapeId, StopId};

/// Everything computed for one feed on one service date.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsBundle {
    pub date: NaiveDate,
    pub active_services: Vec<ServiceId>,
    pub system: SystemTotals,
    /// Routes with at least one qualifying trip, by route id.
    pub routes: Vec<RouteMetrics>,
    /// Routes with a measured headway, most frequent first.
    pub frequency_ranking: Vec<RouteId>,
    /// Stops served on the date, busiest first.
    pub stops: Vec<StopActivity>,
    pub transfer_hubs: Vec<StopActivity>,
    pub peak: PeakSplit,
    pub dayparts: Vec<DaypartStats>,
    pub trips_by_hour: Vec<HourCount>,
    pub geography: Geography,
}

impl MetricsBundle {
    /// True when nothing runs on the date.
    pub fn is_empty(&self) -> bool {
        self.system.qualifying_trips == 0
    }
}

/// Feed-wide counts plus the totals of the qualifying trips.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SystemTotals {
    pub total_routes: usize,
    pub total_stops: usize,
    pub total_trips: usize,
    pub total_shapes: usize,
    pub active_services: usize,
    pub active_routes: usize,
    pub active_stops: usize,
    pub qualifying_trips: usize,
    pub revenue_hours: f64,
    pub avg_trip_minutes: Option<f64>,
    pub span: Option<ServiceSpan>,
}

/// First and last trip start, and the hours between them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ServiceSpan {
    pub first_departure: ServiceTime,
    pub last_departure: ServiceTime,
    pub hours: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteMetrics {
    pub route_id: RouteId,
    pub name: String,
    pub route_type: String,
    pub trips: usize,
    pub revenue_hours: f64,
    pub avg_trip_minutes: f64,
    pub span: ServiceSpan,
    pub headway: HeadwaySummary,
    /// Level-of-service letter from the mean headway, when one was measured.
    pub grade: Option<String>,
    /// Mean of the headways declared in `frequencies.txt`, in minutes.
    pub scheduled_headway_min: Option<f64>,
}

/// Headways between consecutive departures at a route's reference stop.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeadwaySummary {
    /// Fewer than two departures were sampled.
    InsufficientData { departures: usize },
    Measured {
        mean_min: f64,
        median_min: f64,
        stddev_min: f64,
        /// In departure order; one entry fewer than the departures sampled.
        headways_min: Vec<f64>,
    },
}

impl HeadwaySummary {
    pub fn mean(&self) -> Option<f64> {
        match self {
            HeadwaySummary::Measured { mean_min, .. } => Some(*mean_min),
            HeadwaySummary::InsufficientData { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StopActivity {
    pub stop_id: StopId,
    pub name: String,
    pub trips: usize,
    pub routes: usize,
    pub position: Option<LatLon>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PeakSplit {
    pub peak_trips: usize,
    pub off_peak_trips: usize,
    pub peak_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DaypartStats {
    pub name: String,
    pub trips: usize,
    pub routes: usize,
    pub percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub trips: usize,
}

/// Coordinates for map rendering.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Geography {
    pub stops: Vec<StopPoint>,
    pub shapes: Vec<ShapeLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StopPoint {
    pub stop_id: StopId,
    pub name: String,
    pub position: LatLon,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShapeLine {
    pub shape_id: ShapeId,
    pub points: Vec<LatLon>,
}

/// Everything known about one route on one service date.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteDetail {
    pub route_id: RouteId,
    pub name: String,
    pub route_type: String,
    pub agency_id: Option<String>,
    pub color: Option<String>,
    pub date: NaiveDate,
    pub trips: usize,
    /// Stops in order of the lowest sequence at which any trip serves them.
    pub stops: Vec<RouteStop>,
    /// Trip starts, ascending.
    pub departures: Vec<ServiceTime>,
    pub first_trip: Option<ServiceTime>,
    pub last_trip: Option<ServiceTime>,
    pub span: Option<ServiceSpan>,
    pub headway: HeadwaySummary,
    pub headway_by_direction: Vec<DirectionHeadway>,
    pub shape: Option<ShapeLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteStop {
    pub stop_id: StopId,
    pub name: String,
    pub sequence: u32,
    pub position: Option<LatLon>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectionHeadway {
    pub direction_id: Option<u8>,
    pub trips: usize,
    pub headway: HeadwaySummary,
}
