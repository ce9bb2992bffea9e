use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    Calendar, Route, RouteId, ServiceId, ServiceTime, ShapeId, Stop, StopId, TripId, parse_time, read_required,
};
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

#[derive(Clone, Debug, Serialize)]
pub struct Trip {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub service_id: ServiceId,
    pub shape_id: Option<ShapeId>,
    pub headsign: Option<String>,
    pub direction_id: Option<u8>,
    /// Sorted by `stop_sequence`, never empty.
    pub stop_times: Vec<StopTime>,
    /// Departure from the first stop.
    pub start_time: ServiceTime,
    /// Arrival at the last stop.
    pub end_time: ServiceTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct StopTime {
    pub stop_id: StopId,
    pub stop_sequence: u32,
    /// Both times are absent on untimed intermediate stops. When only one of
    /// them is given, it is used for both.
    pub arrival: Option<ServiceTime>,
    pub departure: Option<ServiceTime>,
}

impl Trip {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Departure time and stop sequence of the first timed visit to `stop`.
    pub fn departure_at(&self, stop: &StopId) -> Option<(ServiceTime, u32)> {
        self.stop_times
            .iter()
            .filter(|st| &st.stop_id == stop)
            .find_map(|st| st.departure.map(|time| (time, st.stop_sequence)))
    }

    pub fn first_stop(&self) -> &StopTime {
        &self.stop_times[0]
    }
}

pub(crate) fn load(
    feed: &ExtractedFeed,
    routes: &BTreeMap<RouteId, Route>,
    stops: &BTreeMap<StopId, Stop>,
    calendar: &Calendar,
) -> Result<BTreeMap<TripId, Trip>, FeedError> {
    let mut headers: BTreeMap<TripId, TripRecord> = BTreeMap::new();
    let mut unknown_services = BTreeSet::new();
    for row in read_required::<TripRecord>(feed, Table::Trips)? {
        let rec = row.record;
        if !routes.contains_key(&rec.route_id) {
            return Err(FeedError::parse(
                Table::Trips.name(),
                "route_id",
                row.line,
                format!("trip {} references unknown route {}", rec.trip_id, rec.route_id),
            ));
        }
        if headers.contains_key(&rec.trip_id) {
            return Err(FeedError::parse(
                Table::Trips.name(),
                "trip_id",
                row.line,
                format!("duplicate trip_id {}", rec.trip_id),
            ));
        }
        if !calendar.services.contains_key(&rec.service_id) {
            unknown_services.insert(rec.service_id.clone());
        }
        headers.insert(rec.trip_id.clone(), rec);
    }
    if !unknown_services.is_empty() {
        warn!(
            services = ?unknown_services.iter().map(ServiceId::as_str).collect::<Vec<_>>(),
            "Trips reference service ids missing from both calendar tables; they never run"
        );
    }

    let mut stop_times_per_trip: BTreeMap<TripId, Vec<(u64, StopTime)>> = BTreeMap::new();
    let mut orphan_stop_times = 0;
    for row in read_required::<StopTimeRecord>(feed, Table::StopTimes)? {
        let rec = row.record;
        if !stops.contains_key(&rec.stop_id) {
            return Err(FeedError::parse(
                Table::StopTimes.name(),
                "stop_id",
                row.line,
                format!("trip {} references unknown stop {}", rec.trip_id, rec.stop_id),
            ));
        }
        if !headers.contains_key(&rec.trip_id) {
            orphan_stop_times += 1;
            continue;
        }
        let arrival = parse_time(Table::StopTimes, "arrival_time", row.line, rec.arrival_time.as_deref())?;
        let departure = parse_time(Table::StopTimes, "departure_time", row.line, rec.departure_time.as_deref())?;
        stop_times_per_trip.entry(rec.trip_id).or_default().push((
            row.line,
            StopTime {
                stop_id: rec.stop_id,
                stop_sequence: rec.stop_sequence,
                arrival: arrival.or(departure),
                departure: departure.or(arrival),
            },
        ));
    }
    if orphan_stop_times > 0 {
        warn!(orphan_stop_times, "Stop times for unknown trips were dropped");
    }

    let mut trips = BTreeMap::new();
    let mut trips_without_stop_times = 0;
    for (trip_id, rec) in headers {
        let Some(mut stop_times) = stop_times_per_trip.remove(&trip_id) else {
            trips_without_stop_times += 1;
            continue;
        };
        // Sort by stop_sequence, in case the file isn't in order
        stop_times.sort_by_key(|(_, st)| st.stop_sequence);
        let (start_time, end_time) = check_stop_times(&trip_id, &stop_times)?;

        trips.insert(
            trip_id.clone(),
            Trip {
                trip_id,
                route_id: rec.route_id,
                service_id: rec.service_id,
                shape_id: rec.shape_id,
                headsign: rec.trip_headsign,
                direction_id: rec.direction_id,
                stop_times: stop_times.into_iter().map(|(_, st)| st).collect(),
                start_time,
                end_time,
            },
        );
    }
    if trips_without_stop_times > 0 {
        warn!(trips_without_stop_times, "Trips without stop times were dropped");
    }

    debug!(trips = trips.len(), "Trips loaded");
    Ok(trips)
}

/// Checks the sequence and time invariants of one trip's sorted stop times and
/// returns its start and end.
fn check_stop_times(trip_id: &TripId, stop_times: &[(u64, StopTime)]) -> Result<(ServiceTime, ServiceTime), FeedError> {
    let table = Table::StopTimes.name();

    for pair in stop_times.windows(2) {
        let ((_, prev), (line, next)) = (&pair[0], &pair[1]);
        if prev.stop_sequence == next.stop_sequence {
            return Err(FeedError::parse(
                table,
                "stop_sequence",
                *line,
                format!("trip {trip_id} repeats stop_sequence {}", next.stop_sequence),
            ));
        }
    }

    let mut last_time: Option<ServiceTime> = None;
    for (line, st) in stop_times {
        if let (Some(arrival), Some(departure)) = (st.arrival, st.departure) {
            if let Some(prev) = last_time.filter(|prev| arrival < *prev) {
                return Err(FeedError::parse(
                    table,
                    "arrival_time",
                    *line,
                    format!("trip {trip_id} arrives at {arrival}, before the previous stop's {prev}"),
                ));
            }
            if departure < arrival {
                return Err(FeedError::parse(
                    table,
                    "departure_time",
                    *line,
                    format!("trip {trip_id} departs at {departure}, before arriving at {arrival}"),
                ));
            }
            last_time = Some(departure);
        }
    }

    let (first_line, first) = &stop_times[0];
    let (last_line, last) = &stop_times[stop_times.len() - 1];
    let Some(start) = first.departure else {
        return Err(FeedError::parse(
            table,
            "departure_time",
            *first_line,
            format!("first stop of trip {trip_id} has no time"),
        ));
    };
    let Some(end) = last.arrival else {
        return Err(FeedError::parse(
            table,
            "arrival_time",
            *last_line,
            format!("last stop of trip {trip_id} has no time"),
        ));
    };
    Ok((start, end))
}

#[derive(Deserialize)]
struct TripRecord {
    route_id: RouteId,
    service_id: ServiceId,
    trip_id: TripId,
    trip_headsign: Option<String>,
    direction_id: Option<u8>,
    shape_id: Option<ShapeId>,
}

#[derive(Deserialize)]
struct StopTimeRecord {
    trip_id: TripId,
    arrival_time: Option<String>,
    departure_time: Option<String>,
    stop_id: StopId,
    stop_sequence: u32,
}
