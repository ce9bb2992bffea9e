use std::collections::BTreeMap;

use super::types::HeadwaySummary;
use super::utility::{mean, median, stddev};
use crate::gtfs::{Frequency, ServiceTime, StopId, Trip, TripId, time};

/// A trip passing the reference stop. Field order is the sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Departure<'a> {
    pub time: ServiceTime,
    pub stop_sequence: u32,
    pub trip_id: &'a TripId,
}

/// Departures of `trips` at `reference`, or at each trip's first stop when no
/// reference is given, sorted by time, then stop sequence, then trip id.
/// Trips that never depart from the reference stop are left out.
pub(crate) fn departures<'a>(trips: &[&'a Trip], reference: Option<&StopId>) -> Vec<Departure<'a>> {
    let mut departures: Vec<Departure<'a>> = trips
        .iter()
        .filter_map(|trip| {
            let (time, stop_sequence) = match reference {
                Some(stop) => trip.departure_at(stop)?,
                None => (trip.start_time, trip.first_stop().stop_sequence),
            };
            Some(Departure {
                time,
                stop_sequence,
                trip_id: &trip.trip_id,
            })
        })
        .collect();
    departures.sort();
    departures
}

pub(crate) fn summarize(departures: &[Departure<'_>]) -> HeadwaySummary {
    if departures.len() < 2 {
        return HeadwaySummary::InsufficientData {
            departures: departures.len(),
        };
    }
    let headways_min: Vec<f64> = departures
        .windows(2)
        .map(|pair| time::minutes(pair[1].time - pair[0].time))
        .collect();
    let mean_min = mean(&headways_min);
    HeadwaySummary::Measured {
        mean_min,
        median_min: median(&headways_min),
        stddev_min: stddev(&headways_min, mean_min),
        headways_min,
    }
}

/// Mean headway declared in `frequencies.txt` for `trips`, in minutes.
pub(crate) fn scheduled_headway(trips: &[&Trip], frequencies: &BTreeMap<TripId, Vec<Frequency>>) -> Option<f64> {
    let declared: Vec<f64> = trips
        .iter()
        .filter_map(|trip| frequencies.get(&trip.trip_id))
        .flatten()
        .map(|f| f.headway_secs as f64 / 60.0)
        .collect();
    if declared.is_empty() {
        return None;
    }
    Some(mean(&declared))
}
