//! Time-of-day bucketing of qualifying trips.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{DaypartStats, HourCount, PeakSplit, ServiceSpan};
use super::utility::percent;
use crate::config::AnalysisConfig;
use crate::gtfs::{Trip, time};

/// Name of the bucket for trips starting outside every configured daypart.
pub const OTHER_DAYPART: &str = "Other";

/// Earliest and latest trip start, `None` without trips.
pub(crate) fn service_span<'a>(trips: impl IntoIterator<Item = &'a Trip>) -> Option<ServiceSpan> {
    let mut starts = trips.into_iter().map(|trip| trip.start_time);
    let first = starts.next()?;
    let (first_departure, last_departure) =
        starts.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    Some(ServiceSpan {
        first_departure,
        last_departure,
        hours: time::hours(last_departure - first_departure),
    })
}

/// Sum of trip durations, in hours.
pub(crate) fn revenue_hours<'a>(trips: impl IntoIterator<Item = &'a Trip>) -> f64 {
    trips.into_iter().map(|trip| time::hours(trip.duration())).sum()
}

/// Buckets trips by the hour of their start into peak and off-peak.
pub(crate) fn peak_split(trips: &[&Trip], config: &AnalysisConfig) -> PeakSplit {
    let peak_trips = trips
        .iter()
        .filter(|trip| config.is_peak_hour(trip.start_time.hour()))
        .count();
    PeakSplit {
        peak_trips,
        off_peak_trips: trips.len() - peak_trips,
        peak_percent: percent(peak_trips, trips.len()),
    }
}

/// Trip and route counts per configured daypart, in configuration order.
/// A trip is counted in the first daypart containing its start hour; the rest
/// go to [`OTHER_DAYPART`], which is only listed when non-empty.
pub(crate) fn dayparts(trips: &[&Trip], config: &AnalysisConfig) -> Vec<DaypartStats> {
    let slots = config.dayparts.len();
    let mut counts = vec![(0usize, BTreeSet::new()); slots + 1];
    for trip in trips {
        let hour = trip.start_time.hour();
        let idx = config
            .dayparts
            .iter()
            .position(|part| part.contains(hour))
            .unwrap_or(slots);
        counts[idx].0 += 1;
        counts[idx].1.insert(&trip.route_id);
    }

    let names = config
        .dayparts
        .iter()
        .map(|part| part.name.as_str())
        .chain([OTHER_DAYPART]);
    names
        .zip(counts)
        .enumerate()
        .filter(|(idx, (_, (count, _)))| *idx < slots || *count > 0)
        .map(|(_, (name, (count, routes)))| DaypartStats {
            name: name.to_string(),
            trips: count,
            routes: routes.len(),
            percent: percent(count, trips.len()),
        })
        .collect()
}

/// Trips per start hour, for every hour that has at least one trip.
pub(crate) fn trips_by_hour(trips: &[&Trip]) -> Vec<HourCount> {
    let mut per_hour: BTreeMap<u32, usize> = BTreeMap::new();
    for trip in trips {
        *per_hour.entry(trip.start_time.hour()).or_default() += 1;
    }
    per_hour
        .into_iter()
        .map(|(hour, trips)| HourCount { hour, trips })
        .collect()
}
