use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use super::headway;
use super::periods::service_span;
use super::types::{DirectionHeadway, RouteDetail, RouteStop, ShapeLine};
use crate::config::AnalysisConfig;
use crate::error::MetricsError;
use crate::gtfs::{GtfsFeed, RouteId, ShapeId, StopId, Trip};

/// Drill-down for one route on `date`.
#[tracing::instrument(skip(feed, config), fields(route = %route_id, %date))]
pub fn route_detail(
    feed: &GtfsFeed,
    route_id: &RouteId,
    date: NaiveDate,
    config: &AnalysisConfig,
) -> Result<RouteDetail, MetricsError> {
    let route = feed
        .routes
        .get(route_id)
        .ok_or_else(|| MetricsError::UnknownRoute(route_id.clone()))?;
    let trips: Vec<&Trip> = feed
        .active_trips(date)
        .filter(|trip| &trip.route_id == route_id)
        .collect();
    debug!(trips = trips.len(), "Route trips selected");

    let reference = config.reference_stops.get(route_id);
    let pooled = headway::departures(&trips, reference);

    let mut per_direction: BTreeMap<Option<u8>, Vec<&Trip>> = BTreeMap::new();
    for trip in &trips {
        per_direction.entry(trip.direction_id).or_default().push(*trip);
    }
    let headway_by_direction = per_direction
        .into_iter()
        .map(|(direction_id, trips)| DirectionHeadway {
            direction_id,
            trips: trips.len(),
            headway: headway::summarize(&headway::departures(&trips, reference)),
        })
        .collect();

    let mut departures: Vec<_> = trips.iter().map(|trip| trip.start_time).collect();
    departures.sort();

    Ok(RouteDetail {
        route_id: route_id.clone(),
        name: route.display_name(),
        route_type: route.route_type.describe().to_string(),
        agency_id: route.agency_id.clone(),
        color: route.color.clone(),
        date,
        trips: trips.len(),
        stops: served_stops(feed, &trips),
        first_trip: departures.first().copied(),
        last_trip: departures.last().copied(),
        departures,
        span: service_span(trips.iter().copied()),
        headway: headway::summarize(&pooled),
        headway_by_direction,
        shape: most_used_shape(feed, &trips),
    })
}

/// Stops ordered by the lowest sequence at which any trip serves them, then by
/// stop id.
fn served_stops(feed: &GtfsFeed, trips: &[&Trip]) -> Vec<RouteStop> {
    let mut min_sequence: BTreeMap<&StopId, u32> = BTreeMap::new();
    for trip in trips {
        for st in &trip.stop_times {
            min_sequence
                .entry(&st.stop_id)
                .and_modify(|seq| *seq = (*seq).min(st.stop_sequence))
                .or_insert(st.stop_sequence);
        }
    }

    let mut stops: Vec<RouteStop> = min_sequence
        .into_iter()
        .map(|(stop_id, sequence)| {
            let stop = feed.stops.get(stop_id);
            RouteStop {
                stop_id: stop_id.clone(),
                name: stop.map_or_else(|| stop_id.to_string(), |s| s.display_name().to_string()),
                sequence,
                position: stop.and_then(|s| s.position),
            }
        })
        .collect();
    stops.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.stop_id.cmp(&b.stop_id)));
    stops
}

/// The shape referenced by the most trips, ties going to the lowest shape id.
fn most_used_shape(feed: &GtfsFeed, trips: &[&Trip]) -> Option<ShapeLine> {
    let mut uses: BTreeMap<&ShapeId, usize> = BTreeMap::new();
    for shape_id in trips.iter().filter_map(|trip| trip.shape_id.as_ref()) {
        *uses.entry(shape_id).or_default() += 1;
    }

    let mut best: Option<(&ShapeId, usize)> = None;
    for (shape_id, count) in uses {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((shape_id, count));
        }
    }
    let (shape_id, _) = best?;
    let points = feed.shapes.get(shape_id)?;
    Some(ShapeLine {
        shape_id: shape_id.clone(),
        points: points.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::ServiceTime;
    use crate::gtfs::fixtures::sample_feed;
    use crate::metrics::HeadwaySummary;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    #[test]
    fn test_route_detail_for_route_a() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let detail = route_detail(&feed, &RouteId::from("A"), monday(), &AnalysisConfig::default()).unwrap();

        assert_eq!(detail.name, "1 - Downtown");
        assert_eq!(detail.route_type, "Bus");
        assert_eq!(detail.trips, 4);
        assert_eq!(detail.first_trip, Some(ServiceTime::from_hms(8, 0, 0)));
        assert_eq!(detail.last_trip, Some(ServiceTime::from_hms(25, 30, 0)));

        // S1 and S3 both appear at sequence 1 (A4 runs the other way)
        let stops: Vec<(&str, u32)> = detail
            .stops
            .iter()
            .map(|s| (s.stop_id.as_str(), s.sequence))
            .collect();
        assert_eq!(stops, vec![("S1", 1), ("S3", 1), ("S2", 2)]);

        // SH_A is used by three trips, SH_A2 by one
        assert_eq!(detail.shape.unwrap().shape_id, ShapeId::from("SH_A"));
    }

    #[test]
    fn test_headways_per_direction() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let detail = route_detail(&feed, &RouteId::from("A"), monday(), &AnalysisConfig::default()).unwrap();

        assert_eq!(detail.headway_by_direction.len(), 2);
        let outbound = &detail.headway_by_direction[0];
        assert_eq!(outbound.direction_id, Some(0));
        assert_eq!(outbound.trips, 3);
        assert_eq!(outbound.headway.mean(), Some(240.0));
        let inbound = &detail.headway_by_direction[1];
        assert_eq!(inbound.headway, HeadwaySummary::InsufficientData { departures: 1 });
    }

    #[test]
    fn test_unknown_route() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let err = route_detail(&feed, &RouteId::from("Z"), monday(), &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownRoute(id) if id.as_str() == "Z"));
    }

    #[test]
    fn test_route_not_running_on_date() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        let detail = route_detail(&feed, &RouteId::from("B"), sunday, &AnalysisConfig::default()).unwrap();
        assert_eq!(detail.trips, 0);
        assert!(detail.span.is_none());
        assert!(detail.shape.is_none());
        assert_eq!(detail.headway, HeadwaySummary::InsufficientData { departures: 0 });
    }
}
