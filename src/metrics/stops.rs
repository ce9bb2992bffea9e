use std::collections::{BTreeMap, BTreeSet};

use super::types::StopActivity;
use crate::gtfs::{GtfsFeed, RouteId, StopId, Trip, TripId};

/// Distinct trips and routes serving each stop, busiest first with ties broken
/// by stop id. Stops no qualifying trip visits are left out.
pub(crate) fn stop_activity(feed: &GtfsFeed, trips: &[&Trip]) -> Vec<StopActivity> {
    let mut served: BTreeMap<&StopId, (BTreeSet<&TripId>, BTreeSet<&RouteId>)> = BTreeMap::new();
    for trip in trips {
        for st in &trip.stop_times {
            let (trip_ids, route_ids) = served.entry(&st.stop_id).or_default();
            trip_ids.insert(&trip.trip_id);
            route_ids.insert(&trip.route_id);
        }
    }

    let mut activity: Vec<StopActivity> = served
        .into_iter()
        .map(|(stop_id, (trip_ids, route_ids))| {
            let stop = feed.stops.get(stop_id);
            StopActivity {
                stop_id: stop_id.clone(),
                name: stop.map_or_else(|| stop_id.to_string(), |s| s.display_name().to_string()),
                trips: trip_ids.len(),
                routes: route_ids.len(),
                position: stop.and_then(|s| s.position),
            }
        })
        .collect();
    activity.sort_by(|a, b| b.trips.cmp(&a.trips).then_with(|| a.stop_id.cmp(&b.stop_id)));
    activity
}

/// Stops served by at least `min_routes` routes, most routes first.
pub(crate) fn transfer_hubs(activity: &[StopActivity], min_routes: usize) -> Vec<StopActivity> {
    let mut hubs: Vec<StopActivity> = activity
        .iter()
        .filter(|stop| stop.routes >= min_routes)
        .cloned()
        .collect();
    hubs.sort_by(|a, b| b.routes.cmp(&a.routes).then_with(|| a.stop_id.cmp(&b.stop_id)));
    hubs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::fixtures::sample_feed;
    use chrono::NaiveDate;

    #[test]
    fn test_ranking_and_unserved_stops() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let trips: Vec<&Trip> = feed.active_trips(monday).collect();
        let activity = stop_activity(&feed, &trips);

        let ranked: Vec<(&str, usize, usize)> = activity
            .iter()
            .map(|s| (s.stop_id.as_str(), s.trips, s.routes))
            .collect();
        // S4 is never served
        assert_eq!(ranked, vec![("S3", 5, 2), ("S1", 4, 1), ("S2", 2, 2)]);
        assert_eq!(activity[0].name, "Central Station");
    }

    #[test]
    fn test_equal_trip_counts_rank_by_stop_id() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
        let mut trips: Vec<&Trip> = feed.active_trips(saturday).collect();
        trips.reverse();
        let activity = stop_activity(&feed, &trips);

        // B2 alone: S2 and S3 both have one trip
        let ranked: Vec<(&str, usize)> = activity.iter().map(|s| (s.stop_id.as_str(), s.trips)).collect();
        assert_eq!(ranked, vec![("S2", 1), ("S3", 1)]);
    }

    #[test]
    fn test_transfer_hubs_threshold() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let trips: Vec<&Trip> = feed.active_trips(monday).collect();
        let activity = stop_activity(&feed, &trips);

        // S2 and S3 tie on routes
        let hubs = transfer_hubs(&activity, 2);
        let ids: Vec<&str> = hubs.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S3"]);
        assert!(transfer_hubs(&activity, 5).is_empty());
    }
}
