//! Descriptive metrics for one service date.
//!
//! [`compute_metrics`] is a pure function of a parsed feed, a date and an
//! [`AnalysisConfig`]. [`MetricsEngine`] wraps it with a [`MetricsCache`] so
//! repeated requests for the same feed and date are answered from memory.

mod grade;
mod headway;
mod periods;
mod route_detail;
mod stops;
mod types;
pub mod utility;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::cache::MetricsCache;
use crate::config::AnalysisConfig;
use crate::error::MetricsError;
use crate::gtfs::{GtfsFeed, RouteId, Trip, time};
use crate::loader::FeedIdentity;

pub use grade::grade;
pub use periods::OTHER_DAYPART;
pub use route_detail::route_detail;
pub use types::{
    DaypartStats, DirectionHeadway, Geography, HeadwaySummary, HourCount, MetricsBundle, PeakSplit,
    RouteDetail, RouteMetrics, RouteStop, ServiceSpan, ShapeLine, StopActivity, StopPoint,
    SystemTotals,
};

/// Computes every metric for the trips whose service runs on `date`.
///
/// A date without service yields a bundle for which
/// [`MetricsBundle::is_empty`] holds; that is not an error.
#[tracing::instrument(skip(feed, config))]
pub fn compute_metrics(feed: &GtfsFeed, date: NaiveDate, config: &AnalysisConfig) -> MetricsBundle {
    let active_services: Vec<_> = feed
        .calendar
        .active_services(date)
        .into_iter()
        .cloned()
        .collect();
    let trips: Vec<&Trip> = feed.active_trips(date).collect();
    if trips.is_empty() {
        warn!(services = active_services.len(), "No trips run on this date");
    }

    let mut per_route: BTreeMap<&RouteId, Vec<&Trip>> = BTreeMap::new();
    for trip in &trips {
        per_route.entry(&trip.route_id).or_default().push(*trip);
    }
    let routes: Vec<RouteMetrics> = per_route
        .iter()
        .filter_map(|(route_id, trips)| route_metrics(feed, route_id, trips, config))
        .collect();
    let frequency_ranking = frequency_ranking(&routes);

    let stops = stops::stop_activity(feed, &trips);
    let transfer_hubs = stops::transfer_hubs(&stops, config.hub_min_routes);

    let durations: Vec<f64> = trips.iter().map(|trip| time::minutes(trip.duration())).collect();
    let system = SystemTotals {
        total_routes: feed.routes.len(),
        total_stops: feed.stops.len(),
        total_trips: feed.trips.len(),
        total_shapes: feed.shapes.len(),
        active_services: active_services.len(),
        active_routes: per_route.len(),
        active_stops: stops.len(),
        qualifying_trips: trips.len(),
        revenue_hours: periods::revenue_hours(trips.iter().copied()),
        avg_trip_minutes: (!durations.is_empty()).then(|| utility::mean(&durations)),
        span: periods::service_span(trips.iter().copied()),
    };

    let bundle = MetricsBundle {
        date,
        active_services,
        system,
        routes,
        frequency_ranking,
        geography: geography(feed, &trips, &stops),
        transfer_hubs,
        stops,
        peak: periods::peak_split(&trips, config),
        dayparts: periods::dayparts(&trips, config),
        trips_by_hour: periods::trips_by_hour(&trips),
    };

    info!(
        trips = bundle.system.qualifying_trips,
        routes = bundle.system.active_routes,
        stops = bundle.system.active_stops,
        revenue_hours = bundle.system.revenue_hours,
        "Metrics computed"
    );
    bundle
}

fn route_metrics(
    feed: &GtfsFeed,
    route_id: &RouteId,
    trips: &[&Trip],
    config: &AnalysisConfig,
) -> Option<RouteMetrics> {
    let route = feed.routes.get(route_id)?;
    let span = periods::service_span(trips.iter().copied())?;
    let revenue_hours = periods::revenue_hours(trips.iter().copied());
    let departures = headway::departures(trips, config.reference_stops.get(route_id));
    let headway = headway::summarize(&departures);
    debug!(route = %route_id, trips = trips.len(), sampled = departures.len(), "Route headways sampled");

    Some(RouteMetrics {
        route_id: route_id.clone(),
        name: route.display_name(),
        route_type: route.route_type.describe().to_string(),
        trips: trips.len(),
        revenue_hours,
        avg_trip_minutes: revenue_hours * 60.0 / trips.len() as f64,
        span,
        grade: headway.mean().map(grade),
        headway,
        scheduled_headway_min: headway::scheduled_headway(trips, &feed.frequencies),
    })
}

/// Measured routes by mean headway ascending, ties by route id. Routes
/// without enough departures to measure are left out.
fn frequency_ranking(routes: &[RouteMetrics]) -> Vec<RouteId> {
    let mut measured: Vec<(f64, &RouteId)> = routes
        .iter()
        .filter_map(|route| Some((route.headway.mean()?, &route.route_id)))
        .collect();
    measured.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    measured.into_iter().map(|(_, route_id)| route_id.clone()).collect()
}

fn geography(feed: &GtfsFeed, trips: &[&Trip], stops: &[StopActivity]) -> Geography {
    let stop_points = stops
        .iter()
        .filter_map(|stop| {
            Some(StopPoint {
                stop_id: stop.stop_id.clone(),
                name: stop.name.clone(),
                position: stop.position?,
            })
        })
        .collect();

    let used: BTreeSet<_> = trips.iter().filter_map(|trip| trip.shape_id.as_ref()).collect();
    let shapes = used
        .into_iter()
        .filter_map(|shape_id| {
            feed.shapes.get(shape_id).map(|points| ShapeLine {
                shape_id: shape_id.clone(),
                points: points.clone(),
            })
        })
        .collect();

    Geography {
        stops: stop_points,
        shapes,
    }
}

/// Owns a parsed feed and answers metrics requests for it, memoising bundles
/// in the cache handed to [`MetricsEngine::new`].
pub struct MetricsEngine {
    feed: GtfsFeed,
    identity: FeedIdentity,
    config: AnalysisConfig,
    cache: MetricsCache,
}

impl MetricsEngine {
    pub fn new(feed: GtfsFeed, identity: FeedIdentity, config: AnalysisConfig, cache: MetricsCache) -> Self {
        Self {
            feed,
            identity,
            config,
            cache,
        }
    }

    /// The bundle for `date`, computed at most once per feed version.
    pub fn analyze(&mut self, date: NaiveDate) -> Arc<MetricsBundle> {
        if let Some(bundle) = self.cache.get(&self.identity, date) {
            debug!(%date, source = %self.identity.source, "Metrics served from cache");
            return bundle;
        }
        let bundle = Arc::new(compute_metrics(&self.feed, date, &self.config));
        self.cache.insert(self.identity.clone(), date, Arc::clone(&bundle));
        bundle
    }

    /// Swaps in a newly loaded feed, dropping every bundle of the previous one.
    pub fn replace_feed(&mut self, feed: GtfsFeed, identity: FeedIdentity) {
        self.cache.invalidate_feed(&self.identity);
        info!(previous = %self.identity.source, source = %identity.source, "Feed replaced");
        self.feed = feed;
        self.identity = identity;
    }

    /// Changing the configuration invalidates the whole cache.
    pub fn set_config(&mut self, config: AnalysisConfig) {
        if config != self.config {
            self.cache.clear();
            self.config = config;
        }
    }

    pub fn route_detail(&self, route_id: &RouteId, date: NaiveDate) -> Result<RouteDetail, MetricsError> {
        route_detail(&self.feed, route_id, date, &self.config)
    }

    pub fn feed(&self) -> &GtfsFeed {
        &self.feed
    }

    pub fn identity(&self) -> &FeedIdentity {
        &self.identity
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }
}
