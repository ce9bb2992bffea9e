//! Flattens a [`MetricsBundle`] into ordered `key: value` facts for a
//! natural-language layer to quote from.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::gtfs::RouteId;
use crate::metrics::{HeadwaySummary, MetricsBundle, RouteMetrics, StopActivity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Fact {
    pub key: String,
    pub value: String,
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// Collects facts in a stable order: system totals, peak split, dayparts,
/// routes, then the `top_n` most frequent routes, busiest stops and hubs.
pub fn facts(bundle: &MetricsBundle, top_n: usize) -> Vec<Fact> {
    let mut out = Facts::default();
    out.push("date", bundle.date);

    if bundle.is_empty() {
        out.push("service", format!("no service runs on {}", bundle.date));
        out.push("feed.routes", bundle.system.total_routes);
        out.push("feed.stops", bundle.system.total_stops);
        return out.0;
    }

    let system = &bundle.system;
    out.push("feed.routes", system.total_routes);
    out.push("feed.stops", system.total_stops);
    out.push("feed.trips", system.total_trips);
    out.push("feed.shapes", system.total_shapes);
    let services: Vec<&str> = bundle.active_services.iter().map(|s| s.as_str()).collect();
    out.push("system.active_services", services.join(", "));
    out.push("system.active_routes", system.active_routes);
    out.push("system.active_stops", system.active_stops);
    out.push("system.trips", system.qualifying_trips);
    out.push("system.revenue_hours", format!("{:.1}", system.revenue_hours));
    if let Some(avg) = system.avg_trip_minutes {
        out.push("system.avg_trip_minutes", format!("{avg:.1}"));
    }
    if let Some(span) = &system.span {
        out.push(
            "system.service_span",
            format!("{} to {} ({:.1} h)", span.first_departure, span.last_departure, span.hours),
        );
    }

    out.push("peak.trips", bundle.peak.peak_trips);
    out.push("peak.off_peak_trips", bundle.peak.off_peak_trips);
    out.push("peak.percent", format!("{:.1}", bundle.peak.peak_percent));

    for part in &bundle.dayparts {
        out.push(
            format!("daypart.{}", part.name),
            format!("{} trips on {} routes ({:.1}%)", part.trips, part.routes, part.percent),
        );
    }

    for route in &bundle.routes {
        let key = |field: &str| format!("route.{}.{field}", route.route_id);
        out.push(key("name"), &route.name);
        out.push(key("trips"), route.trips);
        out.push(key("revenue_hours"), format!("{:.1}", route.revenue_hours));
        out.push(
            key("service_span"),
            format!("{} to {}", route.span.first_departure, route.span.last_departure),
        );
        match &route.headway {
            HeadwaySummary::Measured {
                mean_min, median_min, ..
            } => {
                out.push(key("headway_mean_min"), format!("{mean_min:.1}"));
                out.push(key("headway_median_min"), format!("{median_min:.1}"));
            }
            HeadwaySummary::InsufficientData { .. } => {
                out.push(key("headway"), "insufficient data");
            }
        }
        if let Some(grade) = &route.grade {
            out.push(key("grade"), grade);
        }
        if let Some(scheduled) = route.scheduled_headway_min {
            out.push(key("scheduled_headway_min"), format!("{scheduled:.1}"));
        }
    }

    let by_id: BTreeMap<&RouteId, &RouteMetrics> =
        bundle.routes.iter().map(|route| (&route.route_id, route)).collect();
    for (rank, route_id) in bundle.frequency_ranking.iter().take(top_n).enumerate() {
        let Some(route) = by_id.get(route_id) else {
            continue;
        };
        let mean = route.headway.mean().unwrap_or_default();
        out.push(
            format!("frequent_route.{}", rank + 1),
            format!("{} ({}): every {mean:.1} min", route.name, route.route_id),
        );
    }

    push_ranked(&mut out, "top_stop", &bundle.stops, top_n);
    push_ranked(&mut out, "transfer_hub", &bundle.transfer_hubs, top_n);
    out.0
}

/// One line per fact.
pub fn render(facts: &[Fact]) -> String {
    facts.iter().map(|fact| format!("{fact}\n")).collect()
}

#[derive(Default)]
struct Facts(Vec<Fact>);

impl Facts {
    fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push(Fact {
            key: key.into(),
            value: value.to_string(),
        });
    }
}

fn push_ranked(out: &mut Facts, prefix: &str, stops: &[StopActivity], top_n: usize) {
    for (rank, stop) in stops.iter().take(top_n).enumerate() {
        out.push(
            format!("{prefix}.{}", rank + 1),
            format!("{} ({}): {} trips, {} routes", stop.name, stop.stop_id, stop.trips, stop.routes),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::gtfs::GtfsFeed;
    use crate::gtfs::fixtures::sample_feed;
    use crate::metrics::compute_metrics;
    use chrono::NaiveDate;

    fn value<'a>(facts: &'a [Fact], key: &str) -> Option<&'a str> {
        facts.iter().find(|f| f.key == key).map(|f| f.value.as_str())
    }

    #[test]
    fn test_facts_for_monday() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let bundle = compute_metrics(
            &feed,
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            &AnalysisConfig::default(),
        );
        let facts = facts(&bundle, 2);

        assert_eq!(facts[0].key, "date");
        assert_eq!(value(&facts, "system.trips"), Some("5"));
        assert_eq!(value(&facts, "system.active_services"), Some("WK"));
        assert_eq!(value(&facts, "route.A.headway_mean_min"), Some("350.0"));
        assert_eq!(value(&facts, "route.B.headway"), Some("insufficient data"));
        assert_eq!(value(&facts, "route.A.grade"), Some("F"));
        assert_eq!(
            value(&facts, "top_stop.1"),
            Some("Central Station (S3): 5 trips, 2 routes")
        );
        assert!(value(&facts, "top_stop.3").is_none());
        assert!(value(&facts, "transfer_hub.1").is_none());
        assert_eq!(
            value(&facts, "frequent_route.1"),
            Some("1 - Downtown (A): every 350.0 min")
        );
        assert!(value(&facts, "frequent_route.2").is_none());
    }

    #[test]
    fn test_empty_bundle_fact() {
        let feed = GtfsFeed::parse(&sample_feed()).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        let bundle = compute_metrics(&feed, sunday, &AnalysisConfig::default());
        let rendered = render(&facts(&bundle, 10));
        assert!(rendered.contains("service: no service runs on 2024-01-14\n"));
        assert!(!rendered.contains("route."));
    }
}
