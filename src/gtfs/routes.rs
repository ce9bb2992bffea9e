use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RouteId, read_required};
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

#[derive(Clone, Debug, Serialize)]
pub struct Route {
    pub route_id: RouteId,
    pub agency_id: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub route_type: RouteType,
    pub color: Option<String>,
}

/// `routes.route_type`, covering both the base values and the extended
/// (Google "Extended GTFS Route Types") ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteType(pub u16);

impl RouteType {
    pub fn describe(self) -> &'static str {
        match self.0 {
            0 => "Tram",
            1 => "Subway",
            2 => "Rail",
            3 => "Bus",
            4 => "Ferry",
            5 => "Cable tram",
            6 => "Aerial lift",
            7 => "Funicular",
            11 => "Trolleybus",
            12 => "Monorail",
            100..=199 => "Rail",
            200..=299 => "Coach",
            400..=499 => "Urban rail",
            700..=799 => "Bus",
            800..=899 => "Trolleybus",
            900..=999 => "Tram",
            1000..=1099 => "Water transport",
            1300..=1399 => "Aerial lift",
            1400..=1499 => "Funicular",
            1500..=1599 => "Taxi",
            _ => "Other",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl Route {
    /// `"<short> - <long>"`, falling back to whichever name exists and then
    /// to the route id.
    pub fn display_name(&self) -> String {
        match (&self.short_name, &self.long_name) {
            (Some(short), Some(long)) => format!("{short} - {long}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.route_id.to_string(),
        }
    }
}

pub(crate) fn load(feed: &ExtractedFeed) -> Result<BTreeMap<RouteId, Route>, FeedError> {
    let mut routes = BTreeMap::new();
    for row in read_required::<Record>(feed, Table::Routes)? {
        let rec = row.record;
        if routes.contains_key(&rec.route_id) {
            return Err(FeedError::parse(
                Table::Routes.name(),
                "route_id",
                row.line,
                format!("duplicate route_id {}", rec.route_id),
            ));
        }
        routes.insert(
            rec.route_id.clone(),
            Route {
                route_id: rec.route_id,
                agency_id: rec.agency_id,
                short_name: rec.route_short_name,
                long_name: rec.route_long_name,
                route_type: rec.route_type,
                color: rec.route_color,
            },
        );
    }
    Ok(routes)
}

#[derive(Deserialize)]
struct Record {
    route_id: RouteId,
    agency_id: Option<String>,
    route_short_name: Option<String>,
    route_long_name: Option<String>,
    route_type: RouteType,
    route_color: Option<String>,
}
