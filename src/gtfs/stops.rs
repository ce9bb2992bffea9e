use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{LatLon, StopId, read_required};
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

#[derive(Clone, Debug, Serialize)]
pub struct Stop {
    pub stop_id: StopId,
    pub code: Option<String>,
    pub name: Option<String>,
    /// Absent for generic nodes and boarding areas, which GTFS lets omit
    /// coordinates.
    pub position: Option<LatLon>,
    pub location_type: u8,
    pub parent_station: Option<StopId>,
}

impl Stop {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.stop_id.as_str())
    }
}

pub(crate) fn load(feed: &ExtractedFeed) -> Result<BTreeMap<StopId, Stop>, FeedError> {
    let table = Table::Stops.name();
    let mut stops = BTreeMap::new();
    for row in read_required::<Record>(feed, Table::Stops)? {
        let rec = row.record;
        let position = match (rec.stop_lat, rec.stop_lon) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(FeedError::parse(table, "stop_lat", row.line, format!("latitude {lat} out of range")));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(FeedError::parse(table, "stop_lon", row.line, format!("longitude {lon} out of range")));
                }
                Some(LatLon { lat, lon })
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(FeedError::parse(table, "stop_lon", row.line, "stop_lat given without stop_lon"));
            }
            (None, Some(_)) => {
                return Err(FeedError::parse(table, "stop_lat", row.line, "stop_lon given without stop_lat"));
            }
        };

        if stops.contains_key(&rec.stop_id) {
            return Err(FeedError::parse(
                table,
                "stop_id",
                row.line,
                format!("duplicate stop_id {}", rec.stop_id),
            ));
        }
        stops.insert(
            rec.stop_id.clone(),
            Stop {
                stop_id: rec.stop_id,
                code: rec.stop_code,
                name: rec.stop_name,
                position,
                location_type: rec.location_type.unwrap_or(0),
                parent_station: rec.parent_station,
            },
        );
    }
    Ok(stops)
}

#[derive(Deserialize)]
struct Record {
    stop_id: StopId,
    stop_code: Option<String>,
    stop_name: Option<String>,
    stop_lat: Option<f64>,
    stop_lon: Option<f64>,
    location_type: Option<u8>,
    parent_station: Option<StopId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::fixtures::{sample_feed, with_table};

    #[test]
    fn test_load_sample_stops() {
        let stops = load(&sample_feed()).unwrap();
        let central = &stops[&StopId::from("S3")];
        assert_eq!(central.display_name(), "Central Station");
        assert_eq!(central.position, Some(LatLon { lat: 29.42, lon: -98.52 }));
        assert_eq!(central.location_type, 0);
    }

    #[test]
    fn test_duplicate_stop_id() {
        let feed = with_table("stops", "stop_id,stop_lat,stop_lon\nS1,1,1\nS1,2,2\n");
        let err = load(&feed).unwrap_err();
        assert!(err.to_string().contains("duplicate stop_id S1"), "{err}");
    }

    #[test]
    fn test_latitude_out_of_range() {
        let feed = with_table("stops", "stop_id,stop_lat,stop_lon\nS1,95,1\n");
        match load(&feed).unwrap_err() {
            FeedError::Parse { column, .. } => assert_eq!(column, "stop_lat"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_stops_without_coordinates() {
        let feed = with_table("stops", "stop_id,stop_name,location_type\nN1,Node,3\n");
        let stops = load(&feed).unwrap();
        let node = &stops[&StopId::from("N1")];
        assert!(node.position.is_none());
        assert_eq!(node.location_type, 3);
    }
}
