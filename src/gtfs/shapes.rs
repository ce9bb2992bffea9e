use std::collections::BTreeMap;

use serde::Deserialize;

use super::{LatLon, ShapeId, read_table};
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

/// Points of every shape, ordered by `shape_pt_sequence`. Absent table yields
/// an empty map.
pub(crate) fn load(feed: &ExtractedFeed) -> Result<BTreeMap<ShapeId, Vec<LatLon>>, FeedError> {
    let Some(rows) = read_table::<Record>(feed, Table::Shapes)? else {
        return Ok(BTreeMap::new());
    };

    let mut pts_per_shape: BTreeMap<ShapeId, Vec<(u32, LatLon)>> = BTreeMap::new();
    for row in rows {
        let rec = row.record;
        pts_per_shape.entry(rec.shape_id).or_default().push((
            rec.shape_pt_sequence,
            LatLon {
                lat: rec.shape_pt_lat,
                lon: rec.shape_pt_lon,
            },
        ));
    }

    // Sort by shape_pt_sequence, in case the file isn't in order
    Ok(pts_per_shape
        .into_iter()
        .map(|(shape_id, mut pts)| {
            pts.sort_by_key(|(seq, _)| *seq);
            (shape_id, pts.into_iter().map(|(_, pt)| pt).collect())
        })
        .collect())
}

#[derive(Deserialize)]
struct Record {
    shape_id: ShapeId,
    shape_pt_lat: f64,
    shape_pt_lon: f64,
    shape_pt_sequence: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::fixtures::sample_feed;

    #[test]
    fn test_points_sorted_by_sequence() {
        let shapes = load(&sample_feed()).unwrap();
        let pts = &shapes[&ShapeId::from("SH_A")];
        assert_eq!(pts[0], LatLon { lat: 29.40, lon: -98.50 });
        assert_eq!(pts[1], LatLon { lat: 29.42, lon: -98.52 });
    }
}
