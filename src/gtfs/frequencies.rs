use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ServiceTime, Trip, TripId, parse_time, read_table};
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

/// One `frequencies.txt` window: the trip's pattern repeats every
/// `headway_secs` between `start_time` and `end_time`.
#[derive(Clone, Debug, Serialize)]
pub struct Frequency {
    pub start_time: ServiceTime,
    pub end_time: ServiceTime,
    pub headway_secs: u32,
    pub exact_times: bool,
}

pub(crate) fn load(
    feed: &ExtractedFeed,
    trips: &BTreeMap<TripId, Trip>,
) -> Result<BTreeMap<TripId, Vec<Frequency>>, FeedError> {
    let table = Table::Frequencies.name();
    let Some(rows) = read_table::<Record>(feed, Table::Frequencies)? else {
        return Ok(BTreeMap::new());
    };

    let mut frequencies: BTreeMap<TripId, Vec<Frequency>> = BTreeMap::new();
    let mut unknown_trips = 0;
    for row in rows {
        let rec = row.record;
        let time = |column: &str, value: &str| -> Result<ServiceTime, FeedError> {
            parse_time(Table::Frequencies, column, row.line, Some(value))?
                .ok_or_else(|| FeedError::parse(table, column, row.line, "time is empty"))
        };
        let start_time = time("start_time", &rec.start_time)?;
        let end_time = time("end_time", &rec.end_time)?;
        if rec.headway_secs == 0 {
            return Err(FeedError::parse(table, "headway_secs", row.line, "headway_secs must be positive"));
        }
        if end_time <= start_time {
            return Err(FeedError::parse(
                table,
                "end_time",
                row.line,
                format!("end_time {end_time} is not after start_time {start_time}"),
            ));
        }
        if !trips.contains_key(&rec.trip_id) {
            unknown_trips += 1;
            continue;
        }
        frequencies.entry(rec.trip_id).or_default().push(Frequency {
            start_time,
            end_time,
            headway_secs: rec.headway_secs,
            exact_times: rec.exact_times == Some(1),
        });
    }

    if unknown_trips > 0 {
        warn!(unknown_trips, "Frequencies defined for unknown trips were dropped");
    }
    Ok(frequencies)
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripId,
    start_time: String,
    end_time: String,
    headway_secs: u32,
    exact_times: Option<u8>,
}
