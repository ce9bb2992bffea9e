use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! gtfs_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

gtfs_id!(
    /// `stops.stop_id`
    StopId
);
gtfs_id!(
    /// `routes.route_id`
    RouteId
);
gtfs_id!(
    /// `trips.trip_id`
    TripId
);
gtfs_id!(
    /// `calendar.service_id` / `calendar_dates.service_id`
    ServiceId
);
gtfs_id!(
    /// `shapes.shape_id`
    ShapeId
);
