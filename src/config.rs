use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gtfs::{RouteId, StopId};

/// Tunables of the metrics engine.
///
/// Stored as a JSON object on disk; every field may be omitted:
/// ```json
/// {
///   "peak_windows": [{ "start_hour": 6, "end_hour": 9 }, { "start_hour": 15, "end_hour": 18 }],
///   "reference_stops": { "1": "STOP_12" },
///   "hub_min_routes": 4
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hours `[start_hour, end_hour)` counted as peak service.
    pub peak_windows: Vec<HourWindow>,
    pub dayparts: Vec<Daypart>,
    /// Stop at which each route's headway is sampled. Routes not listed here
    /// use each trip's first stop.
    pub reference_stops: BTreeMap<RouteId, StopId>,
    /// Minimum number of distinct routes for a stop to count as a transfer hub.
    pub hub_min_routes: usize,
    /// How many stops and hubs appear in the facts listing.
    pub facts_top_n: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// A named slice of the service day. `end_hour: None` runs to the end of the
/// service day, including hours past midnight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Daypart {
    pub name: String,
    pub start_hour: u32,
    #[serde(default)]
    pub end_hour: Option<u32>,
}

impl HourWindow {
    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

impl Daypart {
    fn new(name: &str, start_hour: u32, end_hour: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && self.end_hour.is_none_or(|end| hour < end)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            peak_windows: vec![
                HourWindow { start_hour: 6, end_hour: 9 },
                HourWindow { start_hour: 15, end_hour: 18 },
            ],
            dayparts: vec![
                Daypart::new("Early AM", 4, Some(6)),
                Daypart::new("AM Peak", 6, Some(9)),
                Daypart::new("Base", 9, Some(15)),
                Daypart::new("PM Peak", 15, Some(18)),
                Daypart::new("Evening", 18, Some(22)),
                Daypart::new("Late Evening", 22, None),
            ],
            reference_stops: BTreeMap::new(),
            hub_min_routes: 5,
            facts_top_n: 10,
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path` and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for window in &self.peak_windows {
            if window.start_hour >= window.end_hour {
                return Err(ConfigError::InvalidWindow {
                    name: "peak window".to_string(),
                    start_hour: window.start_hour,
                    end_hour: window.end_hour,
                });
            }
        }
        for part in &self.dayparts {
            if let Some(end_hour) = part.end_hour.filter(|end| part.start_hour >= *end) {
                return Err(ConfigError::InvalidWindow {
                    name: part.name.clone(),
                    start_hour: part.start_hour,
                    end_hour,
                });
            }
        }
        Ok(())
    }

    pub fn is_peak_hour(&self, hour: u32) -> bool {
        self.peak_windows.iter().any(|w| w.contains(hour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("gtfs_metrics_{}_{name}.json", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_peak_windows() {
        let config = AnalysisConfig::default();
        assert!(config.is_peak_hour(6));
        assert!(config.is_peak_hour(8));
        assert!(!config.is_peak_hour(9));
        assert!(config.is_peak_hour(17));
        assert!(!config.is_peak_hour(18));
        // Post-midnight hours are not folded back
        assert!(!config.is_peak_hour(30));
    }

    #[test]
    fn test_open_ended_daypart() {
        let late = Daypart::new("Late Evening", 22, None);
        assert!(late.contains(22));
        assert!(late.contains(25));
        assert!(!late.contains(21));
    }

    #[test]
    fn test_load_partial_config() {
        let path = write_config(
            "partial",
            r#"{"peak_windows":[{"start_hour":7,"end_hour":10}],"reference_stops":{"A":"S3"}}"#,
        );
        let config = AnalysisConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.peak_windows, vec![HourWindow { start_hour: 7, end_hour: 10 }]);
        assert_eq!(config.reference_stops[&RouteId::from("A")], StopId::from("S3"));
        assert_eq!(config.hub_min_routes, 5);
        assert_eq!(config.dayparts.len(), 6);
    }

    #[test]
    fn test_load_rejects_inverted_window() {
        let path = write_config("inverted", r#"{"peak_windows":[{"start_hour":9,"end_hour":6}]}"#);
        let err = AnalysisConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::InvalidWindow { start_hour: 9, end_hour: 6, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AnalysisConfig::load("/nonexistent/gtfs_metrics.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
