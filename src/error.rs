//! Error types surfaced by the loader, parser and metrics engine.

use crate::gtfs::RouteId;

/// Failures while retrieving, validating or parsing a GTFS feed.
///
/// Every variant carries enough context for the caller to correct the input
/// (a different URL, a fixed table) and re-run; nothing is retried here.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("Failed to retrieve feed from {source_name}: {reason}")]
    Retrieval { source_name: String, reason: String },
    #[error("Feed is not a readable zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Feed is missing required tables: {}", .missing.join(", "))]
    MissingTables { missing: Vec<String> },
    #[error("{table}.txt is missing required column {column}")]
    MissingColumn { table: String, column: String },
    #[error("{table}.txt line {line}, column {column}: {reason}")]
    Parse {
        table: String,
        column: String,
        line: u64,
        reason: String,
    },
}

impl FeedError {
    pub(crate) fn parse(
        table: &str,
        column: &str,
        line: u64,
        reason: impl std::fmt::Display,
    ) -> Self {
        FeedError::Parse {
            table: table.to_string(),
            column: column.to_string(),
            line,
            reason: reason.to_string(),
        }
    }

    /// Names of the missing tables, if this is a validation failure.
    pub fn missing_tables(&self) -> Option<&[String]> {
        match self {
            FeedError::MissingTables { missing } => Some(missing),
            _ => None,
        }
    }
}

/// Failures from queries against an already-parsed feed.
#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("Route {0} does not exist in this feed")]
    UnknownRoute(RouteId),
}

/// Failures while loading an analysis configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Invalid hour window {name}: start {start_hour} must be before end {end_hour}")]
    InvalidWindow {
        name: String,
        start_hour: u32,
        end_hour: u32,
    },
}
