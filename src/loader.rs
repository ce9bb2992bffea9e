//! Feed retrieval, extraction and table validation.
//!
//! A feed is fetched once, unpacked into memory as raw CSV bytes per table and
//! checked for the tables every analysis needs. Nothing is written to disk.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::FeedError;
use crate::fetch::{HttpClient, fetch_bytes};

/// The GTFS tables this crate understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Agency,
    Stops,
    Routes,
    Trips,
    StopTimes,
    Calendar,
    CalendarDates,
    Shapes,
    Frequencies,
}

impl Table {
    /// Table name as it appears in the archive, without the `.txt` suffix.
    pub fn name(self) -> &'static str {
        match self {
            Table::Agency => "agency",
            Table::Stops => "stops",
            Table::Routes => "routes",
            Table::Trips => "trips",
            Table::StopTimes => "stop_times",
            Table::Calendar => "calendar",
            Table::CalendarDates => "calendar_dates",
            Table::Shapes => "shapes",
            Table::Frequencies => "frequencies",
        }
    }

    /// Columns that must be present in the header row when the table exists.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Table::Agency => &["agency_name"],
            Table::Stops => &["stop_id"],
            Table::Routes => &["route_id", "route_type"],
            Table::Trips => &["route_id", "service_id", "trip_id"],
            Table::StopTimes => &[
                "trip_id",
                "arrival_time",
                "departure_time",
                "stop_id",
                "stop_sequence",
            ],
            Table::Calendar => &[
                "service_id",
                "monday",
                "tuesday",
                "wednesday",
                "thursday",
                "friday",
                "saturday",
                "sunday",
                "start_date",
                "end_date",
            ],
            Table::CalendarDates => &["service_id", "date", "exception_type"],
            Table::Shapes => &[
                "shape_id",
                "shape_pt_lat",
                "shape_pt_lon",
                "shape_pt_sequence",
            ],
            Table::Frequencies => &["trip_id", "start_time", "end_time", "headway_secs"],
        }
    }
}

/// Tables without which no analysis can run. At least one of the calendar
/// tables is required as well.
pub const REQUIRED_TABLES: [Table; 4] = [Table::Stops, Table::Routes, Table::Trips, Table::StopTimes];

/// Where a feed archive comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    Path(PathBuf),
}

impl FeedSource {
    /// Anything that looks like an HTTP(S) URL is fetched, everything else is
    /// treated as a local path.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            FeedSource::Url(input.to_string())
        } else {
            FeedSource::Path(PathBuf::from(input))
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Url(url) => write!(f, "{url}"),
            FeedSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Identifies one particular version of a feed: where it came from plus a
/// checksum of every extracted table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeedIdentity {
    pub source: String,
    pub checksums: BTreeMap<String, u32>,
}

/// Upper bound on the buffer reserved from a zip header's declared size.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// The declared size is untrusted; larger entries grow the buffer as read.
fn initial_capacity(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATION)).unwrap_or(0)
}

/// Raw table bytes extracted from an archive, keyed by table name.
#[derive(Clone, Debug, Default)]
pub struct ExtractedFeed {
    tables: BTreeMap<String, Vec<u8>>,
}

impl ExtractedFeed {
    /// Unpacks every `*.txt` entry of a zip archive into memory. Entries inside
    /// a single sub-directory (`gtfs/stops.txt`) are accepted; macOS resource
    /// forks are ignored.
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut tables = BTreeMap::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let Some(table) = table_name_for_entry(&entry_name) else {
                debug!(entry = %entry_name, "Skipping non-table archive entry");
                continue;
            };
            if tables.contains_key(&table) {
                warn!(entry = %entry_name, table = %table, "Duplicate table in archive, keeping the first");
                continue;
            }

            let mut data = Vec::with_capacity(initial_capacity(entry.size()));
            entry
                .read_to_end(&mut data)
                .map_err(zip::result::ZipError::Io)?;
            tables.insert(table, data);
        }

        Ok(Self::from_tables(tables))
    }

    /// Builds a feed from already-available table contents.
    pub fn from_tables<I, K>(tables: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        let tables = tables
            .into_iter()
            .map(|(name, data)| (name.into(), strip_bom(data)))
            .collect();
        Self { tables }
    }

    pub fn table(&self, table: Table) -> Option<&[u8]> {
        self.tables.get(table.name()).map(Vec::as_slice)
    }

    pub fn has(&self, table: Table) -> bool {
        self.tables.contains_key(table.name())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn identity(&self, source: &str) -> FeedIdentity {
        let checksums = self
            .tables
            .iter()
            .map(|(name, data)| {
                let mut crc = flate2::Crc::new();
                crc.update(data);
                (name.clone(), crc.sum())
            })
            .collect();
        FeedIdentity {
            source: source.to_string(),
            checksums,
        }
    }
}

/// An extracted, validated feed together with its identity.
#[derive(Clone, Debug)]
pub struct LoadedFeed {
    pub identity: FeedIdentity,
    pub extracted: ExtractedFeed,
}

/// Checks that every required table is present, reporting all missing ones
/// at once.
pub fn validate(feed: &ExtractedFeed) -> Result<(), FeedError> {
    let mut missing: Vec<String> = REQUIRED_TABLES
        .iter()
        .filter(|table| !feed.has(**table))
        .map(|table| table.name().to_string())
        .collect();

    if !feed.has(Table::Calendar) && !feed.has(Table::CalendarDates) {
        missing.push(format!(
            "{} or {}",
            Table::Calendar.name(),
            Table::CalendarDates.name()
        ));
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FeedError::MissingTables { missing })
    }
}

/// Extracts and validates an archive held in memory.
pub fn open_archive(bytes: &[u8]) -> Result<ExtractedFeed, FeedError> {
    let feed = ExtractedFeed::from_zip_bytes(bytes)?;
    validate(&feed)?;
    Ok(feed)
}

/// Reads the archive bytes for `source`, over HTTP or from disk.
#[tracing::instrument(skip_all, fields(source = %source))]
pub async fn retrieve<C: HttpClient + ?Sized>(
    client: &C,
    source: &FeedSource,
) -> Result<Bytes, FeedError> {
    match source {
        FeedSource::Url(url) => fetch_bytes(client, url).await,
        FeedSource::Path(path) => read_local(path),
    }
}

/// Full loader pipeline: retrieve, extract, validate.
pub async fn load<C: HttpClient + ?Sized>(
    client: &C,
    source: &FeedSource,
) -> Result<LoadedFeed, FeedError> {
    let bytes = retrieve(client, source).await?;
    let extracted = open_archive(&bytes)?;
    let identity = extracted.identity(&source.to_string());
    info!(
        source = %source,
        bytes = bytes.len(),
        tables = identity.checksums.len(),
        "Feed archive extracted and validated"
    );
    Ok(LoadedFeed {
        identity,
        extracted,
    })
}

fn read_local(path: &Path) -> Result<Bytes, FeedError> {
    std::fs::read(path)
        .map(Bytes::from)
        .map_err(|e| FeedError::Retrieval {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })
}

fn table_name_for_entry(entry_name: &str) -> Option<String> {
    if entry_name.starts_with("__MACOSX/") {
        return None;
    }
    let path = Path::new(entry_name);
    if path.extension().and_then(|e| e.to_str()) != Some("txt") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with("._") {
        return None;
    }
    Some(stem.to_string())
}

fn strip_bom(mut data: Vec<u8>) -> Vec<u8> {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        data.drain(..3);
    }
    data
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;

    use zip::write::FileOptions;

    /// Packs `(file name, contents)` pairs into an in-memory zip archive.
    pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
