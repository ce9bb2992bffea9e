use serde::{Deserialize, Serialize};

use super::read_table;
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agency {
    #[serde(rename = "agency_id")]
    pub id: Option<String>,
    #[serde(rename = "agency_name")]
    pub name: String,
    #[serde(rename = "agency_url")]
    pub url: Option<String>,
    #[serde(rename = "agency_timezone")]
    pub timezone: Option<String>,
}

/// `agency.txt` is optional here; an absent table yields no agencies.
pub(crate) fn load(feed: &ExtractedFeed) -> Result<Vec<Agency>, FeedError> {
    Ok(read_table::<Agency>(feed, Table::Agency)?
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.record)
        .collect())
}
