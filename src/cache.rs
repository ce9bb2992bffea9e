//! Memoised metrics per feed version and service date.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::loader::FeedIdentity;
use crate::metrics::MetricsBundle;

/// Computed bundles keyed by feed identity, then date.
///
/// There is no eviction; entries live until the owner invalidates them.
#[derive(Debug, Default)]
pub struct MetricsCache {
    entries: HashMap<FeedIdentity, HashMap<NaiveDate, Arc<MetricsBundle>>>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feed: &FeedIdentity, date: NaiveDate) -> Option<Arc<MetricsBundle>> {
        self.entries.get(feed)?.get(&date).cloned()
    }

    pub fn insert(&mut self, feed: FeedIdentity, date: NaiveDate, bundle: Arc<MetricsBundle>) {
        self.entries.entry(feed).or_default().insert(date, bundle);
    }

    /// Drops every entry computed from `feed`.
    pub fn invalidate_feed(&mut self, feed: &FeedIdentity) {
        let dropped = self.entries.remove(feed).map_or(0, |dates| dates.len());
        debug!(dropped, "Cache entries invalidated");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached bundles across all feeds.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }
}
