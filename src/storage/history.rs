//! Recent-search history bound to a key-value store.

use std::sync::Arc;

use super::KeyValueStore;
use crate::domain::RecentSearches;
use crate::error::FeedError;

/// Storage key of the JSON-encoded recent-search list.
pub const RECENT_SEARCHES_KEY: &str = "recent_searches";

/// [`RecentSearches`] with a load-at-init, save-on-change lifecycle.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    recent: RecentSearches,
    store: Arc<dyn KeyValueStore>,
}

impl SearchHistory {
    /// Loads the history from `store`.
    ///
    /// A missing key yields an empty history. An unreadable store or a
    /// corrupt value is logged and also yields an empty history, so a bad
    /// state file never blocks a page from loading.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>, cap: usize) -> Self {
        let entries = match store.get(RECENT_SEARCHES_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding corrupt recent-search history");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read recent-search history");
                Vec::new()
            }
        };
        Self {
            recent: RecentSearches::from_entries(entries, cap),
            store,
        }
    }

    /// Records a term and saves the list if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Storage`] if saving fails; the in-memory list is
    /// updated regardless.
    pub fn record(&mut self, term: &str) -> Result<bool, FeedError> {
        if !self.recent.record(term) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Empties the history and removes it from the store.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Storage`] if the store cannot be written.
    pub fn clear(&mut self) -> Result<(), FeedError> {
        self.recent.clear();
        self.store.clear(RECENT_SEARCHES_KEY)
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        self.recent.entries()
    }

    fn save(&self) -> Result<(), FeedError> {
        let json = serde_json::to_string(self.recent.entries())
            .map_err(|e| FeedError::Storage(e.to_string()))?;
        self.store.set(RECENT_SEARCHES_KEY, &json)
    }
}
