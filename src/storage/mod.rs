//! Persisted client state.
//!
//! A [`KeyValueStore`] is the only place state outlives a browse session.
//! Callers load what they need once at construction and write back on every
//! change; there are no ambient globals.

pub mod history;
pub mod json_file;
pub mod memory;

pub use history::{RECENT_SEARCHES_KEY, SearchHistory};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::FeedError;

/// String key-value store with explicit get / set / clear.
///
/// Values are opaque strings; callers JSON-encode structured values.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Storage`] if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, FeedError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Storage`] if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), FeedError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Storage`] if the backing store cannot be written.
    fn clear(&self, key: &str) -> Result<(), FeedError>;
}
