//! Page sources: where result chunks come from.
//!
//! Every backend implements [`PageSource`]. The fetcher and the browse
//! session only ever see this trait, so search/admin pages can talk to the
//! REST API or straight to Postgres, while stats pages prefetch once and
//! filter in memory.

pub mod memory;
pub mod postgres;
pub mod rest;

use std::future::Future;

use crate::domain::{Page, PageRequest};
use crate::error::FeedError;

pub use memory::MemorySource;
pub use postgres::{PgSource, TableSpec};
pub use rest::RestSource;

/// A backend that answers one page request at a time.
pub trait PageSource<T>: Send + Sync {
    /// Fetches the chunk described by `request`.
    ///
    /// Implementations must apply every constraint, the sort key and the
    /// cursor window of `request`, and report `has_more` truthfully.
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page<T>, FeedError>> + Send;
}
