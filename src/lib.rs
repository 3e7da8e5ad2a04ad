//! # market-feed
//!
//! Search, filter, sort and incremental-load pipeline for the browse pages
//! of an NFT marketplace.
//!
//! Typed search input is debounced, combined with filter and sort
//! selections into a single request, fetched one chunk at a time from a
//! pluggable source, and revealed incrementally. Responses that arrive for
//! a superseded query never overwrite newer results.
//!
//! ## Architecture
//!
//! ```text
//! Browse page (events, snapshots)
//!     │
//!     ├── BrowseSession (pipeline/session)
//!     │       ├── Debouncer ──── settled search terms
//!     │       ├── Fetcher ────── buffer, cursor, generation
//!     │       └── IncrementalView
//!     │
//!     ├── RequestDescriptor (pipeline/query_builder)
//!     │
//!     ├── PageSource (source/)
//!     │       ├── RestSource ─── marketplace REST API
//!     │       ├── PgSource ───── PostgreSQL
//!     │       └── MemorySource ─ prefetched result sets
//!     │
//!     └── KeyValueStore (storage/) ── recent searches
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod storage;
