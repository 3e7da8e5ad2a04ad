//! Domain layer: result items, query state, cursors and the page contract.
//!
//! These types carry no I/O. They describe what a browse page asks for
//! ([`QueryCriteria`], [`Cursor`], [`PageRequest`]) and what comes back
//! ([`Page`], [`FeedItem`] implementations), plus the bounded
//! [`RecentSearches`] list.

pub mod cursor;
pub mod field;
pub mod item;
pub mod page;
pub mod query;
pub mod recent;
pub mod record_id;

pub use cursor::{Cursor, CursorStyle};
pub use field::{Field, FieldValue};
pub use item::{AssetStat, FeedItem, ModerationReport, NftListing, UserRecord};
pub use page::{Page, PageMeta, PageRequest, PageResponse};
pub use query::{FilterValue, QueryCriteria, SortDirection, SortKey};
pub use recent::RecentSearches;
pub use record_id::RecordId;
