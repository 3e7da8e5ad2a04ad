//! The browse pipeline: debounce, build, fetch, render.
//!
//! Each stage is usable on its own; [`session::BrowseSession`] wires them
//! into the event loop of a single page.

pub mod debounce;
pub mod fetcher;
pub mod query_builder;
pub mod session;
pub mod view;

pub use debounce::Debouncer;
pub use fetcher::{Applied, FetchKind, FetchStatus, FetchTicket, Fetcher};
pub use query_builder::{Constraint, ParamStyle, RequestDescriptor, SortStyle};
pub use session::{BrowseEvent, BrowseSession, BrowseSnapshot, Transition};
pub use view::{IncrementalView, LoadMore, Region};
