//! Fetcher: loading state, result buffer and cursor reconciliation.
//!
//! The fetcher is a synchronous state machine (`Idle → Loading →
//! {Success, Error}`) split into two halves so that the I/O can happen
//! anywhere:
//!
//! 1. `start_query` / `start_load_more` / `retry` move to `Loading` and hand
//!    out a [`FetchTicket`] carrying the request and a generation number.
//! 2. `complete` applies the outcome of a ticket. Tickets from an older
//!    generation are discarded, so a slow response for a superseded query
//!    can never overwrite newer results.

use std::collections::HashSet;

use crate::config::PaginationConfig;
use crate::domain::{Cursor, FeedItem, Page, PageRequest, QueryCriteria};
use crate::error::FeedError;
use crate::source::PageSource;
use crate::storage::SearchHistory;

/// Loading state of the current query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing requested yet.
    Idle,
    /// A request is in flight.
    Loading,
    /// The last request succeeded.
    Success,
    /// The last request failed; holds the user-facing message.
    Error(String),
}

/// Whether a ticket replaces the buffer or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First chunk of a new query: replaces the buffer.
    Replace,
    /// Following chunk: appended to the buffer.
    Append,
}

/// Handle for one in-flight request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    generation: u64,
    kind: FetchKind,
    request: PageRequest,
}

impl FetchTicket {
    /// Generation the ticket was issued in.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace or append.
    #[must_use]
    pub const fn kind(&self) -> FetchKind {
        self.kind
    }

    /// The request to send.
    #[must_use]
    pub const fn request(&self) -> &PageRequest {
        &self.request
    }
}

/// What `complete` did with a ticket's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The buffer was replaced with `count` items.
    Replaced {
        /// Buffer length after the replace.
        count: usize,
    },
    /// `added` new items were appended.
    Appended {
        /// Number of items actually added.
        added: usize,
    },
    /// The request failed; the buffer is unchanged.
    Failed,
    /// The ticket was superseded; nothing changed.
    Stale,
}

/// Buffer of fetched items for the current query.
#[derive(Debug)]
pub struct Fetcher<T> {
    pagination: PaginationConfig,
    status: FetchStatus,
    buffer: Vec<T>,
    keys: HashSet<String>,
    total: Option<u64>,
    has_more: bool,
    criteria: QueryCriteria,
    next_cursor: Option<Cursor>,
    generation: u64,
    failed: Option<FetchTicket>,
    history: Option<SearchHistory>,
}

impl<T: FeedItem> Fetcher<T> {
    /// Creates an idle fetcher.
    #[must_use]
    pub fn new(pagination: PaginationConfig) -> Self {
        Self {
            pagination,
            status: FetchStatus::Idle,
            buffer: Vec::new(),
            keys: HashSet::new(),
            total: None,
            has_more: false,
            criteria: QueryCriteria::default(),
            next_cursor: None,
            generation: 0,
            failed: None,
            history: None,
        }
    }

    /// Attaches a recent-search history that successful searches are
    /// recorded in.
    #[must_use]
    pub fn with_history(mut self, history: SearchHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Starts a new query.
    ///
    /// Bumps the generation, resets the cursor, discards the buffer and
    /// enters `Loading`.
    pub fn start_query(&mut self, criteria: QueryCriteria) -> FetchTicket {
        self.generation = self.generation.wrapping_add(1);
        self.buffer.clear();
        self.keys.clear();
        self.total = None;
        self.has_more = false;
        self.next_cursor = None;
        self.failed = None;
        self.criteria = criteria;
        self.status = FetchStatus::Loading;

        let cursor = Cursor::initial(self.pagination.style, self.pagination.initial_limit);
        let request = PageRequest::new(self.criteria.clone(), cursor);
        tracing::debug!(generation = self.generation, cursor = %request.cursor, "query started");
        FetchTicket {
            generation: self.generation,
            kind: FetchKind::Replace,
            request,
        }
    }

    /// Starts fetching the next chunk of the current query.
    ///
    /// Returns `None` while a request is in flight, before the first chunk
    /// arrived, or when the remote result set is exhausted.
    pub fn start_load_more(&mut self) -> Option<FetchTicket> {
        if self.is_loading() || !self.has_more {
            return None;
        }
        let cursor = self.next_cursor.clone()?;
        self.generation = self.generation.wrapping_add(1);
        self.status = FetchStatus::Loading;
        self.failed = None;
        let request = PageRequest::new(self.criteria.clone(), cursor);
        tracing::debug!(generation = self.generation, cursor = %request.cursor, "load more started");
        Some(FetchTicket {
            generation: self.generation,
            kind: FetchKind::Append,
            request,
        })
    }

    /// Re-issues the request that failed last, unchanged.
    ///
    /// Returns `None` unless the fetcher is in the `Error` state.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        if !matches!(self.status, FetchStatus::Error(_)) {
            return None;
        }
        let failed = self.failed.take()?;
        self.generation = self.generation.wrapping_add(1);
        self.status = FetchStatus::Loading;
        tracing::debug!(generation = self.generation, cursor = %failed.request.cursor, "retry started");
        Some(FetchTicket {
            generation: self.generation,
            kind: failed.kind,
            request: failed.request,
        })
    }

    /// Applies the outcome of `ticket`.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<Page<T>, FeedError>) -> Applied {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale response"
            );
            return Applied::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    code = err.error_code(),
                    generation = ticket.generation,
                    "fetch failed"
                );
                self.status = FetchStatus::Error(err.user_message());
                self.failed = Some(ticket);
                return Applied::Failed;
            }
        };

        let received = page.items.len();
        self.next_cursor = Some(ticket.request.cursor.advance(
            received,
            page.next_token,
            self.pagination.load_more_limit,
        ));
        self.has_more = page.has_more;
        if page.total.is_some() {
            self.total = page.total;
        }
        self.status = FetchStatus::Success;

        let applied = match ticket.kind {
            FetchKind::Replace => {
                self.buffer.clear();
                self.keys.clear();
                self.extend_unique(page.items);
                if let Some(term) = ticket.request.criteria.search_term() {
                    self.remember_search(term);
                }
                Applied::Replaced {
                    count: self.buffer.len(),
                }
            }
            FetchKind::Append => Applied::Appended {
                added: self.extend_unique(page.items),
            },
        };
        tracing::debug!(
            generation = ticket.generation,
            received,
            buffered = self.buffer.len(),
            has_more = self.has_more,
            "fetch applied"
        );
        applied
    }

    /// Runs `ticket` against `source` and applies the outcome.
    pub async fn fetch<S>(&mut self, source: &S, ticket: FetchTicket) -> Applied
    where
        S: PageSource<T>,
    {
        let result = source.fetch_page(&ticket.request).await;
        self.complete(ticket, result)
    }

    /// Current loading state.
    #[must_use]
    pub const fn status(&self) -> &FetchStatus {
        &self.status
    }

    /// Returns `true` while a request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, FetchStatus::Loading)
    }

    /// User-facing error message of the last failed request.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            FetchStatus::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Items fetched so far, in remote order.
    #[must_use]
    pub fn buffer(&self) -> &[T] {
        &self.buffer
    }

    /// Remote total reported by the backend, if any.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Whether the backend reported more items after the buffer.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    /// Criteria of the current query.
    #[must_use]
    pub const fn criteria(&self) -> &QueryCriteria {
        &self.criteria
    }

    /// Cursor the next load-more will use.
    #[must_use]
    pub const fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    /// Current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Recent searches, most recent first. Empty without a history.
    #[must_use]
    pub fn recent_searches(&self) -> &[String] {
        self.history
            .as_ref()
            .map(SearchHistory::entries)
            .unwrap_or_default()
    }

    /// Empties the recent-search history.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Storage`] if the history cannot be cleared from
    /// the store.
    pub fn clear_recent_searches(&mut self) -> Result<(), FeedError> {
        match self.history.as_mut() {
            Some(history) => history.clear(),
            None => Ok(()),
        }
    }

    fn extend_unique(&mut self, items: Vec<T>) -> usize {
        let before = self.buffer.len();
        for item in items {
            if self.keys.insert(item.key()) {
                self.buffer.push(item);
            }
        }
        self.buffer.len() - before
    }

    fn remember_search(&mut self, term: &str) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        if let Err(e) = history.record(term) {
            tracing::warn!(error = %e, "could not persist recent search");
        }
    }
}
