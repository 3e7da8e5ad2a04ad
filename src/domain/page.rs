//! Page requests and the response contract.
//!
//! Backends answer with [`PageResponse`]; it is validated and coerced once,
//! at the source boundary, into a [`Page`] so nothing downstream has to
//! guess at optional fields.

use serde::{Deserialize, Serialize};

use super::cursor::Cursor;
use super::query::QueryCriteria;
use crate::error::FeedError;

/// Everything a source needs to produce one chunk of results.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    /// Search, filter and sort selections.
    pub criteria: QueryCriteria,
    /// Position and size of the chunk.
    pub cursor: Cursor,
}

impl PageRequest {
    /// Creates a page request.
    #[must_use]
    pub const fn new(criteria: QueryCriteria, cursor: Cursor) -> Self {
        Self { criteria, cursor }
    }
}

/// Optional pagination metadata in a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Page number echoed by the backend.
    #[serde(default)]
    pub page: Option<u32>,
    /// Total number of matching items.
    #[serde(default)]
    pub total: Option<u64>,
}

/// Wire shape of a list response:
/// `{ data: Item[], meta?: { page, total }, hasMore?: bool, nextPageToken?: string }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    /// Items of this chunk.
    pub data: Vec<T>,
    /// Pagination metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    /// Whether more items follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    /// Continuation token for the next chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T> PageResponse<T> {
    /// Validates the response against the request that produced it.
    ///
    /// - `data` longer than the requested limit is truncated.
    /// - `has_more` resolves from `hasMore`, then `nextPageToken`, then
    ///   `meta.total`, then from whether the chunk came back full.
    /// - A token cursor with `hasMore: true` but no token is rejected, since
    ///   the next chunk could not be requested.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Decode`] if the response is inconsistent.
    pub fn into_page(self, request: &PageRequest) -> Result<Page<T>, FeedError> {
        let limit = request.cursor.limit() as usize;
        let mut data = self.data;
        if data.len() > limit {
            tracing::warn!(
                received = data.len(),
                limit,
                "response exceeded requested limit; truncating"
            );
            data.truncate(limit);
        }

        let total = self.meta.and_then(|m| m.total);
        let next_token = self.next_page_token.filter(|t| !t.is_empty());
        let has_more = match (self.has_more, &next_token, total, request.cursor.offset()) {
            (Some(flag), _, _, _) => flag,
            (None, Some(_), _, _) => true,
            (None, None, Some(total), Some(offset)) => {
                offset.saturating_add(data.len() as u64) < total
            }
            (None, None, _, _) => data.len() == limit && limit > 0,
        };

        if has_more && next_token.is_none() && matches!(request.cursor, Cursor::Token { .. }) {
            return Err(FeedError::Decode(
                "response reports more results but carries no nextPageToken".to_string(),
            ));
        }

        Ok(Page {
            items: data,
            total,
            has_more,
            next_token,
        })
    }
}

/// Validated chunk of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in remote order.
    pub items: Vec<T>,
    /// Total number of matching items, when the backend reports it.
    pub total: Option<u64>,
    /// Whether another chunk can be requested.
    pub has_more: bool,
    /// Continuation token for token cursors.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page with no total and no token.
    #[must_use]
    pub const fn new(items: Vec<T>, has_more: bool) -> Self {
        Self {
            items,
            total: None,
            has_more,
            next_token: None,
        }
    }

    /// Builder-style total setter.
    #[must_use]
    pub const fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}
