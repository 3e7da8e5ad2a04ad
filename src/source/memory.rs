//! In-memory page source.
//!
//! Holds a complete result set and answers page requests by applying the
//! request's constraints, sort key and window locally. Used for the
//! full-buffer strategy (stats pages prefetch everything once, then every
//! criteria change is answered without network traffic) and in tests.

use std::cmp::Ordering;
use std::sync::Arc;

use super::PageSource;
use crate::domain::{Cursor, FeedItem, FieldValue, Page, PageRequest, SortDirection, SortKey};
use crate::error::FeedError;
use crate::pipeline::query_builder::{Constraint, RequestDescriptor};

/// Upper bound on chunks pulled by [`MemorySource::prefetch`].
const MAX_PREFETCH_CHUNKS: usize = 1_000;

/// A fully buffered result set.
#[derive(Debug, Clone)]
pub struct MemorySource<T> {
    items: Arc<Vec<T>>,
}

impl<T: FeedItem> MemorySource<T> {
    /// Wraps `items`, kept in the given order.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    /// Pulls the complete result set for `request` from `source`.
    ///
    /// Follows the cursor chunk by chunk until the source reports no more
    /// data. A chunk that comes back empty while claiming more data ends
    /// the loop, so a misbehaving backend cannot spin it forever.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `source`.
    pub async fn prefetch<S>(source: &S, request: PageRequest) -> Result<Self, FeedError>
    where
        S: PageSource<T>,
    {
        let limit = request.cursor.limit();
        let mut request = request;
        let mut items: Vec<T> = Vec::new();
        for chunk in 0..MAX_PREFETCH_CHUNKS {
            let page = source.fetch_page(&request).await?;
            let received = page.items.len();
            items.extend(page.items);
            if !page.has_more {
                break;
            }
            if received == 0 {
                tracing::warn!(chunk, "source reported more data but sent none; stopping prefetch");
                break;
            }
            request.cursor = request.cursor.advance(received, page.next_token, limit);
        }
        tracing::debug!(items = items.len(), "prefetch complete");
        Ok(Self::new(items))
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Answers `request` synchronously.
    ///
    /// Token cursors carry the stringified offset of the next chunk.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidQuery`] for a token that is not an
    /// offset issued by this source.
    pub fn query(&self, request: &PageRequest) -> Result<Page<T>, FeedError> {
        let descriptor = RequestDescriptor::build(request);
        let mut matched: Vec<&T> = self
            .items
            .iter()
            .filter(|item| descriptor.constraints.iter().all(|c| satisfies(*item, c)))
            .collect();
        matched.sort_by(|a, b| order(*a, *b, descriptor.order));

        let offset = match &descriptor.window {
            Cursor::Token { token: Some(token), .. } => token
                .parse::<u64>()
                .map_err(|_| FeedError::InvalidQuery(format!("unknown page token `{token}`")))?,
            other => other.offset().unwrap_or(0),
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = descriptor.window.limit() as usize;

        let items: Vec<T> = matched
            .iter()
            .skip(start)
            .take(limit)
            .map(|item| (*item).clone())
            .collect();
        let total = matched.len() as u64;
        let end = offset.saturating_add(items.len() as u64);
        let has_more = end < total;
        let next_token = match descriptor.window {
            Cursor::Token { .. } if has_more => Some(end.to_string()),
            _ => None,
        };

        Ok(Page {
            items,
            total: Some(total),
            has_more,
            next_token,
        })
    }
}

impl<T: FeedItem> PageSource<T> for MemorySource<T> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, FeedError> {
        self.query(request)
    }
}

fn satisfies<T: FeedItem>(item: &T, constraint: &Constraint) -> bool {
    match constraint {
        Constraint::Search(term) => {
            let needle = term.to_lowercase();
            item.search_text()
                .iter()
                .any(|text| text.to_lowercase().contains(&needle))
        }
        Constraint::Equals { field, value } => match item.field(*field) {
            Some(FieldValue::Text(text)) => text.eq_ignore_ascii_case(value),
            Some(FieldValue::Number(n)) => value.parse::<f64>().is_ok_and(|v| v == n),
            Some(FieldValue::Bool(b)) => value.parse::<bool>().is_ok_and(|v| v == b),
            Some(FieldValue::Time(_)) | None => false,
        },
        Constraint::Flag { field, value } => {
            matches!(item.field(*field), Some(FieldValue::Bool(b)) if b == *value)
        }
        Constraint::Range { field, min, max } => {
            let Some(n) = item.field(*field).and_then(|v| v.as_number()) else {
                return false;
            };
            min.is_none_or(|min| n >= min) && max.is_none_or(|max| n <= max)
        }
    }
}

/// Items without a value for the sort field go last in either direction.
/// Ties fall back to the item key in the sort direction, matching the
/// `t.id` tie-break of the SQL source.
fn order<T: FeedItem>(a: &T, b: &T, sort: SortKey) -> Ordering {
    let primary = match (a.field(sort.field), b.field(sort.field)) {
        (Some(x), Some(y)) => match sort.direction {
            SortDirection::Asc => x.compare(&y),
            SortDirection::Desc => y.compare(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    primary.then_with(|| match sort.direction {
        SortDirection::Asc => a.key().cmp(&b.key()),
        SortDirection::Desc => b.key().cmp(&a.key()),
    })
}
