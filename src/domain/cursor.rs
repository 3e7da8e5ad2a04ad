//! Pagination cursor.
//!
//! A [`Cursor`] records how far into the remote result set the buffer
//! reaches. It is reset whenever the criteria change and advanced only by
//! "load more" / "next page".

use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

/// Which cursor flavour a backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    /// `start` / `limit` (offset into the result set).
    Offset,
    /// `page` / `limit` (1-indexed page number).
    Page,
    /// `pageToken` / `limit` (provider continuation token).
    Token,
}

impl FromStr for CursorStyle {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "offset" => Ok(Self::Offset),
            "page" => Ok(Self::Page),
            "token" => Ok(Self::Token),
            other => Err(FeedError::Config(format!(
                "cursor style must be `offset`, `page` or `token`, got `{other}`"
            ))),
        }
    }
}

/// Position of the next chunk to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Offset/limit pair.
    Offset {
        /// Number of items already retrieved.
        offset: u64,
        /// Chunk size to request.
        limit: u32,
    },
    /// Page number with a fixed page size.
    Page {
        /// 1-indexed page number.
        page: u32,
        /// Items per page.
        per_page: u32,
    },
    /// Continuation token.
    Token {
        /// Token returned by the previous chunk; `None` on the first chunk.
        token: Option<String>,
        /// Chunk size to request.
        limit: u32,
    },
}

impl Cursor {
    /// Returns the initial cursor of the given style.
    #[must_use]
    pub const fn initial(style: CursorStyle, limit: u32) -> Self {
        match style {
            CursorStyle::Offset => Self::Offset { offset: 0, limit },
            CursorStyle::Page => Self::Page {
                page: 1,
                per_page: limit,
            },
            CursorStyle::Token => Self::Token { token: None, limit },
        }
    }

    /// Number of items requested by this cursor.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        match self {
            Self::Offset { limit, .. } | Self::Token { limit, .. } => *limit,
            Self::Page { per_page, .. } => *per_page,
        }
    }

    /// Offset of the first item this cursor requests, when known.
    ///
    /// Token cursors carry no offset.
    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        match self {
            Self::Offset { offset, .. } => Some(*offset),
            Self::Page { page, per_page } => {
                Some((page.saturating_sub(1) as u64).saturating_mul(*per_page as u64))
            }
            Self::Token { .. } => None,
        }
    }

    /// Returns `true` if this is the first chunk of a query.
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        matches!(
            self,
            Self::Offset { offset: 0, .. } | Self::Page { page: 1, .. } | Self::Token { token: None, .. }
        )
    }

    /// Returns the cursor of the chunk after this one.
    ///
    /// `received` is the number of items the current chunk returned,
    /// `next_token` the provider's continuation token and `next_limit` the
    /// chunk size for offset and token cursors. Page cursors keep their
    /// page size so that page boundaries stay aligned.
    #[must_use]
    pub fn advance(&self, received: usize, next_token: Option<String>, next_limit: u32) -> Self {
        match self {
            Self::Offset { offset, .. } => Self::Offset {
                offset: offset.saturating_add(received as u64),
                limit: next_limit,
            },
            Self::Page { page, per_page } => Self::Page {
                page: page.saturating_add(1),
                per_page: *per_page,
            },
            Self::Token { .. } => Self::Token {
                token: next_token,
                limit: next_limit,
            },
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset { offset, limit } => write!(f, "offset {offset}+{limit}"),
            Self::Page { page, per_page } => write!(f, "page {page}x{per_page}"),
            Self::Token { token, limit } => {
                write!(f, "token {}+{limit}", token.as_deref().unwrap_or("<start>"))
            }
        }
    }
}
