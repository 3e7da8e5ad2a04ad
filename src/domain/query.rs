//! Query state: search term, filter selections and sort key.
//!
//! [`QueryCriteria`] is the part of a page's query state whose change
//! invalidates everything fetched so far. Pagination lives separately in
//! [`super::Cursor`] so that advancing a page never counts as a new query.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::field::Field;
use crate::error::FeedError;

/// A single filter selection.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Sentinel meaning "no constraint".
    All,
    /// Field must equal this text.
    Equals(String),
    /// Field must equal this flag.
    Flag(bool),
    /// Field must fall within the bounds (inclusive).
    Range {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
}

impl FilterValue {
    /// Parses a select-box value. `""`, `"all"` and any `"all-*"` value
    /// (e.g. `"all-categories"`) are the sentinel.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_sentinel(trimmed) {
            return Self::All;
        }
        match trimmed {
            "true" => Self::Flag(true),
            "false" => Self::Flag(false),
            other => Self::Equals(other.to_string()),
        }
    }

    /// Parses a price bracket such as `"1-10"`, `"100+"` or `"all"`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidQuery`] if the bracket is neither the
    /// sentinel nor a numeric `min-max` / `min+` form.
    pub fn bracket(raw: &str) -> Result<Self, FeedError> {
        let trimmed = raw.trim();
        if is_sentinel(trimmed) {
            return Ok(Self::All);
        }
        let parse = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| FeedError::InvalidQuery(format!("invalid price bracket `{raw}`")))
        };
        if let Some(min) = trimmed.strip_suffix('+') {
            return Ok(Self::Range {
                min: Some(parse(min)?),
                max: None,
            });
        }
        let Some((min, max)) = trimmed.split_once('-') else {
            return Err(FeedError::InvalidQuery(format!(
                "invalid price bracket `{raw}`"
            )));
        };
        let (min, max) = (parse(min)?, parse(max)?);
        if min > max {
            return Err(FeedError::InvalidQuery(format!(
                "price bracket `{raw}` has min above max"
            )));
        }
        Ok(Self::Range {
            min: Some(min),
            max: Some(max),
        })
    }

    /// Returns `true` for the "no constraint" sentinel, including a range
    /// with neither bound.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(
            self,
            Self::All | Self::Range {
                min: None,
                max: None
            }
        )
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Equals(v) => f.write_str(v),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Range {
                min: Some(min),
                max: Some(max),
            } => write!(f, "{min}-{max}"),
            Self::Range {
                min: Some(min),
                max: None,
            } => write!(f, "{min}+"),
            Self::Range {
                min: None,
                max: Some(max),
            } => write!(f, "0-{max}"),
            Self::Range {
                min: None,
                max: None,
            } => f.write_str("all"),
        }
    }
}

fn is_sentinel(raw: &str) -> bool {
    raw.is_empty()
        || raw.eq_ignore_ascii_case("all")
        || raw
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("all-"))
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

impl SortDirection {
    /// Lowercase wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A single user-selectable sort key.
///
/// Sources break ties on the record key in the same direction so that
/// offset windows never overlap; that tie-break is not selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Field to order by. Always sortable.
    pub field: Field,
    /// Direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Creates a sort key.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidQuery`] if `field` is not sortable.
    pub fn new(field: Field, direction: SortDirection) -> Result<Self, FeedError> {
        if field.is_sortable() {
            Ok(Self { field, direction })
        } else {
            Err(FeedError::InvalidQuery(format!(
                "field `{field}` cannot be sorted on"
            )))
        }
    }
}

impl Default for SortKey {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: Field::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.field.column(), self.direction.as_str())
    }
}

impl FromStr for SortKey {
    type Err = FeedError;

    /// Parses `field-asc` / `field-desc`, e.g. `created_at-desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((field, direction)) = s.trim().rsplit_once('-') else {
            return Err(FeedError::InvalidQuery(format!("invalid sort key `{s}`")));
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(FeedError::InvalidQuery(format!(
                    "invalid sort direction `{other}`"
                )));
            }
        };
        Self::new(field.parse()?, direction)
    }
}

/// Search, filter and sort selections of a page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryCriteria {
    /// Raw search term as settled by the debouncer.
    pub search: String,
    /// Filter selections. A missing entry means [`FilterValue::All`].
    pub filters: BTreeMap<Field, FilterValue>,
    /// Active sort key.
    pub sort: SortKey,
}

impl QueryCriteria {
    /// Creates criteria with no search, no filters and the default sort.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style search setter.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Builder-style filter setter.
    #[must_use]
    pub fn with_filter(mut self, field: Field, value: FilterValue) -> Self {
        self.set_filter(field, value);
        self
    }

    /// Builder-style sort setter.
    #[must_use]
    pub const fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Sets or removes a filter. Sentinel values are not stored.
    pub fn set_filter(&mut self, field: Field, value: FilterValue) {
        if value.is_all() {
            self.filters.remove(&field);
        } else {
            self.filters.insert(field, value);
        }
    }

    /// Returns the trimmed search term, or `None` when there is no search.
    ///
    /// An empty or whitespace-only term means "no search", never "search
    /// for the empty string".
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Returns `true` when both criteria describe the same request:
    /// equal trimmed search terms, equal active filters and equal sort.
    #[must_use]
    pub fn is_same_query(&self, other: &Self) -> bool {
        self.search_term() == other.search_term()
            && self.sort == other.sort
            && self.active_filters().eq(other.active_filters())
    }

    /// Returns the active (non-sentinel) filters.
    pub fn active_filters(&self) -> impl Iterator<Item = (Field, &FilterValue)> {
        self.filters
            .iter()
            .filter(|(_, value)| !value.is_all())
            .map(|(field, value)| (*field, value))
    }

    /// Returns `true` when no search, no filter and the default sort are set.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.search_term().is_none()
            && self.active_filters().next().is_none()
            && self.sort == SortKey::default()
    }

    /// Resets search, filters and sort to their defaults.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Address-bar parameters describing these criteria.
    ///
    /// Only non-default selections appear; cleared criteria yield no
    /// parameters at all.
    #[must_use]
    pub fn location_pairs(&self, search_param: &str) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(term) = self.search_term() {
            pairs.push((search_param.to_string(), term.to_string()));
        }
        for (field, value) in self.active_filters() {
            pairs.push((field.param().to_string(), value.to_string()));
        }
        if self.sort != SortKey::default() {
            pairs.push(("sort".to_string(), self.sort.to_string()));
        }
        pairs
    }
}
