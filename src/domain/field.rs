//! Queryable fields and their typed values.
//!
//! [`Field`] is the closed set of attributes a page may filter or sort on.
//! Keeping it closed means every name that reaches a query string or a SQL
//! statement comes from this table, never from user input.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::FeedError;

/// A filterable or sortable attribute of a result item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Display name.
    Name,
    /// Listing or asset price.
    Price,
    /// Creation timestamp.
    CreatedAt,
    /// 24h change percentage (asset stats).
    ChangePercent,
    /// Market capitalisation (asset stats).
    MarketCap,
    /// Trading volume (asset stats).
    Volume,
    /// Listing category.
    Category,
    /// Lifecycle or moderation status.
    Status,
    /// Verified flag.
    Verified,
    /// User role (admin pages).
    Role,
    /// Collection slug.
    Collection,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Name,
        Self::Price,
        Self::CreatedAt,
        Self::ChangePercent,
        Self::MarketCap,
        Self::Volume,
        Self::Category,
        Self::Status,
        Self::Verified,
        Self::Role,
        Self::Collection,
    ];

    /// Database column name, also used in `field-dir` sort tokens.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
            Self::ChangePercent => "change_percent",
            Self::MarketCap => "market_cap",
            Self::Volume => "volume",
            Self::Category => "category",
            Self::Status => "status",
            Self::Verified => "is_verified",
            Self::Role => "role",
            Self::Collection => "collection",
        }
    }

    /// REST query parameter name for equality and flag constraints.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "createdAt",
            Self::ChangePercent => "changePercent",
            Self::MarketCap => "marketCap",
            Self::Volume => "volume",
            Self::Category => "category",
            Self::Status => "status",
            Self::Verified => "isVerified",
            Self::Role => "role",
            Self::Collection => "collection",
        }
    }

    /// REST parameter names for the lower and upper bound of a range.
    #[must_use]
    pub const fn range_params(self) -> (&'static str, &'static str) {
        match self {
            Self::Price => ("minPrice", "maxPrice"),
            Self::CreatedAt => ("createdAfter", "createdBefore"),
            Self::ChangePercent => ("minChange", "maxChange"),
            Self::MarketCap => ("minMarketCap", "maxMarketCap"),
            Self::Volume => ("minVolume", "maxVolume"),
            Self::Name
            | Self::Category
            | Self::Status
            | Self::Verified
            | Self::Role
            | Self::Collection => ("min", "max"),
        }
    }

    /// Returns `true` if the field may be used as a sort key.
    #[must_use]
    pub const fn is_sortable(self) -> bool {
        matches!(
            self,
            Self::Name
                | Self::Price
                | Self::CreatedAt
                | Self::ChangePercent
                | Self::MarketCap
                | Self::Volume
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Field {
    type Err = FeedError;

    /// Accepts either the column name or the REST parameter name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.column() == s || field.param() == s)
            .ok_or_else(|| FeedError::InvalidQuery(format!("unknown field `{s}`")))
    }
}

/// Typed value of a [`Field`] on a concrete item.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Boolean flag.
    Bool(bool),
    /// Timestamp.
    Time(DateTime<Utc>),
}

impl FieldValue {
    /// Orders two values of the same kind.
    ///
    /// Text compares case-insensitively; `NaN` numbers compare equal to
    /// everything. Values of different kinds compare equal so that a
    /// stable sort leaves them in place.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    /// Numeric view used by range constraints. Timestamps map to epoch
    /// seconds.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            #[allow(clippy::cast_precision_loss)]
            Self::Time(t) => Some(t.timestamp() as f64),
            Self::Text(_) | Self::Bool(_) => None,
        }
    }
}
