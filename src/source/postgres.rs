//! PostgreSQL page source using `sqlx::PgPool`.
//!
//! Renders a [`RequestDescriptor`] as a parameterised statement:
//!
//! ```sql
//! SELECT row_to_json(t) FROM <table> t
//!  WHERE <constraints> ORDER BY <column> <dir>, id <dir> LIMIT $n OFFSET $m
//! ```
//!
//! plus a `COUNT(*)` with the same `WHERE` clause for the total. Table and
//! column names only ever come from [`TableSpec`] and [`Field`]; every
//! user-supplied value is bound.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::PageSource;
use crate::config::FeedConfig;
use crate::domain::{Cursor, FeedItem, Field, Page, PageRequest, SortDirection};
use crate::error::FeedError;
use crate::pipeline::query_builder::{Constraint, RequestDescriptor};

/// Table a source reads from and the columns free-text search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub table: &'static str,
    /// Text columns matched by the search term.
    pub search_columns: &'static [&'static str],
}

impl TableSpec {
    /// Marketplace listings.
    pub const LISTINGS: Self = Self {
        table: "nfts",
        search_columns: &["name", "description", "collection"],
    };

    /// Registered users (admin console).
    pub const USERS: Self = Self {
        table: "users",
        search_columns: &["username", "wallet_address", "email"],
    };

    /// Moderation reports (admin console).
    pub const REPORTS: Self = Self {
        table: "reports",
        search_columns: &["target_name", "reason"],
    };
}

/// Page source reading rows straight from Postgres.
#[derive(Debug, Clone)]
pub struct PgSource<T> {
    pool: PgPool,
    table: TableSpec,
    _item: PhantomData<fn() -> T>,
}

impl<T> PgSource<T> {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool, table: TableSpec) -> Self {
        Self {
            pool,
            table,
            _item: PhantomData,
        }
    }

    /// Connects using `DATABASE_URL` and the pool settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if no database URL is configured, or
    /// the mapped `sqlx` error if the connection fails.
    pub async fn connect(config: &FeedConfig, table: TableSpec) -> Result<Self, FeedError> {
        let Some(url) = config.database_url.as_deref() else {
            return Err(FeedError::Config(
                "DATABASE_URL is required for the database source".to_string(),
            ));
        };
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(url)
            .await?;
        tracing::info!(table = table.table, "connected to database");
        Ok(Self::new(pool, table))
    }

    /// Table this source reads.
    #[must_use]
    pub const fn table(&self) -> TableSpec {
        self.table
    }
}

impl<T> PageSource<T> for PgSource<T>
where
    T: FeedItem + DeserializeOwned,
{
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, FeedError> {
        let descriptor = RequestDescriptor::build(request);
        let offset = window_offset(&descriptor.window)?;
        let mut select = select_query(self.table, &descriptor, offset)?;
        let mut count = count_query(self.table, &descriptor)?;

        let (rows, total) = tokio::try_join!(
            select
                .build_query_scalar::<serde_json::Value>()
                .fetch_all(&self.pool),
            count.build_query_scalar::<i64>().fetch_one(&self.pool),
        )?;

        let items = rows
            .into_iter()
            .map(serde_json::from_value::<T>)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| FeedError::Decode(format!("{} row: {e}", self.table.table)))?;
        let total = u64::try_from(total).unwrap_or(0);
        let has_more = offset.saturating_add(items.len() as u64) < total;
        tracing::debug!(
            table = self.table.table,
            offset,
            received = items.len(),
            total,
            "page loaded"
        );

        Ok(Page {
            items,
            total: Some(total),
            has_more,
            next_token: None,
        })
    }
}

/// Builds the row query for `descriptor` starting at `offset`.
///
/// # Errors
///
/// Returns [`FeedError::InvalidQuery`] if a search is requested against a
/// table without search columns.
pub fn select_query(
    table: TableSpec,
    descriptor: &RequestDescriptor,
    offset: u64,
) -> Result<QueryBuilder<'static, Postgres>, FeedError> {
    let mut builder = QueryBuilder::new("SELECT row_to_json(t) FROM ");
    builder.push(table.table).push(" t");
    push_where(&mut builder, table, &descriptor.constraints)?;

    let direction = match descriptor.order.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    builder
        .push(" ORDER BY t.")
        .push(descriptor.order.field.column())
        .push(" ")
        .push(direction)
        .push(" NULLS LAST, t.id ")
        .push(direction);

    builder
        .push(" LIMIT ")
        .push_bind(i64::from(descriptor.window.limit()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
    Ok(builder)
}

/// Builds the `COUNT(*)` query sharing the row query's `WHERE` clause.
///
/// # Errors
///
/// See [`select_query`].
pub fn count_query(
    table: TableSpec,
    descriptor: &RequestDescriptor,
) -> Result<QueryBuilder<'static, Postgres>, FeedError> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
    builder.push(table.table).push(" t");
    push_where(&mut builder, table, &descriptor.constraints)?;
    Ok(builder)
}

fn window_offset(window: &Cursor) -> Result<u64, FeedError> {
    window.offset().ok_or_else(|| {
        FeedError::InvalidQuery("the database source does not support page tokens".to_string())
    })
}

fn push_where(
    builder: &mut QueryBuilder<'static, Postgres>,
    table: TableSpec,
    constraints: &[Constraint],
) -> Result<(), FeedError> {
    let mut keyword = " WHERE ";
    for constraint in constraints {
        builder.push(keyword);
        keyword = " AND ";
        match constraint {
            Constraint::Search(term) => {
                if table.search_columns.is_empty() {
                    return Err(FeedError::InvalidQuery(format!(
                        "table `{}` has no searchable columns",
                        table.table
                    )));
                }
                let pattern = format!("%{}%", escape_like(term));
                builder.push("(");
                for (i, column) in table.search_columns.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    builder
                        .push("t.")
                        .push(*column)
                        .push(" ILIKE ")
                        .push_bind(pattern.clone())
                        .push(" ESCAPE '\\'");
                }
                builder.push(")");
            }
            Constraint::Equals { field, value } => {
                builder
                    .push("LOWER(t.")
                    .push(field.column())
                    .push("::text) = LOWER(")
                    .push_bind(value.clone())
                    .push(")");
            }
            Constraint::Flag { field, value } => {
                builder
                    .push("t.")
                    .push(field.column())
                    .push(" = ")
                    .push_bind(*value);
            }
            Constraint::Range { field, min, max } => {
                let mut first = true;
                for (bound, op) in [(min, " >= "), (max, " <= ")] {
                    let Some(bound) = bound else {
                        continue;
                    };
                    if !first {
                        builder.push(" AND ");
                    }
                    first = false;
                    builder.push("t.").push(field.column()).push(op);
                    push_number(builder, *field, *bound);
                }
            }
        }
    }
    Ok(())
}

/// Timestamps are compared against epoch seconds.
fn push_number(builder: &mut QueryBuilder<'static, Postgres>, field: Field, value: f64) {
    if field == Field::CreatedAt {
        builder.push("to_timestamp(").push_bind(value).push(")");
    } else {
        builder.push_bind(value);
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
