//! Feed configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Numeric values that fail to parse fall
//! back to their defaults; enumerated values that fail to parse are errors.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::CursorStyle;
use crate::error::FeedError;
use crate::pipeline::query_builder::{ParamStyle, SortStyle};

/// Default first chunk size (`INITIAL_LIMIT`).
pub const DEFAULT_INITIAL_LIMIT: u32 = 20;
/// Default subsequent chunk size (`LOAD_MORE_LIMIT`).
pub const DEFAULT_LOAD_MORE_LIMIT: u32 = 10;
/// Default renderer page size (`ITEMS_PER_PAGE`).
pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;
/// Default debounce delay in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Default recent-search history cap.
pub const DEFAULT_RECENT_SEARCH_CAP: usize = 5;

/// Top-level feed configuration.
///
/// Loaded once at startup via [`FeedConfig::from_env`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the marketplace REST API.
    pub api_base_url: String,

    /// Path of the listing endpoint, appended to `api_base_url`.
    pub listings_path: String,

    /// Per-request timeout. `None` disables the timeout.
    pub request_timeout: Option<Duration>,

    /// How query parameters are named on the wire.
    pub param_style: ParamStyle,

    /// PostgreSQL connection string for the database-backed source.
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Pagination limits.
    pub pagination: PaginationConfig,

    /// Number of items the renderer reveals at a time.
    pub items_per_page: usize,

    /// Delay before a typed search term is propagated.
    pub debounce: Duration,

    /// Maximum number of remembered searches.
    pub recent_search_cap: usize,

    /// File holding persisted client state.
    pub state_path: PathBuf,
}

/// Chunk sizes and cursor flavour used by the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Cursor flavour sent to the backend.
    pub style: CursorStyle,
    /// Size of the first chunk of a new query.
    pub initial_limit: u32,
    /// Size of every following chunk.
    pub load_more_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            style: CursorStyle::Offset,
            initial_limit: DEFAULT_INITIAL_LIMIT,
            load_more_limit: DEFAULT_LOAD_MORE_LIMIT,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api/v1".to_string(),
            listings_path: "/nfts".to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            param_style: ParamStyle::default(),
            database_url: None,
            database_max_connections: 5,
            database_connect_timeout_secs: 5,
            pagination: PaginationConfig::default(),
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            recent_search_cap: DEFAULT_RECENT_SEARCH_CAP,
            state_path: PathBuf::from("market-feed-state.json"),
        }
    }
}

impl FeedConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if `MARKET_SORT_STYLE` or
    /// `MARKET_CURSOR_STYLE` hold an unknown value, or if a limit is zero.
    pub fn from_env() -> Result<Self, FeedError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`FeedConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FeedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("MARKET_API_URL").unwrap_or(defaults.api_base_url);
        let listings_path = lookup("MARKET_LISTINGS_PATH").unwrap_or(defaults.listings_path);
        let timeout_secs: u64 = parse_or(&lookup, "MARKET_REQUEST_TIMEOUT_SECS", 30);
        let request_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let sort = match lookup("MARKET_SORT_STYLE").as_deref() {
            None | Some("combined") => SortStyle::Combined,
            Some("split") => SortStyle::Split,
            Some(other) => {
                return Err(FeedError::Config(format!(
                    "MARKET_SORT_STYLE must be `combined` or `split`, got `{other}`"
                )));
            }
        };
        let search_param = lookup("MARKET_SEARCH_PARAM").unwrap_or_else(|| "q".to_string());
        let param_style = ParamStyle { search_param, sort };

        let style = match lookup("MARKET_CURSOR_STYLE") {
            None => CursorStyle::Offset,
            Some(raw) => raw.parse()?,
        };
        let initial_limit = parse_or(&lookup, "FEED_INITIAL_LIMIT", DEFAULT_INITIAL_LIMIT);
        let load_more_limit = parse_or(&lookup, "FEED_LOAD_MORE_LIMIT", DEFAULT_LOAD_MORE_LIMIT);
        let items_per_page = parse_or(&lookup, "FEED_ITEMS_PER_PAGE", DEFAULT_ITEMS_PER_PAGE);
        if initial_limit == 0 || load_more_limit == 0 || items_per_page == 0 {
            return Err(FeedError::Config(
                "page and chunk sizes must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            listings_path,
            request_timeout,
            param_style,
            database_url: lookup("DATABASE_URL"),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5),
            database_connect_timeout_secs: parse_or(&lookup, "DATABASE_CONNECT_TIMEOUT_SECS", 5),
            pagination: PaginationConfig {
                style,
                initial_limit,
                load_more_limit,
            },
            items_per_page,
            debounce: Duration::from_millis(parse_or(
                &lookup,
                "FEED_DEBOUNCE_MS",
                DEFAULT_DEBOUNCE_MS,
            )),
            recent_search_cap: parse_or(&lookup, "FEED_RECENT_SEARCH_CAP", DEFAULT_RECENT_SEARCH_CAP),
            state_path: lookup("FEED_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
        })
    }
}

/// Parses a looked-up value as `T`, returning `default` on missing
/// or invalid values.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
