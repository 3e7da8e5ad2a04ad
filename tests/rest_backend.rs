//! End-to-end tests of the REST source and the browse session against a
//! stub marketplace API served by axum on an ephemeral port.

#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use market_feed::config::{FeedConfig, PaginationConfig};
use market_feed::domain::{
    Cursor, CursorStyle, Field, FilterValue, NftListing, PageMeta, PageRequest, PageResponse,
    QueryCriteria, RecordId,
};
use market_feed::error::FeedError;
use market_feed::pipeline::{Applied, BrowseEvent, BrowseSession, Fetcher, Region};
use market_feed::source::{MemorySource, PageSource, RestSource};
use market_feed::storage::{KeyValueStore, MemoryStore, SearchHistory};

/// Shared state of the stub backend.
#[derive(Clone)]
struct Backend {
    catalog: MemorySource<NftListing>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl Backend {
    fn new() -> Self {
        let mut items: Vec<NftListing> = (1..=6).map(|n| listing(n, "Cosmic Cat", "art")).collect();
        items.extend((7..=10).map(|n| listing(n, "Fast Fox", "music")));
        Self {
            catalog: MemorySource::new(items),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

fn listing(n: u32, name: &str, category: &str) -> NftListing {
    NftListing {
        id: RecordId::new(),
        name: format!("{name} #{n:02}"),
        description: None,
        image_url: None,
        price: f64::from(n) / 10.0,
        currency: "ETH".to_string(),
        category: category.to_string(),
        status: "listed".to_string(),
        collection: None,
        creator: None,
        is_verified: n % 3 == 0,
        created_at: Utc
            .timestamp_opt(1_700_000_000 + i64::from(n), 0)
            .single()
            .unwrap_or_default(),
    }
}

/// `GET /api/v1/nfts` — answers from the in-memory catalog.
async fn list_nfts(
    State(backend): State<Backend>,
    RawQuery(raw): RawQuery,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Ok(mut queries) = backend.queries.lock() {
        queries.push(raw.unwrap_or_default());
    }

    let mut criteria = QueryCriteria::new();
    if let Some(q) = params.get("q") {
        criteria = criteria.with_search(q.clone());
    }
    if let Some(category) = params.get("category") {
        criteria.set_filter(Field::Category, FilterValue::parse(category));
    }
    if let Some(sort) = params.get("sort").and_then(|s| s.parse().ok()) {
        criteria.sort = sort;
    }
    let offset = params.get("start").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let request = PageRequest::new(criteria, Cursor::Offset { offset, limit });

    match backend.catalog.query(&request) {
        Ok(page) => Json(PageResponse {
            data: page.items,
            meta: Some(PageMeta {
                page: None,
                total: page.total,
            }),
            has_more: Some(page.has_more),
            next_page_token: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": { "code": 1001, "message": e.to_string() } })),
        )
            .into_response(),
    }
}

/// `GET /api/v1/broken` — provider rejected the API key.
async fn broken() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": { "code": 4010, "message": "Invalid API key", "details": null }
        })),
    )
        .into_response()
}

/// `GET /api/v1/garbled` — success status with a non-page body.
async fn garbled() -> &'static str {
    "<html>maintenance</html>"
}

/// `GET /api/v1/slow` — never answers within the client timeout.
async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::new();
    let app = Router::new()
        .route("/api/v1/nfts", get(list_nfts))
        .route("/api/v1/broken", get(broken))
        .route("/api/v1/garbled", get(garbled))
        .route("/api/v1/slow", get(slow))
        .with_state(backend.clone());

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind stub backend");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("stub backend has no address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api/v1"), backend)
}

fn config(base: &str) -> FeedConfig {
    FeedConfig {
        api_base_url: base.to_string(),
        request_timeout: Some(Duration::from_millis(500)),
        pagination: PaginationConfig {
            style: CursorStyle::Offset,
            initial_limit: 4,
            load_more_limit: 3,
        },
        items_per_page: 4,
        debounce: Duration::from_millis(20),
        ..FeedConfig::default()
    }
}

fn rest_source(config: &FeedConfig, path: &str) -> RestSource<NftListing> {
    let Ok(source) = RestSource::new(config, path) else {
        panic!("REST source must build");
    };
    source
}

#[tokio::test]
async fn search_request_carries_only_active_parameters() {
    let (base, backend) = spawn_backend().await;
    let source = rest_source(&config(&base), "/nfts");

    let criteria = QueryCriteria::new()
        .with_search("cosmic")
        .with_filter(Field::Category, FilterValue::parse("all-categories"));
    let request = PageRequest::new(criteria, Cursor::initial(CursorStyle::Offset, 20));
    let Ok(page) = source.fetch_page(&request).await else {
        panic!("page must load");
    };

    assert_eq!(page.items.len(), 6);
    assert!(page.items.iter().all(|i| i.name.starts_with("Cosmic Cat")));
    assert_eq!(page.total, Some(6));
    assert!(!page.has_more);
    assert_eq!(
        backend.queries(),
        vec!["q=cosmic&sort=created_at-desc&start=0&limit=20".to_string()]
    );
}

#[tokio::test]
async fn fetcher_walks_the_catalog_chunk_by_chunk() {
    let (base, backend) = spawn_backend().await;
    let config = config(&base);
    let source = rest_source(&config, "/nfts");
    let mut fetcher = Fetcher::new(config.pagination);

    let ticket = fetcher.start_query(QueryCriteria::new());
    assert_eq!(fetcher.fetch(&source, ticket).await, Applied::Replaced { count: 4 });
    while let Some(ticket) = fetcher.start_load_more() {
        let applied = fetcher.fetch(&source, ticket).await;
        assert!(matches!(applied, Applied::Appended { added } if added > 0));
    }

    assert_eq!(fetcher.buffer().len(), 10);
    assert_eq!(fetcher.total(), Some(10));
    let windows: Vec<String> = backend
        .queries()
        .iter()
        .filter_map(|q| q.split_once("&start=").map(|(_, w)| w.to_string()))
        .collect();
    assert_eq!(windows, ["0&limit=4", "4&limit=3", "7&limit=3"]);
}

#[tokio::test]
async fn upstream_failures_map_to_feed_errors() {
    let (base, _backend) = spawn_backend().await;
    let config = config(&base);
    let request = PageRequest::new(QueryCriteria::new(), Cursor::initial(CursorStyle::Offset, 4));

    let broken = rest_source(&config, "/broken").fetch_page(&request).await;
    let Err(err) = broken else {
        panic!("401 must fail");
    };
    assert!(matches!(err, FeedError::Http { status: 401, .. }));
    assert!(err.user_message().contains("API key"));

    let garbled = rest_source(&config, "/garbled").fetch_page(&request).await;
    assert!(matches!(garbled, Err(FeedError::Decode(_))));

    let slow = rest_source(&config, "/slow").fetch_page(&request).await;
    assert!(matches!(slow, Err(FeedError::Timeout)));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no address");
    };
    drop(listener);

    let source = rest_source(&config(&format!("http://{addr}/api/v1")), "/nfts");
    let request = PageRequest::new(QueryCriteria::new(), Cursor::initial(CursorStyle::Offset, 4));
    let result = source.fetch_page(&request).await;
    assert!(matches!(result, Err(FeedError::Transport(_))));
}

#[tokio::test]
async fn browse_session_searches_over_http() {
    let (base, backend) = spawn_backend().await;
    let config = config(&base);
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let history = SearchHistory::load(Arc::clone(&store), config.recent_search_cap);
    let source = Arc::new(rest_source(&config, "/nfts"));

    let session = BrowseSession::new(source, &config).with_history(history);
    let mut rx = session.subscribe();
    let (events, events_rx) = mpsc::channel(8);
    let handle = tokio::spawn(session.run(events_rx));

    for prefix in ["f", "fo", "fox"] {
        assert!(events.send(BrowseEvent::SearchInput(prefix.to_string())).await.is_ok());
    }
    let waited = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.criteria.search == "fox" && s.region == Region::Items),
    )
    .await;
    let Ok(Ok(snapshot)) = waited else {
        panic!("search results never arrived");
    };
    let snapshot = snapshot.clone();

    assert_eq!(snapshot.items.len(), 4);
    assert!(snapshot.items.iter().all(|i| i.name.starts_with("Fast Fox")));
    assert_eq!(snapshot.location, vec![("q".to_string(), "fox".to_string())]);
    assert_eq!(snapshot.recent_searches, vec!["fox".to_string()]);
    assert!(!backend.queries().iter().any(|q| q.starts_with("q=f&")));
    assert!(matches!(store.get("recent_searches"), Ok(Some(raw)) if raw == r#"["fox"]"#));

    drop(events);
    assert!(handle.await.is_ok());
}

#[tokio::test]
async fn short_final_page_disables_load_more() {
    let (base, backend) = spawn_backend().await;
    let config = config(&base);
    let source = Arc::new(rest_source(&config, "/nfts"));

    let session = BrowseSession::new(source, &config);
    let mut rx = session.subscribe();
    let (events, events_rx) = mpsc::channel(8);
    let handle = tokio::spawn(session.run(events_rx));

    assert!(events.send(BrowseEvent::SearchInput("cosmic".to_string())).await.is_ok());
    let first = {
        let waited = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.criteria.search == "cosmic" && s.region == Region::Items),
        )
        .await;
        let Ok(Ok(first)) = waited else {
            panic!("search results never arrived");
        };
        first.clone()
    };
    assert_eq!(first.items.len(), 4);
    assert_eq!(first.total, Some(6));
    assert!(first.can_load_more);

    assert!(events.send(BrowseEvent::LoadMore).await.is_ok());
    let waited = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.items.len() == 6)).await;
    let Ok(Ok(last)) = waited else {
        panic!("second chunk never arrived");
    };
    assert!(last.items.iter().all(|i| i.name.starts_with("Cosmic Cat")));
    assert_eq!(last.region, Region::Items);
    assert!(!last.can_load_more);
    drop(last);

    let queries = backend.queries();
    assert_eq!(
        queries.last().map(String::as_str),
        Some("q=cosmic&sort=created_at-desc&start=4&limit=3")
    );

    drop(events);
    assert!(handle.await.is_ok());
}
