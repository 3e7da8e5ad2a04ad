//! Browse session: the event loop of one browse page.
//!
//! A [`BrowseSession`] owns the whole pipeline for a page: the search
//! [`Debouncer`], the [`Fetcher`] and the [`IncrementalView`]. It reacts to
//! three inputs on a single task:
//!
//! ```text
//!  BrowseEvent ──► plan() ──► Transition ──► apply()
//!                                            │  Debounce ──► Debouncer ──► settled term ─┐
//!                                            │  Requery / FetchMore / Retry ──► JoinSet ──┤
//!                                            │                                            │
//!  watch::Sender<BrowseSnapshot> ◄── publish ◄┴──────── completions / settled terms ◄─────┘
//! ```
//!
//! Every requery aborts whatever is still in flight; a completion that
//! races past the abort is discarded by the fetcher's generation check.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};

use super::debounce::Debouncer;
use super::fetcher::{Applied, FetchTicket, Fetcher};
use super::view::{IncrementalView, LoadMore, Region};
use crate::config::FeedConfig;
use crate::domain::{FeedItem, Field, FilterValue, Page, QueryCriteria, SortKey};
use crate::error::FeedError;
use crate::source::PageSource;
use crate::storage::SearchHistory;

/// User interaction on a browse page.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseEvent {
    /// The search box changed.
    SearchInput(String),
    /// A filter control changed.
    SetFilter {
        /// Filtered field.
        field: Field,
        /// New selection; [`FilterValue::All`] removes the filter.
        value: FilterValue,
    },
    /// The sort control changed.
    SetSort(SortKey),
    /// "Clear Filters" was pressed.
    ClearFilters,
    /// "Load More" was pressed.
    LoadMore,
    /// "Try Again" was pressed on the error panel.
    Retry,
    /// The page asked for fresh results with unchanged criteria.
    Refresh,
}

/// What the session does in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Feed the raw search text to the debouncer.
    Debounce(String),
    /// Abort in-flight fetches and start a new query.
    Requery {
        /// Criteria of the new query.
        criteria: QueryCriteria,
        /// Also drop a pending debounced search and reset the search box.
        reset_input: bool,
    },
    /// Reveal `count` already-buffered items.
    Reveal(usize),
    /// Fetch the next chunk.
    FetchMore,
    /// Re-issue the failed request.
    Retry,
    /// Nothing to do.
    Ignore,
}

/// Everything a page renders, published after every step.
#[derive(Debug, Clone)]
pub struct BrowseSnapshot<T> {
    /// Which state the results region shows.
    pub region: Region,
    /// Visible items, in remote order.
    pub items: Vec<T>,
    /// Whether "Load More" is enabled.
    pub can_load_more: bool,
    /// Remote total, when known.
    pub total: Option<u64>,
    /// Raw search box text.
    pub search_input: String,
    /// Criteria of the current query.
    pub criteria: QueryCriteria,
    /// Recent searches, most recent first.
    pub recent_searches: Vec<String>,
    /// Address-bar parameters for the current criteria.
    pub location: Vec<(String, String)>,
    /// Fetcher generation the snapshot was taken at.
    pub generation: u64,
}

impl<T> Default for BrowseSnapshot<T> {
    fn default() -> Self {
        Self {
            region: Region::Idle,
            items: Vec::new(),
            can_load_more: false,
            total: None,
            search_input: String::new(),
            criteria: QueryCriteria::default(),
            recent_searches: Vec::new(),
            location: Vec::new(),
            generation: 0,
        }
    }
}

type Completion<T> = (FetchTicket, Result<Page<T>, FeedError>);

/// Search text tagged with the input epoch it was typed in.
type Typed = (u64, String);

/// One browse page wired to a [`PageSource`].
#[derive(Debug)]
pub struct BrowseSession<T, S> {
    source: Arc<S>,
    fetcher: Fetcher<T>,
    view: IncrementalView,
    debouncer: Debouncer<Typed>,
    settled: mpsc::Receiver<Typed>,
    /// Bumped whenever the search box is reset; settled text from an
    /// older epoch is dropped.
    input_epoch: u64,
    tasks: JoinSet<Completion<T>>,
    snapshots: watch::Sender<BrowseSnapshot<T>>,
    input: String,
    search_param: String,
}

impl<T, S> BrowseSession<T, S>
where
    T: FeedItem,
    S: PageSource<T> + 'static,
{
    /// Creates an idle session.
    ///
    /// Must be called from within a Tokio runtime (the debouncer spawns
    /// its timer task here).
    #[must_use]
    pub fn new(source: Arc<S>, config: &FeedConfig) -> Self {
        let (debouncer, settled) = Debouncer::new(config.debounce);
        let (snapshots, _) = watch::channel(BrowseSnapshot::default());
        Self {
            source,
            fetcher: Fetcher::new(config.pagination),
            view: IncrementalView::new(config.items_per_page),
            debouncer,
            settled,
            input_epoch: 0,
            tasks: JoinSet::new(),
            snapshots,
            input: String::new(),
            search_param: config.param_style.search_param.clone(),
        }
    }

    /// Attaches the recent-search history.
    #[must_use]
    pub fn with_history(mut self, history: SearchHistory) -> Self {
        self.fetcher = self.fetcher.with_history(history);
        self
    }

    /// Subscribes to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BrowseSnapshot<T>> {
        self.snapshots.subscribe()
    }

    /// Maps an event to a transition. Does not change any state.
    #[must_use]
    pub fn plan(&self, event: BrowseEvent) -> Transition {
        let current = self.fetcher.criteria();
        match event {
            BrowseEvent::SearchInput(raw) => Transition::Debounce(raw),
            BrowseEvent::SetFilter { field, value } => {
                let mut criteria = current.clone();
                criteria.set_filter(field, value);
                self.requery_if_changed(criteria)
            }
            BrowseEvent::SetSort(sort) => self.requery_if_changed(current.clone().with_sort(sort)),
            BrowseEvent::ClearFilters => Transition::Requery {
                criteria: QueryCriteria::default(),
                reset_input: true,
            },
            BrowseEvent::LoadMore => {
                let len = self.fetcher.buffer().len();
                match self
                    .view
                    .next_step(len, self.fetcher.has_more(), self.fetcher.is_loading())
                {
                    LoadMore::Revealed { count } => Transition::Reveal(count),
                    LoadMore::NeedsFetch => Transition::FetchMore,
                    LoadMore::Busy | LoadMore::Exhausted => Transition::Ignore,
                }
            }
            BrowseEvent::Retry if self.fetcher.error_message().is_some() => Transition::Retry,
            BrowseEvent::Retry => Transition::Ignore,
            BrowseEvent::Refresh => Transition::Requery {
                criteria: current.clone(),
                reset_input: false,
            },
        }
    }

    /// Plans and applies `event`, then publishes a snapshot.
    pub fn handle(&mut self, event: BrowseEvent) {
        let transition = self.plan(event);
        self.apply(transition);
        self.publish();
    }

    /// Starts the first query of the page.
    pub fn start(&mut self, criteria: QueryCriteria) {
        self.reset_input(&criteria.search);
        self.requery(criteria);
        self.publish();
    }

    /// Runs the event loop until `events` closes.
    ///
    /// Starts with the current criteria, so a page shows results before
    /// the first interaction. Closing `events` tears the session down: the
    /// debouncer stops and in-flight fetches are aborted.
    pub async fn run(mut self, mut events: mpsc::Receiver<BrowseEvent>) {
        if self.fetcher.generation() == 0 {
            let criteria = self.fetcher.criteria().clone();
            self.start(criteria);
        }
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                Some(typed) = self.settled.recv() => self.on_settled(typed),
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.on_joined(joined);
                }
            }
        }
        self.tasks.abort_all();
        tracing::debug!("browse session closed");
    }

    fn requery_if_changed(&self, criteria: QueryCriteria) -> Transition {
        if criteria.is_same_query(self.fetcher.criteria()) {
            Transition::Ignore
        } else {
            Transition::Requery {
                criteria,
                reset_input: false,
            }
        }
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Debounce(raw) => {
                self.input.clone_from(&raw);
                self.debouncer.push((self.input_epoch, raw));
            }
            Transition::Requery {
                criteria,
                reset_input,
            } => {
                if reset_input {
                    self.reset_input(&criteria.search);
                }
                self.requery(criteria);
            }
            Transition::Reveal(_) => {
                let len = self.fetcher.buffer().len();
                let _ = self
                    .view
                    .load_more(len, self.fetcher.has_more(), self.fetcher.is_loading());
            }
            Transition::FetchMore => {
                if let Some(ticket) = self.fetcher.start_load_more() {
                    self.spawn(ticket);
                }
            }
            Transition::Retry => {
                if let Some(ticket) = self.fetcher.retry() {
                    self.spawn(ticket);
                }
            }
            Transition::Ignore => {}
        }
    }

    /// Sets the search box text and forgets everything typed before,
    /// including text that already settled but was not applied yet.
    fn reset_input(&mut self, text: &str) {
        self.debouncer.cancel();
        self.input_epoch = self.input_epoch.wrapping_add(1);
        text.clone_into(&mut self.input);
    }

    fn requery(&mut self, criteria: QueryCriteria) {
        self.tasks.abort_all();
        let ticket = self.fetcher.start_query(criteria);
        self.view.reset(0);
        self.spawn(ticket);
    }

    fn spawn(&mut self, ticket: FetchTicket) {
        let source = Arc::clone(&self.source);
        self.tasks.spawn(async move {
            let result = source.fetch_page(ticket.request()).await;
            (ticket, result)
        });
    }

    fn on_settled(&mut self, (epoch, term): Typed) {
        if epoch != self.input_epoch {
            tracing::debug!(%term, "dropping search typed before the input was reset");
            return;
        }
        let criteria = self.fetcher.criteria().clone().with_search(term);
        let transition = self.requery_if_changed(criteria);
        self.apply(transition);
        self.publish();
    }

    fn on_joined(&mut self, joined: Result<Completion<T>, JoinError>) {
        let (ticket, result) = match joined {
            Ok(completion) => completion,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                tracing::error!(error = %e, "fetch task failed");
                return;
            }
        };
        match self.fetcher.complete(ticket, result) {
            Applied::Replaced { count } => self.view.reset(count),
            Applied::Appended { added } => {
                self.view.show_appended(added, self.fetcher.buffer().len());
            }
            Applied::Failed | Applied::Stale => {}
        }
        self.publish();
    }

    /// Builds the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BrowseSnapshot<T> {
        let buffer = self.fetcher.buffer();
        let criteria = self.fetcher.criteria();
        BrowseSnapshot {
            region: self.view.region(self.fetcher.status(), buffer.len()),
            items: self.view.visible(buffer).to_vec(),
            can_load_more: self.view.can_load_more(
                buffer.len(),
                self.fetcher.has_more(),
                self.fetcher.is_loading(),
            ),
            total: self.fetcher.total(),
            search_input: self.input.clone(),
            criteria: criteria.clone(),
            recent_searches: self.fetcher.recent_searches().to_vec(),
            location: criteria.location_pairs(&self.search_param),
            generation: self.fetcher.generation(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::config::PaginationConfig;
    use crate::domain::{CursorStyle, NftListing, PageRequest, RecordId};
    use crate::source::MemorySource;

    fn listing(n: u32, name: &str, category: &str) -> NftListing {
        NftListing {
            id: RecordId::new(),
            name: format!("{name} #{n:02}"),
            description: None,
            image_url: None,
            price: f64::from(n),
            currency: "ETH".to_string(),
            category: category.to_string(),
            status: "listed".to_string(),
            collection: None,
            creator: None,
            is_verified: false,
            created_at: Utc
                .timestamp_opt(1_700_000_000 + i64::from(n), 0)
                .single()
                .unwrap_or_default(),
        }
    }

    fn catalog() -> MemorySource<NftListing> {
        let mut items: Vec<NftListing> = (1..=6).map(|n| listing(n, "Cosmic Cat", "art")).collect();
        items.extend((7..=10).map(|n| listing(n, "Fast Fox", "music")));
        items.extend((11..=12).map(|n| listing(n, "Slow Sloth", "art")));
        MemorySource::new(items)
    }

    fn config(items_per_page: usize) -> FeedConfig {
        FeedConfig {
            pagination: PaginationConfig {
                style: CursorStyle::Offset,
                initial_limit: 4,
                load_more_limit: 3,
            },
            items_per_page,
            debounce: Duration::from_millis(300),
            ..FeedConfig::default()
        }
    }

    /// Wraps a memory source with per-term latency, request recording and
    /// switchable failures.
    #[derive(Debug)]
    struct TestSource {
        inner: MemorySource<NftListing>,
        slow_term: Option<&'static str>,
        fail_next: AtomicBool,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl TestSource {
        fn new(slow_term: Option<&'static str>) -> Self {
            Self {
                inner: catalog(),
                slow_term,
                fail_next: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl PageSource<NftListing> for TestSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Page<NftListing>, FeedError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            if self.slow_term.is_some() && request.criteria.search_term() == self.slow_term {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(FeedError::Timeout);
            }
            self.inner.query(request)
        }
    }

    async fn wait_for<F>(
        rx: &mut watch::Receiver<BrowseSnapshot<NftListing>>,
        predicate: F,
    ) -> BrowseSnapshot<NftListing>
    where
        F: FnMut(&BrowseSnapshot<NftListing>) -> bool,
    {
        let waited = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(predicate)).await;
        let Ok(Ok(snapshot)) = waited else {
            panic!("expected snapshot never arrived");
        };
        snapshot.clone()
    }

    fn names(snapshot: &BrowseSnapshot<NftListing>) -> Vec<String> {
        snapshot.items.iter().map(|i| i.name.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn first_chunk_is_shown_and_revealed_in_pages() {
        let source = Arc::new(TestSource::new(None));
        let session = BrowseSession::new(Arc::clone(&source), &config(2));
        let mut rx = session.subscribe();
        let (events, events_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(events_rx));

        let snapshot = wait_for(&mut rx, |s| s.region == Region::Items).await;
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.total, Some(12));
        assert!(snapshot.can_load_more);
        assert!(snapshot.location.is_empty());

        assert!(events.send(BrowseEvent::LoadMore).await.is_ok());
        let snapshot = wait_for(&mut rx, |s| s.items.len() == 4).await;
        assert!(snapshot.can_load_more);
        // Revealing buffered items needs no request.
        assert_eq!(source.requests().len(), 1);

        assert!(events.send(BrowseEvent::LoadMore).await.is_ok());
        let snapshot = wait_for(&mut rx, |s| s.items.len() == 7).await;
        assert_eq!(snapshot.region, Region::Items);
        assert_eq!(source.requests().len(), 2);

        drop(events);
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_load_more_keeps_items_and_retry_repeats_request() {
        let source = Arc::new(TestSource::new(None));
        let session = BrowseSession::new(Arc::clone(&source), &config(4));
        let mut rx = session.subscribe();
        let (events, events_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(events_rx));

        let before = wait_for(&mut rx, |s| s.region == Region::Items).await;
        assert_eq!(before.items.len(), 4);

        source.fail_next.store(true, Ordering::SeqCst);
        assert!(events.send(BrowseEvent::LoadMore).await.is_ok());
        let failed = wait_for(&mut rx, |s| matches!(s.region, Region::Error { .. })).await;
        let Region::Error { message, retained } = &failed.region else {
            panic!("error region expected");
        };
        assert!(message.contains("timed out"));
        assert_eq!(*retained, 4);
        assert_eq!(names(&failed), names(&before));

        assert!(events.send(BrowseEvent::Retry).await.is_ok());
        let recovered = wait_for(&mut rx, |s| s.items.len() == 7).await;
        assert_eq!(recovered.region, Region::Items);
        assert_eq!(recovered.items.get(..4).map(<[_]>::to_vec), Some(before.items.clone()));

        let requests = source.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests.get(1), requests.get(2));

        drop(events);
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_query_shows_error_and_retry_loads() {
        let source = Arc::new(TestSource::new(None));
        source.fail_next.store(true, Ordering::SeqCst);
        let session = BrowseSession::new(Arc::clone(&source), &config(4));
        let mut rx = session.subscribe();
        let (events, events_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(events_rx));

        let failed = wait_for(&mut rx, |s| matches!(s.region, Region::Error { .. })).await;
        let Region::Error { message, retained } = &failed.region else {
            panic!("error region expected");
        };
        assert!(message.contains("timed out"));
        assert_eq!(*retained, 0);
        assert!(failed.items.is_empty());

        assert!(events.send(BrowseEvent::Retry).await.is_ok());
        let loaded = wait_for(&mut rx, |s| s.region == Region::Items).await;
        assert_eq!(loaded.items.len(), 4);
        assert_eq!(loaded.total, Some(12));

        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests.first(), requests.get(1));

        drop(events);
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn search_settled_before_clear_is_not_applied() {
        let source = Arc::new(TestSource::new(None));
        let mut session = BrowseSession::new(Arc::clone(&source), &config(10));

        session.handle(BrowseEvent::SearchInput("cos".to_string()));
        // Long enough for the debouncer to emit "cos" before the clear.
        tokio::time::sleep(Duration::from_millis(400)).await;
        session.handle(BrowseEvent::ClearFilters);

        let Some(typed) = session.settled.recv().await else {
            panic!("search text must have settled");
        };
        assert_eq!(typed.1, "cos");
        session.on_settled(typed);

        let snapshot = session.snapshot();
        assert!(snapshot.search_input.is_empty());
        assert_eq!(snapshot.criteria.search_term(), None);
        assert!(snapshot.location.is_empty());
        assert!(
            source
                .requests()
                .iter()
                .all(|r| r.criteria.search_term().is_none())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_only_change_keeps_current_query() {
        let source = Arc::new(TestSource::new(None));
        let mut session = BrowseSession::new(Arc::clone(&source), &config(10));
        session.start(QueryCriteria::new().with_search("cosmic"));
        let generation = session.fetcher.generation();

        session.on_settled((session.input_epoch, "cosmic ".to_string()));
        session.on_settled((session.input_epoch, " cosmic".to_string()));
        assert_eq!(session.fetcher.generation(), generation);
        assert_eq!(session.fetcher.criteria().search, "cosmic");

        session.on_settled((session.input_epoch, "cosmo".to_string()));
        assert_ne!(session.fetcher.generation(), generation);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_filters_resets_criteria_and_drops_pending_search() {
        let source = Arc::new(TestSource::new(None));
        let session = BrowseSession::new(Arc::clone(&source), &config(10));
        let mut rx = session.subscribe();
        let (events, events_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(events_rx));
        let initial = wait_for(&mut rx, |s| s.region == Region::Items).await;

        let filter = BrowseEvent::SetFilter {
            field: Field::Category,
            value: FilterValue::parse("music"),
        };
        assert!(events.send(filter).await.is_ok());
        let filtered = wait_for(&mut rx, |s| {
            s.region == Region::Items && !s.criteria.filters.is_empty()
        })
        .await;
        assert_eq!(filtered.total, Some(4));
        assert_eq!(
            filtered.location,
            vec![("category".to_string(), "music".to_string())]
        );

        assert!(events.send(BrowseEvent::SearchInput("cos".to_string())).await.is_ok());
        assert!(events.send(BrowseEvent::ClearFilters).await.is_ok());
        let cleared = wait_for(&mut rx, |s| {
            s.region == Region::Items && s.criteria.is_default()
        })
        .await;
        assert!(cleared.search_input.is_empty());
        assert!(cleared.location.is_empty());
        assert_eq!(names(&cleared), names(&initial));

        // The pending "cos" must never settle into a query.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.borrow().criteria.search.is_empty());
        assert!(
            source
                .requests()
                .iter()
                .all(|r| r.criteria.search_term().is_none())
        );

        drop(events);
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn settled_search_supersedes_slow_query() {
        let source = Arc::new(TestSource::new(Some("slow")));
        let session = BrowseSession::new(Arc::clone(&source), &config(10));
        let mut rx = session.subscribe();
        let (events, events_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(events_rx));
        let _ = wait_for(&mut rx, |s| s.region == Region::Items).await;

        assert!(events.send(BrowseEvent::SearchInput("slow".to_string())).await.is_ok());
        let _ = wait_for(&mut rx, |s| s.criteria.search == "slow").await;

        assert!(events.send(BrowseEvent::SearchInput("fast".to_string())).await.is_ok());
        let fast = wait_for(&mut rx, |s| {
            s.criteria.search == "fast" && s.region == Region::Items
        })
        .await;
        assert_eq!(fast.total, Some(4));
        assert!(names(&fast).iter().all(|n| n.starts_with("Fast Fox")));

        // Long after the slow request would have finished, the fast
        // results are still on screen.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let current = rx.borrow().clone();
        assert_eq!(current.criteria.search, "fast");
        assert!(names(&current).iter().all(|n| n.starts_with("Fast Fox")));

        drop(events);
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_selection_is_ignored() {
        let source = Arc::new(TestSource::new(None));
        let session: BrowseSession<NftListing, TestSource> =
            BrowseSession::new(source, &config(10));
        assert_eq!(
            session.plan(BrowseEvent::SetFilter {
                field: Field::Category,
                value: FilterValue::All,
            }),
            Transition::Ignore
        );
        assert_eq!(
            session.plan(BrowseEvent::SetSort(SortKey::default())),
            Transition::Ignore
        );
        assert_eq!(session.plan(BrowseEvent::Retry), Transition::Ignore);
        assert_eq!(
            session.plan(BrowseEvent::ClearFilters),
            Transition::Requery {
                criteria: QueryCriteria::default(),
                reset_input: true,
            }
        );
    }
}
