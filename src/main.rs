//! market-feed command-line browser.
//!
//! Runs a browse session for the listings page against the configured REST
//! API and logs each published snapshot.
//!
//! ```text
//! market-feed [SEARCH] [--more N]
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use market_feed::config::FeedConfig;
use market_feed::domain::{NftListing, QueryCriteria};
use market_feed::pipeline::{BrowseEvent, BrowseSession, BrowseSnapshot, Region};
use market_feed::source::RestSource;
use market_feed::storage::{JsonFileStore, KeyValueStore, SearchHistory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = FeedConfig::from_env().context("loading configuration")?;
    let (search, load_more) = parse_args(std::env::args().skip(1))?;
    tracing::info!(api = %config.api_base_url, search = %search, "starting market-feed");

    // Build the listings session
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(config.state_path.clone()));
    let history = SearchHistory::load(store, config.recent_search_cap);
    let source = Arc::new(RestSource::listings(&config).context("building REST source")?);
    let mut session = BrowseSession::new(source, &config).with_history(history);
    let mut snapshots = session.subscribe();
    session.start(QueryCriteria::new().with_search(search));

    let (events, events_rx) = mpsc::channel(16);
    let runner = tokio::spawn(session.run(events_rx));

    let mut presses = 0;
    loop {
        let snapshot = {
            let Ok(snapshot) = snapshots
                .wait_for(|s| !matches!(s.region, Region::Idle | Region::Loading))
                .await
            else {
                break;
            };
            snapshot.clone()
        };
        report(&snapshot);

        let done = matches!(snapshot.region, Region::Error { .. } | Region::Empty)
            || presses >= load_more
            || !snapshot.can_load_more;
        if done {
            break;
        }
        presses += 1;
        let shown = snapshot.items.len();
        events
            .send(BrowseEvent::LoadMore)
            .await
            .context("browse session stopped")?;
        snapshots
            .wait_for(|s| s.items.len() > shown || !matches!(s.region, Region::Items))
            .await
            .context("browse session stopped")?;
    }

    drop(events);
    runner.await.context("browse session panicked")?;
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<(String, usize)> {
    let mut search = Vec::new();
    let mut load_more = 0;
    while let Some(arg) = args.next() {
        if arg == "--more" {
            let value = args.next().context("--more needs a count")?;
            load_more = value
                .parse()
                .with_context(|| format!("invalid --more count `{value}`"))?;
        } else {
            search.push(arg);
        }
    }
    Ok((search.join(" "), load_more))
}

fn report(snapshot: &BrowseSnapshot<NftListing>) {
    match &snapshot.region {
        Region::Error { message, retained } => {
            tracing::error!(retained, "{message}");
        }
        Region::Empty => tracing::info!("no listings match"),
        Region::Idle | Region::Loading | Region::Items => {
            tracing::info!(
                shown = snapshot.items.len(),
                total = ?snapshot.total,
                more = snapshot.can_load_more,
                "listings"
            );
            for item in &snapshot.items {
                tracing::info!(
                    id = %item.id.short(),
                    name = %item.name,
                    price = item.price,
                    currency = %item.currency,
                    category = %item.category,
                    "listing"
                );
            }
        }
    }
    if !snapshot.recent_searches.is_empty() {
        tracing::info!(recent = ?snapshot.recent_searches, "recent searches");
    }
}
