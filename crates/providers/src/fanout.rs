//! Bounded fan-out across providers, pages and servers.
//!
//! Each helper takes a [`TaskRunner`], so the caller picks the concurrency
//! and owns the cancellation token.

use crate::capability::{Capability, Feed};
use crate::entry::ProviderEntry;
use crate::error::{ProviderError, ProviderResult};
use crate::registry::ProviderRegistry;
use shared::config::ConcurrencyConfig;
use shared::{Episode, SearchItem, Video};
use std::ops::RangeInclusive;
use throttle::TaskRunner;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One runner per call-site family, sized from `[concurrency]`.
///
/// All three share `cancel`, so firing it stops every fan-out at once.
#[derive(Clone)]
pub struct FanoutRunners {
    /// For [`search_all`]
    pub providers: TaskRunner,
    /// For [`fetch_feed_pages`]
    pub pages: TaskRunner,
    /// For [`resolve_videos`] and `ExtractorDispatcher::extract_all`
    pub servers: TaskRunner,
}

impl FanoutRunners {
    pub fn from_config(config: &ConcurrencyConfig, cancel: CancellationToken) -> Self {
        debug!(
            provider_fanout = config.provider_fanout,
            page_fanout = config.page_fanout,
            extraction_fanout = config.extraction_fanout,
            "Building fan-out runners"
        );
        Self {
            providers: TaskRunner::new(config.provider_fanout).with_cancellation(cancel.clone()),
            pages: TaskRunner::new(config.page_fanout).with_cancellation(cancel.clone()),
            servers: TaskRunner::new(config.extraction_fanout).with_cancellation(cancel),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.providers.cancellation()
    }
}

/// Search results from one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSearch {
    pub key: String,
    pub name: String,
    pub items: Vec<SearchItem>,
}

/// Search every source provider and keep what succeeds, in registration
/// order. Failing providers are logged and left out.
pub async fn search_all(
    registry: &ProviderRegistry,
    query: &str,
    page: u32,
    runner: &TaskRunner,
) -> Vec<ProviderSearch> {
    let providers = registry.get_all(Capability::Source);
    let cancel = runner.cancellation().clone();

    let outcomes = runner
        .collect(providers.iter().map(|entry| {
            let cancel = &cancel;
            async move {
                let source = entry.source().ok_or(ProviderError::Unsupported("search"))?;
                let items = source.search(query, page, cancel).await?;
                Ok::<_, ProviderError>(ProviderSearch {
                    key: entry.key().to_string(),
                    name: entry.name().to_string(),
                    items,
                })
            }
        }))
        .await;

    let mut results = Vec::new();
    for (entry, outcome) in providers.iter().zip(outcomes) {
        match outcome {
            Ok(found) => results.push(found),
            Err(err) if err.is_canceled() => {}
            Err(err) => warn!(provider = entry.key(), query, error = %err, "Search failed"),
        }
    }

    info!(
        query,
        providers = providers.len(),
        answered = results.len(),
        "Search finished"
    );
    results
}

/// Fetch a range of feed pages from one provider, concatenated in page
/// order. Any failing page fails the whole fetch.
pub async fn fetch_feed_pages(
    entry: &ProviderEntry,
    feed: Feed,
    pages: RangeInclusive<u32>,
    runner: &TaskRunner,
) -> ProviderResult<Vec<SearchItem>> {
    let feeds = match entry.feeds() {
        Some(feeds) if entry.supports_feed(feed) => feeds,
        _ => return Err(ProviderError::Unsupported(feed.name())),
    };
    let cancel = runner.cancellation().clone();

    let pages = runner
        .try_all(pages.map(|page| feeds.feed(feed, page, &cancel)))
        .await?;

    Ok(pages.into_iter().flatten().collect())
}

/// Resolve every server of an episode into videos, in server order.
///
/// Servers that fail are skipped. The call only fails when the server list
/// cannot be fetched, or when every server failed.
pub async fn resolve_videos(
    entry: &ProviderEntry,
    episode: &Episode,
    runner: &TaskRunner,
) -> ProviderResult<Vec<Video>> {
    let video = entry.video().ok_or(ProviderError::Unsupported("videos"))?;
    let cancel = runner.cancellation().clone();

    let servers = video.servers(episode, &cancel).await?;
    let outcomes = runner
        .collect(servers.iter().map(|server| video.videos(server, &cancel)))
        .await;

    let mut videos = Vec::new();
    let mut failed = 0;
    let mut first_failure: Option<ProviderError> = None;
    for (server, outcome) in servers.iter().zip(outcomes) {
        match outcome {
            Ok(found) => videos.extend(found),
            Err(err) => {
                let err = ProviderError::from(err);
                if !err.is_canceled() {
                    warn!(
                        provider = entry.key(),
                        server = %server.name,
                        error = %err,
                        "Server failed"
                    );
                }
                failed += 1;
                first_failure.get_or_insert(err);
            }
        }
    }

    // A server with no matching extractor answers with nothing, not an error.
    match first_failure {
        Some(err) if failed == servers.len() => Err(err),
        _ => Ok(videos),
    }
}
