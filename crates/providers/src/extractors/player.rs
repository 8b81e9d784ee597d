//! Embedded player pages.
//!
//! Fetches the embed page, pulls media URLs out of the player setup script
//! and expands them: playlists through [`HlsExtractor`], files as-is. The
//! expansion runs on a bounded runner tied to the caller's token.

use super::direct::quality_hint;
use super::{HlsExtractor, VideoExtractor};
use crate::error::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use shared::{Video, VideoFormat, VideoServer};
use std::collections::BTreeMap;
use std::sync::Arc;
use throttle::TaskRunner;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static MEDIA_SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?i)\b(?:file|src|source)["']?\s*[:=]\s*["']"#,
        r#"(https?:\\?/\\?/[^"'\s]+?\.(?:m3u8|mp4)(?:\?[^"'\s]*)?)["']"#,
    ))
    .expect("valid media source regex")
});

/// Media URLs referenced by a player page, first occurrence order.
pub fn find_media_urls(html: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for caps in MEDIA_SOURCE.captures_iter(html) {
        let url = caps[1].replace("\\/", "/");
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

fn is_playlist(url: &str) -> bool {
    url.split('?')
        .next()
        .is_some_and(|path| path.to_ascii_lowercase().ends_with(".m3u8"))
}

#[derive(Debug, Clone)]
pub struct PlayerPageExtractor {
    http: HttpClient,
    hls: Arc<HlsExtractor>,
    fanout: usize,
}

impl PlayerPageExtractor {
    pub fn new(http: HttpClient, hls: Arc<HlsExtractor>, fanout: usize) -> Self {
        Self {
            http,
            hls,
            fanout: fanout.max(1),
        }
    }

    async fn expand(
        &self,
        media_url: &str,
        server: &VideoServer,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        if is_playlist(media_url) {
            return self.hls.resolve(media_url, &server.name, headers, cancel).await;
        }
        Ok(vec![Video::new(
            media_url,
            quality_hint(media_url),
            VideoFormat::File,
            &server.name,
        )
        .with_headers(headers.clone())])
    }
}

#[async_trait]
impl VideoExtractor for PlayerPageExtractor {
    fn name(&self) -> &'static str {
        "player-page"
    }

    async fn extract(
        &self,
        server: &VideoServer,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        let page = match self.http.get(&server.url, &server.headers, cancel).await {
            Ok(page) => page,
            Err(err) if err.is_not_found() => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let media_urls = find_media_urls(&page.text());
        debug!(
            server = %server.name,
            url = %server.url,
            sources = media_urls.len(),
            "Parsed player page"
        );
        if media_urls.is_empty() {
            return Ok(Vec::new());
        }

        // Media hosts usually check that requests come from the player page.
        let mut headers = server.headers.clone();
        headers
            .entry("Referer".to_string())
            .or_insert_with(|| server.url.clone());

        let runner = TaskRunner::new(self.fanout).with_cancellation(cancel.child_token());
        let token = runner.cancellation().clone();
        let outcomes = runner
            .collect(
                media_urls
                    .iter()
                    .map(|url| self.expand(url, server, &headers, &token)),
            )
            .await;

        let mut videos = Vec::new();
        let mut failed = 0;
        let mut first_failure: Option<ProviderError> = None;
        for (url, outcome) in media_urls.iter().zip(outcomes) {
            match outcome {
                Ok(found) => videos.extend(found),
                Err(err) => {
                    let err = ProviderError::from(err);
                    if !err.is_canceled() {
                        warn!(source = %url, error = %err, "Player source failed");
                    }
                    failed += 1;
                    first_failure.get_or_insert(err);
                }
            }
        }

        match first_failure {
            Some(err) if failed == media_urls.len() => Err(err),
            _ => Ok(videos),
        }
    }
}
