//! Video extraction.
//!
//! An [`ExtractorDispatcher`] holds an ordered table of URL patterns, each
//! bound to a [`VideoExtractor`]. Selecting an extractor is a pure function
//! of the server URL and the table: the first matching rule wins and no I/O
//! happens until the chosen extractor runs.

pub mod direct;
pub mod hls;
pub mod player;

pub use direct::DirectFileExtractor;
pub use hls::HlsExtractor;
pub use player::PlayerPageExtractor;

use crate::error::ProviderResult;
use crate::http::HttpClient;
use async_trait::async_trait;
use shared::config::ExtractorsConfig;
use shared::{Video, VideoServer};
use std::fmt;
use std::sync::Arc;
use throttle::TaskRunner;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Turns a video server into playable videos.
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// An empty list means the server had nothing playable.
    async fn extract(
        &self,
        server: &VideoServer,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>>;
}

/// URL predicate of an extraction rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    /// Host equals this domain or is a subdomain of it
    Host(String),
    /// Raw URL contains this text (case-insensitive)
    Contains(String),
    /// URL path ends in `.<ext>` (case-insensitive)
    Extension(String),
}

impl UrlPattern {
    pub fn host(domain: impl Into<String>) -> Self {
        UrlPattern::Host(domain.into().to_ascii_lowercase())
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        UrlPattern::Contains(needle.into().to_ascii_lowercase())
    }

    pub fn extension(ext: impl Into<String>) -> Self {
        let ext = ext.into();
        UrlPattern::Extension(ext.trim_start_matches('.').to_ascii_lowercase())
    }

    /// `parsed` is `None` when `raw` is not an absolute URL; only
    /// [`UrlPattern::Contains`] can match then.
    pub fn matches(&self, raw: &str, parsed: Option<&Url>) -> bool {
        match self {
            UrlPattern::Host(domain) => parsed
                .and_then(Url::host_str)
                .map(|host| {
                    let host = host.to_ascii_lowercase();
                    host == *domain
                        || host
                            .strip_suffix(domain.as_str())
                            .is_some_and(|prefix| prefix.ends_with('.'))
                })
                .unwrap_or(false),
            UrlPattern::Contains(needle) => raw.to_ascii_lowercase().contains(needle.as_str()),
            UrlPattern::Extension(ext) => parsed
                .map(|url| {
                    url.path()
                        .to_ascii_lowercase()
                        .ends_with(&format!(".{}", ext))
                })
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Host(domain) => write!(f, "host:{}", domain),
            UrlPattern::Contains(needle) => write!(f, "contains:{}", needle),
            UrlPattern::Extension(ext) => write!(f, "ext:{}", ext),
        }
    }
}

#[derive(Clone)]
pub struct ExtractorRule {
    pattern: UrlPattern,
    extractor: Arc<dyn VideoExtractor>,
}

impl ExtractorRule {
    pub fn new(pattern: UrlPattern, extractor: Arc<dyn VideoExtractor>) -> Self {
        Self { pattern, extractor }
    }

    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    pub fn extractor(&self) -> &Arc<dyn VideoExtractor> {
        &self.extractor
    }
}

impl fmt::Debug for ExtractorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRule")
            .field("pattern", &self.pattern)
            .field("extractor", &self.extractor.name())
            .finish()
    }
}

/// Ordered rule table mapping server URLs to extractors.
#[derive(Debug, Clone, Default)]
pub struct ExtractorDispatcher {
    rules: Vec<ExtractorRule>,
}

impl ExtractorDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table: HLS playlists, direct files, then the configured
    /// embedded-player hosts.
    pub fn with_default_rules(http: HttpClient, config: &ExtractorsConfig, fanout: usize) -> Self {
        let hls = Arc::new(HlsExtractor::new(http.clone()));
        let direct = Arc::new(DirectFileExtractor::new(http.clone()));
        let player = Arc::new(PlayerPageExtractor::new(http, Arc::clone(&hls), fanout));

        let mut dispatcher = Self::new().with_rule(UrlPattern::extension("m3u8"), hls);
        for ext in ["mp4", "mkv", "webm"] {
            dispatcher.push_rule(UrlPattern::extension(ext), direct.clone());
        }
        for host in &config.player_hosts {
            dispatcher.push_rule(UrlPattern::host(host.as_str()), player.clone());
        }
        dispatcher
    }

    pub fn with_rule(mut self, pattern: UrlPattern, extractor: Arc<dyn VideoExtractor>) -> Self {
        self.push_rule(pattern, extractor);
        self
    }

    pub fn push_rule(&mut self, pattern: UrlPattern, extractor: Arc<dyn VideoExtractor>) {
        self.rules.push(ExtractorRule::new(pattern, extractor));
    }

    pub fn rules(&self) -> &[ExtractorRule] {
        &self.rules
    }

    /// First rule matching the server URL, in table order.
    pub fn select(&self, server: &VideoServer) -> Option<&ExtractorRule> {
        let parsed = Url::parse(&server.url).ok();
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(&server.url, parsed.as_ref()))
    }

    /// Resolve one server. A server no rule handles yields an empty list.
    pub async fn extract(
        &self,
        server: &VideoServer,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        let Some(rule) = self.select(server) else {
            debug!(server = %server.name, url = %server.url, "No extractor for server");
            return Ok(Vec::new());
        };

        debug!(
            server = %server.name,
            extractor = rule.extractor.name(),
            pattern = %rule.pattern,
            "Extracting videos"
        );
        rule.extractor.extract(server, cancel).await
    }

    /// Resolve many servers through `runner`, keeping server order.
    ///
    /// Failed servers are logged and skipped.
    pub async fn extract_all(&self, servers: &[VideoServer], runner: &TaskRunner) -> Vec<Video> {
        let cancel = runner.cancellation().clone();
        let outcomes = runner
            .collect(servers.iter().map(|server| self.extract(server, &cancel)))
            .await;

        let mut videos = Vec::new();
        for (server, outcome) in servers.iter().zip(outcomes) {
            match outcome {
                Ok(found) => videos.extend(found),
                Err(err) if err.is_canceled() => {}
                Err(err) => warn!(
                    server = %server.name,
                    url = %server.url,
                    error = %err,
                    "Extraction failed"
                ),
            }
        }
        videos
    }
}
