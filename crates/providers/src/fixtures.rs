//! Test doubles shared by the unit tests.

use crate::capability::{
    ChapterProvider, Feed, FeedProvider, KeyProvider, Provider, ProviderKeys, SourceProvider,
    VideoProvider,
};
use crate::entry::ProviderEntry;
use crate::error::{NetworkError, ProviderError, ProviderResult};
use crate::extractors::{ExtractorDispatcher, VideoExtractor};
use crate::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{
    Chapter, ContentKind, Episode, MediaInfo, Page, SearchItem, Video, VideoFormat, VideoServer,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) fn search_item(id: &str, title: &str) -> SearchItem {
    SearchItem {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://site.example/{}", id),
        image: None,
        kind: ContentKind::Anime,
        latest: None,
        updated_at: None,
    }
}

pub(crate) fn episode(number: f32) -> Episode {
    Episode {
        id: format!("ep-{}", number),
        number,
        name: None,
        url: format!("https://site.example/watch/{}", number),
        image: None,
        aired: None,
    }
}

/// Search and feed provider with scripted behaviour.
pub(crate) struct StubSource {
    key: String,
    kind: ContentKind,
    fail_search: bool,
    failing_page: Option<u32>,
    delay: Duration,
}

impl StubSource {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: ContentKind::Anime,
            fail_search: false,
            failing_page: None,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub(crate) fn failing_page(mut self, page: u32) -> Self {
        self.failing_page = Some(page);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Provider for StubSource {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        "Stub Source"
    }

    fn kind(&self) -> ContentKind {
        self.kind
    }
}

#[async_trait]
impl SourceProvider for StubSource {
    async fn search(
        &self,
        query: &str,
        page: u32,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchItem>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_search {
            return Err(NetworkError::Transport {
                url: format!("https://{}.example/search", self.key),
                message: "connection reset".to_string(),
            }
            .into());
        }
        Ok(vec![search_item(&format!("{}-{}-{}", self.key, query, page), query)])
    }

    async fn info(
        &self,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Option<MediaInfo>> {
        Ok(None)
    }
}

#[async_trait]
impl FeedProvider for StubSource {
    async fn feed(
        &self,
        feed: Feed,
        page: u32,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchItem>> {
        if self.failing_page == Some(page) {
            return Err(ProviderError::parse("feed page", format!("page {} is malformed", page)));
        }
        let id = format!("{}-{}", feed, page);
        Ok(vec![search_item(&id, &id)])
    }
}

/// Video provider whose servers go through an injected dispatcher.
pub(crate) struct StubVideo {
    key: String,
    servers: Vec<VideoServer>,
    dispatcher: ExtractorDispatcher,
}

impl StubVideo {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            servers: Vec::new(),
            dispatcher: ExtractorDispatcher::new(),
        }
    }

    pub(crate) fn with_servers(mut self, servers: Vec<VideoServer>) -> Self {
        self.servers = servers;
        self
    }

    pub(crate) fn with_dispatcher(mut self, dispatcher: ExtractorDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}

impl Provider for StubVideo {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        "Stub Video"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Anime
    }
}

#[async_trait]
impl SourceProvider for StubVideo {
    async fn search(
        &self,
        query: &str,
        _page: u32,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchItem>> {
        Ok(vec![search_item(&self.key, query)])
    }

    async fn info(
        &self,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Option<MediaInfo>> {
        Ok(None)
    }
}

#[async_trait]
impl VideoProvider for StubVideo {
    async fn episodes(
        &self,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Episode>> {
        Ok(vec![episode(1.0), episode(2.0)])
    }

    async fn servers(
        &self,
        _episode: &Episode,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<VideoServer>> {
        Ok(self.servers.clone())
    }

    fn dispatcher(&self) -> Option<&ExtractorDispatcher> {
        Some(&self.dispatcher)
    }
}

/// Manga provider with chapter and key capabilities.
pub(crate) struct StubManga {
    key: String,
}

impl StubManga {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

impl Provider for StubManga {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        "Stub Manga"
    }

    fn language(&self) -> &str {
        "ja"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Manga
    }
}

#[async_trait]
impl ChapterProvider for StubManga {
    async fn chapters(
        &self,
        id: &str,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Chapter>> {
        Ok((1..=3)
            .map(|n| Chapter {
                id: format!("{}-{}", id, n),
                number: n as f32,
                name: None,
                url: format!("https://manga.example/{}/{}", id, n),
                released: None,
            })
            .collect())
    }

    async fn pages(
        &self,
        chapter: &Chapter,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Page>> {
        Ok((0..2)
            .map(|index| Page {
                index,
                image: format!("{}/{}.jpg", chapter.url, index),
                headers: BTreeMap::new(),
            })
            .collect())
    }
}

#[async_trait]
impl KeyProvider for StubManga {
    async fn keys(&self, _cancel: &CancellationToken) -> ProviderResult<ProviderKeys> {
        let mut keys = ProviderKeys::new();
        keys.insert("image".to_string(), "0f1e2d3c".to_string());
        Ok(keys)
    }
}

pub(crate) fn source_entry(key: &str) -> ProviderEntry {
    ProviderEntry::builder(Arc::new(StubSource::new(key)))
        .source()
        .build()
        .unwrap()
}

pub(crate) fn video_entry(key: &str) -> ProviderEntry {
    ProviderEntry::builder(Arc::new(StubVideo::new(key)))
        .video()
        .build()
        .unwrap()
}

/// Transport that answers from a script and counts every call.
///
/// One-shot outcomes queued with [`fail_once`](Self::fail_once) are served
/// first; after that the standing response for the URL, or 404.
#[derive(Default)]
pub(crate) struct FakeTransport {
    queued: Mutex<HashMap<String, VecDeque<NetworkError>>>,
    standing: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.standing
            .lock()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub(crate) fn fail_once(&self, url: &str, err: NetworkError) {
        self.queued
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(err);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if cancel.is_cancelled() {
            return Err(NetworkError::Canceled);
        }
        if let Some(err) = self
            .queued
            .lock()
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let standing = self.standing.lock().get(&request.url).cloned();
        match standing {
            Some((status, body)) => Ok(HttpResponse::new(status, request.url, body)),
            None => Err(NetworkError::NotFound { url: request.url }),
        }
    }
}

pub(crate) fn fake_client(transport: &Arc<FakeTransport>) -> HttpClient {
    HttpClient::new(transport.clone()).with_retry(RetryPolicy::none())
}

/// Extractor with a fixed answer that counts its calls.
pub(crate) struct ScriptedExtractor {
    name: &'static str,
    outcome: Result<Option<String>, ProviderError>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    /// Finds nothing.
    pub(crate) fn named(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcome: Ok(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn returning(name: &'static str, url: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcome: Ok(Some(url.to_string())),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn failing(name: &'static str, err: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcome: Err(err),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn extract(
        &self,
        server: &VideoServer,
        _cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(Some(url)) => Ok(vec![Video::new(url, "default", VideoFormat::File, &server.name)]),
            Ok(None) => Ok(Vec::new()),
            Err(err) => Err(err.clone()),
        }
    }
}
