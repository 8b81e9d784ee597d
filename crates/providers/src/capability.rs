//! Capabilities and the traits that back them.
//!
//! A provider implements [`Provider`] for its identity plus one trait per
//! capability family it supports. Every network-bound operation takes a
//! cancellation token and returns a typed [`ProviderResult`].

use crate::error::ProviderResult;
use crate::extractors::ExtractorDispatcher;
use async_trait::async_trait;
use shared::{Chapter, ContentKind, Episode, MediaInfo, Page, SearchItem, Video, VideoServer};
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// One facet of functionality a provider may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Search and title details
    Source,
    /// Episodes, servers and playable videos
    Video,
    /// Manga chapters and pages
    Chapters,
    /// Provider-specific decryption keys
    Keys,
    Popular,
    Airing,
    Recent,
    LastUpdated,
    NewSeason,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::Source,
        Capability::Video,
        Capability::Chapters,
        Capability::Keys,
        Capability::Popular,
        Capability::Airing,
        Capability::Recent,
        Capability::LastUpdated,
        Capability::NewSeason,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Source => "source",
            Capability::Video => "video",
            Capability::Chapters => "chapters",
            Capability::Keys => "keys",
            Capability::Popular => "popular",
            Capability::Airing => "airing",
            Capability::Recent => "recent",
            Capability::LastUpdated => "last_updated",
            Capability::NewSeason => "new_season",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Listing feeds served through [`FeedProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Popular,
    Airing,
    Recent,
    LastUpdated,
    NewSeason,
}

impl Feed {
    pub const ALL: [Feed; 5] = [
        Feed::Popular,
        Feed::Airing,
        Feed::Recent,
        Feed::LastUpdated,
        Feed::NewSeason,
    ];

    /// The capability an entry must carry to serve this feed.
    pub const fn capability(self) -> Capability {
        match self {
            Feed::Popular => Capability::Popular,
            Feed::Airing => Capability::Airing,
            Feed::Recent => Capability::Recent,
            Feed::LastUpdated => Capability::LastUpdated,
            Feed::NewSeason => Capability::NewSeason,
        }
    }

    pub fn name(self) -> &'static str {
        self.capability().name()
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of capabilities, stored as a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Identity every provider carries, whatever else it implements.
pub trait Provider: Send + Sync {
    /// Unique key within a registry (e.g. "gogoanime")
    fn key(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Content language as a short tag (e.g. "en")
    fn language(&self) -> &str {
        "en"
    }

    fn kind(&self) -> ContentKind;
}

/// Search and detail lookups.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchItem>>;

    /// `Ok(None)` when the provider has no such title.
    async fn info(&self, id: &str, cancel: &CancellationToken) -> ProviderResult<Option<MediaInfo>>;
}

/// Episode listing and video resolution.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn episodes(&self, id: &str, cancel: &CancellationToken) -> ProviderResult<Vec<Episode>>;

    async fn servers(
        &self,
        episode: &Episode,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<VideoServer>>;

    /// Dispatcher used by the default [`VideoProvider::videos`].
    fn dispatcher(&self) -> Option<&ExtractorDispatcher> {
        None
    }

    /// Resolve one server into playable videos.
    ///
    /// The default routes the server through [`VideoProvider::dispatcher`];
    /// a server nothing handles yields an empty list.
    async fn videos(
        &self,
        server: &VideoServer,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        match self.dispatcher() {
            Some(dispatcher) => dispatcher.extract(server, cancel).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Manga chapters and their page images.
#[async_trait]
pub trait ChapterProvider: Send + Sync {
    async fn chapters(&self, id: &str, cancel: &CancellationToken) -> ProviderResult<Vec<Chapter>>;

    async fn pages(&self, chapter: &Chapter, cancel: &CancellationToken)
        -> ProviderResult<Vec<Page>>;
}

/// Named keys a provider needs for its own decryption steps.
pub type ProviderKeys = BTreeMap<String, String>;

#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn keys(&self, cancel: &CancellationToken) -> ProviderResult<ProviderKeys>;
}

/// Paged listing feeds.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn feed(
        &self,
        feed: Feed,
        page: u32,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchItem>>;
}
