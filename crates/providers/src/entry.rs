//! Registry entries.
//!
//! An entry pairs a provider's identity with typed handles to each
//! capability it implements. The builder only offers a capability when the
//! provider type implements the matching trait, so an entry can never claim
//! something its instance cannot do.

use crate::capability::{
    Capability, CapabilitySet, ChapterProvider, Feed, FeedProvider, KeyProvider, Provider,
    SourceProvider, VideoProvider,
};
use crate::error::RegistryError;
use shared::ContentKind;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

/// Concrete implementation type behind an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderType {
    id: TypeId,
    name: &'static str,
}

impl ProviderType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A registered provider.
#[derive(Clone)]
pub struct ProviderEntry {
    key: String,
    name: String,
    language: String,
    kind: ContentKind,
    provider_type: ProviderType,
    capabilities: CapabilitySet,
    source: Option<Arc<dyn SourceProvider>>,
    video: Option<Arc<dyn VideoProvider>>,
    chapters: Option<Arc<dyn ChapterProvider>>,
    keys: Option<Arc<dyn KeyProvider>>,
    feeds: Option<Arc<dyn FeedProvider>>,
}

impl ProviderEntry {
    pub fn builder<T: Provider + 'static>(instance: Arc<T>) -> ProviderEntryBuilder<T> {
        ProviderEntryBuilder::new(instance)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn supports_feed(&self, feed: Feed) -> bool {
        self.has(feed.capability())
    }

    pub fn source(&self) -> Option<&Arc<dyn SourceProvider>> {
        self.source.as_ref()
    }

    pub fn video(&self) -> Option<&Arc<dyn VideoProvider>> {
        self.video.as_ref()
    }

    pub fn chapters(&self) -> Option<&Arc<dyn ChapterProvider>> {
        self.chapters.as_ref()
    }

    pub fn keys(&self) -> Option<&Arc<dyn KeyProvider>> {
        self.keys.as_ref()
    }

    pub fn feeds(&self) -> Option<&Arc<dyn FeedProvider>> {
        self.feeds.as_ref()
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("provider_type", &self.provider_type.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Builder for [`ProviderEntry`], parameterized by the implementation type.
pub struct ProviderEntryBuilder<T> {
    instance: Arc<T>,
    capabilities: CapabilitySet,
    source: Option<Arc<dyn SourceProvider>>,
    video: Option<Arc<dyn VideoProvider>>,
    chapters: Option<Arc<dyn ChapterProvider>>,
    keys: Option<Arc<dyn KeyProvider>>,
    feeds: Option<Arc<dyn FeedProvider>>,
}

impl<T: Provider + 'static> ProviderEntryBuilder<T> {
    fn new(instance: Arc<T>) -> Self {
        Self {
            instance,
            capabilities: CapabilitySet::empty(),
            source: None,
            video: None,
            chapters: None,
            keys: None,
            feeds: None,
        }
    }

    pub fn source(mut self) -> Self
    where
        T: SourceProvider,
    {
        let handle: Arc<dyn SourceProvider> = self.instance.clone();
        self.source = Some(handle);
        self.capabilities.insert(Capability::Source);
        self
    }

    pub fn video(mut self) -> Self
    where
        T: VideoProvider,
    {
        let handle: Arc<dyn VideoProvider> = self.instance.clone();
        self.video = Some(handle);
        self.capabilities.insert(Capability::Video);
        self
    }

    pub fn chapters(mut self) -> Self
    where
        T: ChapterProvider,
    {
        let handle: Arc<dyn ChapterProvider> = self.instance.clone();
        self.chapters = Some(handle);
        self.capabilities.insert(Capability::Chapters);
        self
    }

    pub fn keys(mut self) -> Self
    where
        T: KeyProvider,
    {
        let handle: Arc<dyn KeyProvider> = self.instance.clone();
        self.keys = Some(handle);
        self.capabilities.insert(Capability::Keys);
        self
    }

    /// Advertise the given feeds. Repeated calls accumulate.
    pub fn feeds(mut self, feeds: &[Feed]) -> Self
    where
        T: FeedProvider,
    {
        if feeds.is_empty() {
            return self;
        }
        let handle: Arc<dyn FeedProvider> = self.instance.clone();
        self.feeds = Some(handle);
        for feed in feeds {
            self.capabilities.insert(feed.capability());
        }
        self
    }

    pub fn build(self) -> Result<ProviderEntry, RegistryError> {
        let key = self.instance.key().trim().to_string();
        if key.is_empty() {
            return Err(RegistryError::InvalidEntry {
                key,
                reason: "provider key is empty".to_string(),
            });
        }
        if self.capabilities.is_empty() {
            return Err(RegistryError::InvalidEntry {
                key,
                reason: "provider exposes no capabilities".to_string(),
            });
        }

        Ok(ProviderEntry {
            name: self.instance.name().to_string(),
            language: self.instance.language().to_string(),
            kind: self.instance.kind(),
            provider_type: ProviderType::of::<T>(),
            capabilities: self.capabilities,
            source: self.source,
            video: self.video,
            chapters: self.chapters,
            keys: self.keys,
            feeds: self.feeds,
            key,
        })
    }
}
