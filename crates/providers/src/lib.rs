//! Content providers and video extraction.
//!
//! This crate provides:
//! - Capability traits implemented by content providers
//! - A registry of provider entries with capability-based lookup
//! - An HTTP collaborator with a swappable transport
//! - URL-pattern routing of video servers to extractors
//! - Bounded fan-out helpers built on the `throttle` runner

pub mod capability;
pub mod entry;
pub mod error;
pub mod extractors;
pub mod fanout;
pub mod http;
pub mod loader;
pub mod registry;

#[cfg(test)]
pub(crate) mod fixtures;

pub use capability::{
    Capability, CapabilitySet, ChapterProvider, Feed, FeedProvider, KeyProvider, Provider,
    ProviderKeys, SourceProvider, VideoProvider,
};
pub use entry::{ProviderEntry, ProviderEntryBuilder, ProviderType};
pub use error::{NetworkError, ProviderError, ProviderResult, RegistryError};
pub use extractors::{ExtractorDispatcher, ExtractorRule, UrlPattern, VideoExtractor};
pub use fanout::{fetch_feed_pages, resolve_videos, search_all, FanoutRunners, ProviderSearch};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestTransport, RetryPolicy, Transport};
pub use loader::{ProviderLoader, StaticLoader};
pub use registry::ProviderRegistry;
