//! Data models for the project.
//!
//! These are the values providers hand back to callers: search results,
//! media details, episodes and chapters, and the video servers and playable
//! videos that extractors resolve.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of content a provider serves
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Anime,
    Manga,
    Movie,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Anime => write!(f, "anime"),
            ContentKind::Manga => write!(f, "manga"),
            ContentKind::Movie => write!(f, "movie"),
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anime" => Ok(ContentKind::Anime),
            "manga" => Ok(ContentKind::Manga),
            "movie" => Ok(ContentKind::Movie),
            _ => Err(anyhow::anyhow!("Invalid content kind: {}", s)),
        }
    }
}

/// One hit in a search or feed listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Provider-specific identifier, passed back to `info`/`episodes`
    pub id: String,
    pub title: String,
    pub url: String,
    pub image: Option<String>,
    pub kind: ContentKind,

    /// Latest episode or chapter number, when the listing shows one
    pub latest: Option<f32>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full details for one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub other_titles: Vec<String>,
    pub url: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub released: Option<NaiveDate>,
    pub total_episodes: Option<u32>,
}

/// A playable episode of an anime or movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    /// Episode number; fractional for recaps and specials (e.g. 12.5)
    pub number: f32,
    pub name: Option<String>,
    pub url: String,
    pub image: Option<String>,
    pub aired: Option<NaiveDate>,
}

/// A manga chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub number: f32,
    pub name: Option<String>,
    pub url: String,
    pub released: Option<NaiveDate>,
}

/// A single manga page image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position within the chapter
    pub index: u32,
    pub image: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// An embed reference for an episode: where the player lives, and its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoServer {
    /// Display label (e.g. "Vidstreaming", "Mirror 2")
    pub name: String,
    pub url: String,
    /// Headers the host expects (Referer and similar)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl VideoServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Container format of a resolved video
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Hls,
    File,
}

/// A playable media source resolved from a [`VideoServer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    /// Quality label (e.g. "1080p", "auto", "default")
    pub quality: String,
    pub format: VideoFormat,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Label of the server this came from
    pub server: String,
}

impl Video {
    pub fn new(
        url: impl Into<String>,
        quality: impl Into<String>,
        format: VideoFormat,
        server: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            format,
            headers: BTreeMap::new(),
            server: server.into(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}
