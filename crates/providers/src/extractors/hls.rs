//! HLS playlists.
//!
//! A master playlist expands into one video per variant stream; a media
//! playlist is returned as a single "auto" video.

use super::VideoExtractor;
use crate::error::{ProviderError, ProviderResult};
use crate::http::HttpClient;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use shared::{Video, VideoFormat, VideoServer};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"RESOLUTION=(\d+)x(\d+)").expect("valid resolution regex"));
static BANDWIDTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|,)BANDWIDTH=(\d+)").expect("valid bandwidth regex"));

/// One `#EXT-X-STREAM-INF` entry of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub url: String,
    pub height: Option<u32>,
    pub bandwidth: Option<u64>,
}

impl Variant {
    pub fn quality(&self) -> String {
        match (self.height, self.bandwidth) {
            (Some(height), _) => format!("{}p", height),
            (None, Some(bandwidth)) => format!("{}kbps", bandwidth / 1000),
            (None, None) => "auto".to_string(),
        }
    }
}

/// Parse a playlist body fetched from `base`.
///
/// Returns the variants of a master playlist, or an empty list for a media
/// playlist. Relative URIs are resolved against `base`.
pub fn parse_playlist(body: &str, base: &Url) -> ProviderResult<Vec<Variant>> {
    let mut lines = body.lines().map(str::trim).filter(|line| !line.is_empty());

    if lines.next() != Some("#EXTM3U") {
        return Err(ProviderError::parse("HLS playlist", "missing #EXTM3U header"));
    }

    let mut variants = Vec::new();
    let mut pending: Option<&str> = None;

    for line in lines {
        if let Some(attributes) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending = Some(attributes);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some(attributes) = pending.take() else {
            continue;
        };

        let url = base
            .join(line)
            .map_err(|e| ProviderError::parse("HLS variant URI", e))?;
        let height = RESOLUTION
            .captures(attributes)
            .and_then(|caps| caps[2].parse().ok());
        let bandwidth = BANDWIDTH
            .captures(attributes)
            .and_then(|caps| caps[1].parse().ok());

        variants.push(Variant {
            url: url.to_string(),
            height,
            bandwidth,
        });
    }

    Ok(variants)
}

#[derive(Debug, Clone)]
pub struct HlsExtractor {
    http: HttpClient,
}

impl HlsExtractor {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Fetch a playlist and expand it into videos labelled `server_name`.
    ///
    /// A playlist the host reports missing yields an empty list.
    pub async fn resolve(
        &self,
        url: &str,
        server_name: &str,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        let response = match self.http.get(url, headers, cancel).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let base = Url::parse(&response.url)
            .or_else(|_| Url::parse(url))
            .map_err(|e| ProviderError::parse("HLS playlist URL", e))?;
        let variants = parse_playlist(&response.text(), &base)?;

        debug!(url, variants = variants.len(), "Parsed HLS playlist");

        if variants.is_empty() {
            return Ok(vec![
                Video::new(url, "auto", VideoFormat::Hls, server_name).with_headers(headers.clone())
            ]);
        }

        Ok(variants
            .into_iter()
            .map(|variant| {
                Video::new(&variant.url, variant.quality(), VideoFormat::Hls, server_name)
                    .with_headers(headers.clone())
            })
            .collect())
    }
}

#[async_trait]
impl VideoExtractor for HlsExtractor {
    fn name(&self) -> &'static str {
        "hls"
    }

    async fn extract(
        &self,
        server: &VideoServer,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        self.resolve(&server.url, &server.name, &server.headers, cancel)
            .await
    }
}
