//! Direct media files (mp4, mkv, webm).

use super::VideoExtractor;
use crate::error::ProviderResult;
use crate::http::HttpClient;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use shared::{Video, VideoFormat, VideoServer};
use tokio_util::sync::CancellationToken;
use tracing::debug;

static QUALITY_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])(2160|1440|1080|720|480|360|240)p").expect("valid quality regex")
});

/// Quality label guessed from the file name, e.g. `ep1_1080p.mp4`.
pub fn quality_hint(url: &str) -> String {
    QUALITY_HINT
        .captures(url)
        .map(|caps| format!("{}p", &caps[1]))
        .unwrap_or_else(|| "default".to_string())
}

/// Confirms the file exists with a `HEAD` request and returns it as-is.
#[derive(Debug, Clone)]
pub struct DirectFileExtractor {
    http: HttpClient,
}

impl DirectFileExtractor {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl VideoExtractor for DirectFileExtractor {
    fn name(&self) -> &'static str {
        "direct-file"
    }

    async fn extract(
        &self,
        server: &VideoServer,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<Video>> {
        match self.http.head(&server.url, &server.headers, cancel).await {
            Ok(response) => {
                debug!(
                    url = %server.url,
                    content_type = response.content_type().unwrap_or("unknown"),
                    "Direct file available"
                );
                Ok(vec![Video::new(
                    &server.url,
                    quality_hint(&server.url),
                    VideoFormat::File,
                    &server.name,
                )
                .with_headers(server.headers.clone())])
            }
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}
