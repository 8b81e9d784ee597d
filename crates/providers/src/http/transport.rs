//! `reqwest`-backed transport.

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::NetworkError;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use shared::config::HttpConfig;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| NetworkError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, NetworkError> {
        Self::new(config.timeout(), &config.user_agent)
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            range,
            timeout,
        } = request;

        let target = Url::parse(&url).map_err(|_| NetworkError::InvalidUrl(url.clone()))?;
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Head => reqwest::Method::HEAD,
        };

        let mut builder = self.client.request(method, target);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(range) = range {
            builder = builder.header(header::RANGE, range.header_value());
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| classify(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(NetworkError::NotFound { url });
        }
        if !status.is_success() {
            return Err(NetworkError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| classify(&url, e))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            url: final_url,
            headers,
            body: body.to_vec(),
        })
    }
}

fn classify(url: &str, err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else {
        NetworkError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, NetworkError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NetworkError::Canceled),
            result = self.exchange(request) => result,
        }
    }
}
