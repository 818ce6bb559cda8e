//! Bounded fetching of remote inputs
//!
//! [`Fetcher`] is the seam between the job runner and the network. The
//! production implementation, [`HttpFetcher`], enforces both a timeout and a
//! size ceiling; the ceiling aborts the transfer as soon as it is crossed
//! instead of buffering the whole body first.

use crate::config::FetchConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Per-fetch bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Largest accepted body
    pub max_bytes: u64,
    /// Time budget for the whole transfer
    pub timeout: Duration,
}

impl FetchLimits {
    /// Limits for remote images
    pub fn image(config: &FetchConfig) -> Self {
        Self {
            max_bytes: config.image_max_bytes,
            timeout: config.timeout,
        }
    }

    /// Limits for remote audio tracks
    pub fn audio(config: &FetchConfig) -> Self {
        Self {
            max_bytes: config.audio_max_bytes,
            timeout: config.timeout,
        }
    }
}

/// Retrieves the bytes behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, honouring `limits`
    async fn fetch(&self, url: &str, limits: FetchLimits) -> Result<Vec<u8>, FetchError>;
}

/// [`Fetcher`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from configuration
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, limits: FetchLimits) -> Result<Vec<u8>, FetchError> {
        let classify = |e: reqwest::Error| -> FetchError {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: limits.timeout.as_secs(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };
        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit_bytes: limits.max_bytes,
        };

        let transfer = async {
            let mut response = self
                .client
                .get(url)
                .timeout(limits.timeout)
                .send()
                .await
                .map_err(classify)?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            // Reject early when the server announces an oversized body
            if response
                .content_length()
                .is_some_and(|len| len > limits.max_bytes)
            {
                return Err(too_large());
            }

            let mut body = Vec::with_capacity(
                response
                    .content_length()
                    .map(|len| len as usize)
                    .unwrap_or_default(),
            );
            while let Some(chunk) = response.chunk().await.map_err(classify)? {
                if body.len() as u64 + chunk.len() as u64 > limits.max_bytes {
                    return Err(too_large());
                }
                body.extend_from_slice(&chunk);
            }
            Ok::<_, FetchError>(body)
        };

        // The request timeout covers the body as well; this outer bound keeps
        // a stalled chunk stream from outliving it.
        let body = tokio::time::timeout(limits.timeout, transfer)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: limits.timeout.as_secs(),
            })??;

        debug!(url = %url, bytes = body.len(), "fetched remote input");
        Ok(body)
    }
}
