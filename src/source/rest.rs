//! REST page source backed by `reqwest`.
//!
//! Each page request becomes a single `GET` against the configured
//! endpoint with the query parameters rendered by
//! [`RequestDescriptor::query_pairs`]. Failures are mapped into
//! [`FeedError`] at this boundary:
//!
//! | Failure                     | Error                    |
//! |-----------------------------|--------------------------|
//! | request exceeded timeout    | [`FeedError::Timeout`]   |
//! | connect / send / read error | [`FeedError::Transport`] |
//! | non-2xx status              | [`FeedError::Http`]      |
//! | body not a page response    | [`FeedError::Decode`]    |

use std::marker::PhantomData;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use super::PageSource;
use crate::config::FeedConfig;
use crate::domain::{FeedItem, NftListing, Page, PageRequest, PageResponse};
use crate::error::{FeedError, extract_error_message};
use crate::pipeline::query_builder::{ParamStyle, RequestDescriptor};

/// Page source talking to the marketplace REST API.
#[derive(Debug, Clone)]
pub struct RestSource<T> {
    client: reqwest::Client,
    endpoint: String,
    style: ParamStyle,
    _item: PhantomData<fn() -> T>,
}

impl<T> RestSource<T> {
    /// Creates a source for `path` under the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &FeedConfig, path: &str) -> Result<Self, FeedError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FeedError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config, path))
    }

    /// Creates a source reusing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &FeedConfig, path: &str) -> Self {
        let base = config.api_base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Self {
            client,
            endpoint: format!("{base}/{path}"),
            style: config.param_style.clone(),
            _item: PhantomData,
        }
    }

    /// Endpoint URL without query parameters.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full URL for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if the configured endpoint is not a
    /// valid URL.
    pub fn url(&self, request: &PageRequest) -> Result<reqwest::Url, FeedError> {
        let pairs = RequestDescriptor::build(request).query_pairs(&self.style);
        reqwest::Url::parse_with_params(&self.endpoint, &pairs)
            .map_err(|e| FeedError::Config(format!("invalid endpoint `{}`: {e}", self.endpoint)))
    }
}

impl RestSource<NftListing> {
    /// Source for the configured listings endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if the HTTP client cannot be built.
    pub fn listings(config: &FeedConfig) -> Result<Self, FeedError> {
        Self::new(config, &config.listings_path)
    }
}

impl<T> PageSource<T> for RestSource<T>
where
    T: FeedItem + DeserializeOwned,
{
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>, FeedError> {
        let url = self.url(request)?;
        tracing::debug!(%url, "requesting page");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let fallback = status.canonical_reason().unwrap_or("request failed");
            return Err(FeedError::Http {
                status: status.as_u16(),
                message: extract_error_message(&text, fallback),
            });
        }

        let decoded: PageResponse<T> =
            serde_json::from_slice(&body).map_err(|e| FeedError::Decode(e.to_string()))?;
        decoded.into_page(request)
    }
}

fn transport_error(err: reqwest::Error) -> FeedError {
    if err.is_timeout() {
        FeedError::Timeout
    } else {
        FeedError::Transport(err.to_string())
    }
}
