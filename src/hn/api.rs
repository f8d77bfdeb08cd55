//! HTTP transport for the Hacker News Firebase API.

use crate::hn::errors::UpstreamError;
use crate::hn::json::parse_json_with_context;
use crate::hn::models::StoryRecord;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Public Hacker News API root.
pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0/";

/// Raw upstream calls, one attempt each, no retries or caching.
///
/// [`HnApi`] implements this over HTTP; tests substitute scripted fakes.
#[async_trait]
pub trait HnTransport: Send + Sync {
    /// Current best-story ranking, most important first.
    async fn best_story_ids(&self) -> Result<Vec<u32>, UpstreamError>;

    /// Detail for a single item. Missing items yield [`UpstreamError::NotFound`].
    async fn item(&self, id: u32) -> Result<StoryRecord, UpstreamError>;
}

/// reqwest-backed client for the Hacker News API.
pub struct HnApi {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HnApi {
    /// Build a client rooted at `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid upstream URL: {base_url}"))?;
        // Url::join replaces the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("beststories/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET a JSON document relative to the base URL.
    ///
    /// 404 maps to [`UpstreamError::NotFound`], other non-2xx statuses to
    /// [`UpstreamError::Status`]. A literal `null` body decodes to `None`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, UpstreamError> {
        let url = self.base_url.join(path).map_err(|e| UpstreamError::Parse {
            url: path.to_owned(),
            source: e.into(),
        })?;

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        trace!(url = %url, status = status.as_u16(), "upstream response");
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        parse_json_with_context::<Option<T>>(&body).map_err(|source| UpstreamError::Parse {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl HnTransport for HnApi {
    async fn best_story_ids(&self) -> Result<Vec<u32>, UpstreamError> {
        Ok(self
            .get_json::<Vec<u32>>("beststories.json")
            .await?
            .unwrap_or_default())
    }

    async fn item(&self, id: u32) -> Result<StoryRecord, UpstreamError> {
        self.get_json::<StoryRecord>(&format!("item/{id}.json"))
            .await?
            .ok_or(UpstreamError::NotFound)
    }
}
