//! Keyword image lookup against a redirecting stock-photo endpoint.

use reqwest::Client;
use tracing::{debug, warn};

use crate::upstream::UpstreamError;

pub const DEFAULT_SEARCH_BASE: &str = "https://source.unsplash.com";

pub struct ImageSearch {
    http: Client,
    base_url: String,
}

impl ImageSearch {
    /// `http` must follow redirects (reqwest's default policy does).
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_SEARCH_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Resolve `query` to the URL of a matching 600x600 image.
    pub async fn lookup(&self, query: &str) -> Result<String, UpstreamError> {
        let url = format!("{}/600x600/?{}", self.base_url, urlencoding::encode(query));
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), %query, "image search failed");
            return Err(UpstreamError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("error"),
            ));
        }

        let final_url = response.url().to_string();
        if !final_url.starts_with("http") {
            return Err(UpstreamError::InvalidBody(format!(
                "unexpected image url {final_url:?}"
            )));
        }
        debug!(%query, url = %final_url, "image resolved");
        Ok(final_url)
    }
}
