//! Outbound HTTP to third-party APIs and the classification of its failures.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::Retryable;

/// Failure talking to an upstream service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// 4xx: the request itself is wrong; retrying will not help.
    #[error("upstream rejected the request ({status}): {message}")]
    Client { status: u16, message: String },

    /// 5xx: the service failed; worth retrying.
    #[error("upstream server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    /// 2xx with a body that is not JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl UpstreamError {
    /// Classify a non-success status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            Self::Client { status, message }
        } else {
            Self::Server { status, message }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Network(_) | Self::InvalidBody(_) => None,
        }
    }
}

impl Retryable for UpstreamError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Network(_))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status.as_u16(), e.to_string()),
            None => Self::Network(e.to_string()),
        }
    }
}

/// POST a JSON body and return the parsed JSON reply.
///
/// `headers` are added verbatim (API keys and the like).
pub async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &B,
) -> Result<Value, UpstreamError> {
    let mut request = client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        warn!(status = status.as_u16(), url, "upstream returned an error status");
        return Err(UpstreamError::from_status(status.as_u16(), truncate(&text)));
    }

    debug!(status = status.as_u16(), bytes = text.len(), "upstream reply");
    serde_json::from_str(&text).map_err(|e| UpstreamError::InvalidBody(e.to_string()))
}

fn truncate(text: &str) -> String {
    const MAX: usize = 512;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
