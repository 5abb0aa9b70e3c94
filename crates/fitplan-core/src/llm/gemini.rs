//! Google Generative Language (Gemini) client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::client::{GeneratedText, GenerationClient, GenerationRequest, extract_text};
use crate::upstream::{UpstreamError, post_json};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key; keeps the key out of URLs and logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint root (test servers, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `{base}/models/{model}:{method}`
    pub fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url)
    }

    /// POST an arbitrary body to a model method and return the raw reply.
    pub async fn call(&self, model: &str, method: &str, body: &Value) -> Result<Value, UpstreamError> {
        let url = self.model_url(model, method);
        post_json(&self.http, &url, &[(API_KEY_HEADER, self.api_key.as_str())], body).await
    }

    fn request_body(request: &GenerationRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": {
                "responseMimeType": request.response_mime_type,
                "responseSchema": gemini_schema(&request.response_schema),
            },
        })
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, UpstreamError> {
        let body = Self::request_body(request);
        let reply = self.call(&request.model, "generateContent", &body).await?;
        let text = extract_text(&reply);
        debug!(chars = text.text.len(), "gemini reply");
        Ok(text)
    }
}

/// Gemini's `responseSchema` is an OpenAPI subset without
/// `additionalProperties`; drop it at every depth.
pub fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != "additionalProperties")
                .map(|(k, v)| (k.clone(), gemini_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}
