//! Exercise illustration generation.
//!
//! Always yields a displayable URL: a `data:` URL with the generated
//! image, or a placeholder when there is no API key, the upstream fails,
//! or the reply carries no image.

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::llm::GeminiClient;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::upstream::UpstreamError;

pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-nano-banana";
pub const DEFAULT_SECONDARY_MODEL: &str = "imagen-3.0-generate-002";

const PLACEHOLDER_BASE: &str = "https://via.placeholder.com/600x400/purple/white?text=";
const ERROR_PLACEHOLDER_TEXT: &str = "Error+Generating+Image";

/// Placeholder image URL captioned with `text`.
pub fn placeholder_url(text: &str) -> String {
    format!("{PLACEHOLDER_BASE}{}", urlencoding::encode(text))
}

/// Placeholder shown when generation failed outright.
pub fn error_placeholder() -> String {
    format!("{PLACEHOLDER_BASE}{ERROR_PLACEHOLDER_TEXT}")
}

pub struct ImageGenerator {
    /// `None` when no API key is configured.
    client: Option<GeminiClient>,
    primary_model: String,
    secondary_model: String,
    retry: RetryPolicy,
}

impl ImageGenerator {
    pub fn new(client: Option<GeminiClient>) -> Self {
        Self {
            client,
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            secondary_model: DEFAULT_SECONDARY_MODEL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_models(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.primary_model = primary.into();
        self.secondary_model = secondary.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn primary_model(&self) -> &str {
        &self.primary_model
    }

    /// Generate an image for `prompt`. `model` selects the primary model
    /// when it names it; anything else selects the secondary one.
    pub async fn generate(&self, prompt: &str, model: Option<&str>) -> String {
        let Some(client) = &self.client else {
            info!("no image API key configured, returning placeholder");
            return placeholder_url(prompt);
        };

        let use_primary = model.is_none_or(|m| m == self.primary_model);
        let (model, method, body) = if use_primary {
            (&self.primary_model, "generateContent", primary_payload(prompt))
        } else {
            (&self.secondary_model, "predict", secondary_payload(prompt))
        };

        let reply = retry_with_backoff(&self.retry, |_| client.call(model, method, &body)).await;

        match reply {
            Ok(reply) => match extract_image(&reply, use_primary) {
                Some(data) => format!("data:image/jpeg;base64,{data}"),
                None => {
                    warn!(%model, "image reply carried no image data");
                    placeholder_url(prompt)
                }
            },
            Err(e @ (UpstreamError::Client { .. } | UpstreamError::Server { .. })) => {
                warn!(%model, error = %e, "image generation rejected");
                placeholder_url(prompt)
            }
            Err(e) => {
                warn!(%model, error = %e, "image generation failed");
                error_placeholder()
            }
        }
    }
}

fn primary_payload(prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": format!("Generate an image of: {prompt}") }],
        }],
        "generationConfig": {
            "temperature": 0.4,
            "topK": 32,
            "topP": 1,
            "maxOutputTokens": 2048,
        },
    })
}

fn secondary_payload(prompt: &str) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": 1,
            "outputMimeType": "image/jpeg",
            "aspectRatio": "1:1",
        },
    })
}

fn extract_image(reply: &Value, primary: bool) -> Option<&str> {
    let data = if primary {
        reply
            .pointer("/candidates/0/content/parts")?
            .as_array()?
            .iter()
            .find_map(|p| p.pointer("/inlineData/data").and_then(Value::as_str))
    } else {
        reply
            .pointer("/predictions/0/bytesBase64Encoded")
            .and_then(Value::as_str)
    };
    data.filter(|d| !d.is_empty())
}
