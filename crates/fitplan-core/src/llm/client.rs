use async_trait::async_trait;
use serde_json::Value;

use crate::upstream::UpstreamError;

/// One schema-constrained generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// JSON schema the reply must satisfy.
    pub response_schema: Value,
    pub response_mime_type: String,
}

impl GenerationRequest {
    pub fn json(model: impl Into<String>, prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            response_schema: schema,
            response_mime_type: "application/json".to_string(),
        }
    }
}

/// Upstream reply reduced to its generated text.
///
/// `text` may be empty when the upstream answered without content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedText {
    pub text: String,
}

/// Boundary to a generative-language service.
///
/// Implementations hide the provider's wire format; callers only ever see
/// [`GeneratedText`].
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, UpstreamError>;
}

// Compile-time check that the trait stays object safe.
const _: () = {
    fn _assert_object_safe(_: &dyn GenerationClient) {}
};

/// Pull the generated text out of any reply shape the providers use.
///
/// Recognised, in order: a top-level `text` string;
/// `candidates[0].content.parts[*].text` (joined); `outputs[0].text` or
/// `outputs[0].content`. Anything else yields an empty string.
pub fn extract_text(reply: &Value) -> GeneratedText {
    if let Some(text) = reply.get("text").and_then(Value::as_str) {
        return GeneratedText {
            text: text.to_string(),
        };
    }

    if let Some(parts) = reply
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    {
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        return GeneratedText { text };
    }

    if let Some(output) = reply.pointer("/outputs/0") {
        let text = output
            .get("text")
            .or_else(|| output.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        return GeneratedText {
            text: text.to_string(),
        };
    }

    GeneratedText::default()
}
