//! Generative-language client boundary.

pub mod client;
pub mod gemini;

pub use client::{GeneratedText, GenerationClient, GenerationRequest, extract_text};
pub use gemini::GeminiClient;
