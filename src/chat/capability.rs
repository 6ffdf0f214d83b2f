//! Text generation capability seam
//!
//! The relay only depends on this trait, so the hosted API can be swapped
//! for a scripted implementation in tests.

use async_trait::async_trait;
use serde_json::Value;

use super::error::ChatError;

/// External service that turns a prompt into generated text
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Submit `prompt` as the whole content payload for `model`
    async fn generate(&self, model: &str, prompt: &str) -> Result<Generation, ChatError>;
}

/// Raw response object returned by a generation call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    raw: Value,
}

impl Generation {
    pub const fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Text of the first candidate, its parts concatenated
    ///
    /// `None` when the response has no candidate or no text part.
    pub fn text(&self) -> Option<String> {
        let parts = self
            .raw
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;

        let mut texts = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .peekable();
        texts.peek()?;
        Some(texts.collect())
    }

    /// Text of the response, or the whole response object serialized when it has none
    pub fn into_reply_text(self) -> String {
        self.text().unwrap_or_else(|| self.raw.to_string())
    }
}
