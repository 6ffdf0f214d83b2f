//! Gemini `generateContent` client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;

use super::capability::{Generation, GenerationCapability};
use super::error::ChatError;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// HTTP client for the Gemini generative language API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
}

impl GeminiClient {
    /// Build a client for `api_base` authenticated with `api_key`
    ///
    /// Invalid keys and URLs are reported as configuration errors; failure
    /// to initialize the HTTP stack is reported as an upstream error.
    pub fn new(api_key: &str, api_base: &str) -> Result<Self, ChatError> {
        let mut key = HeaderValue::from_str(api_key).map_err(|_| {
            ChatError::Configuration(
                "API key contains characters not allowed in an HTTP header".to_string(),
            )
        })?;
        key.set_sensitive(true);

        let base = Url::parse(api_base).map_err(|e| {
            ChatError::Configuration(format!("invalid API base URL '{api_base}': {e}"))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ChatError::Configuration(format!(
                "unsupported API base URL scheme '{}'",
                base.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.api_base)
    }
}

#[async_trait]
impl GenerationCapability for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<Generation, ChatError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint(model))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Upstream(format!("Gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ChatError::Upstream(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let raw: Value = resp
            .json()
            .await
            .map_err(|e| ChatError::Upstream(format!("Gemini response parse error: {e}")))?;

        Ok(Generation::new(raw))
    }
}
