//! Chat relay
//!
//! Validates a chat request, forwards the combined prompt to the generation
//! capability and maps the outcome to a JSON envelope:
//!
//! | Outcome                 | Status | Envelope                                  |
//! |-------------------------|--------|-------------------------------------------|
//! | text generated          | 200    | `{"response": "<text>"}`                  |
//! | empty/missing message   | 400    | `{"error": "No message provided"}`        |
//! | no API key              | 500    | `{"error": "API key not configured"}`     |
//! | unusable configuration  | 500    | `{"error": "Configuration error: ..."}`   |
//! | anything else           | 500    | `{"error": "<generic apology>"}`          |

mod capability;
mod error;
mod gemini;
mod prompt;

use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::logger;

pub use capability::{Generation, GenerationCapability};
pub use error::ChatError;
#[cfg(test)]
pub use error::GENERIC_APOLOGY;
pub use gemini::GeminiClient;
pub use prompt::build_prompt;

/// Success or failure body of a chat reply; exactly one key is ever present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatEnvelope {
    Response(String),
    Error(String),
}

/// Envelope plus the HTTP status it is sent with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub status: StatusCode,
    pub envelope: ChatEnvelope,
}

impl ChatReply {
    pub const fn ok(text: String) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: ChatEnvelope::Response(text),
        }
    }

    pub fn from_error(err: &ChatError) -> Self {
        Self {
            status: err.status(),
            envelope: ChatEnvelope::Error(err.public_message()),
        }
    }
}

/// How the relay reaches the generation capability
enum Backend {
    Ready(Arc<dyn GenerationCapability>),
    MissingCredential,
    Misconfigured(String),
    Unavailable(String),
}

/// Forwards user messages to the generation capability
pub struct ChatRelay {
    backend: Backend,
    model: String,
}

impl ChatRelay {
    /// Build the relay from the chat configuration
    ///
    /// Configuration problems do not abort startup; they are reported on
    /// every chat request instead, leaving the pages available.
    pub fn from_config(config: &ChatConfig) -> Self {
        let model = config.model.trim();
        let Some(key) = config.api_key() else {
            logger::log_warning("Gemini API key not configured, /chat will reply with 500");
            return Self::unconfigured(model);
        };

        let backend = if model.is_empty() {
            Backend::Misconfigured("model identifier must not be empty".to_string())
        } else {
            match GeminiClient::new(key, &config.api_base) {
                Ok(client) => return Self::with_capability(Arc::new(client), model),
                Err(ChatError::Configuration(detail)) => {
                    logger::log_warning(&format!("Chat relay misconfigured: {detail}"));
                    Backend::Misconfigured(detail)
                }
                Err(e) => Backend::Unavailable(e.to_string()),
            }
        };
        Self {
            backend,
            model: model.to_string(),
        }
    }

    /// Build a relay around an existing capability
    pub fn with_capability(capability: Arc<dyn GenerationCapability>, model: &str) -> Self {
        Self {
            backend: Backend::Ready(capability),
            model: model.to_string(),
        }
    }

    /// Build a relay that has no API key
    pub fn unconfigured(model: &str) -> Self {
        Self {
            backend: Backend::MissingCredential,
            model: model.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    /// Handle one chat request body and produce the reply to send
    pub async fn handle_chat(&self, body: &[u8]) -> ChatReply {
        match self.relay(body).await {
            Ok(text) => ChatReply::ok(text),
            Err(err) => {
                if let ChatError::Upstream(detail) = &err {
                    logger::log_error(&format!("Chat error: {detail}"));
                }
                ChatReply::from_error(&err)
            }
        }
    }

    async fn relay(&self, body: &[u8]) -> Result<String, ChatError> {
        let message = parse_message(body)?;
        if message.is_empty() {
            return Err(ChatError::MissingMessage);
        }

        let capability = match &self.backend {
            Backend::Ready(capability) => capability,
            Backend::MissingCredential => return Err(ChatError::MissingCredential),
            Backend::Misconfigured(detail) => {
                return Err(ChatError::Configuration(detail.clone()))
            }
            Backend::Unavailable(detail) => return Err(ChatError::Upstream(detail.clone())),
        };

        let prompt = build_prompt(&message);
        let generation = capability
            .generate(&self.model, &prompt)
            .await
            .map_err(as_upstream)?;
        Ok(generation.into_reply_text())
    }
}

/// Errors raised while generating count as upstream failures, except for
/// configuration problems the capability detects itself
fn as_upstream(err: ChatError) -> ChatError {
    match err {
        ChatError::Configuration(_) | ChatError::Upstream(_) => err,
        other => ChatError::Upstream(format!("capability failed: {other}")),
    }
}

/// Extract `message` from a JSON object body
///
/// A missing or falsy value (`null`, `false`, `0`, `""`, `[]`, `{}`) yields
/// an empty message. Other scalars are relayed in their text form; non-empty
/// arrays and objects are rejected.
fn parse_message(body: &[u8]) -> Result<String, ChatError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ChatError::Upstream(format!("invalid JSON body: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(ChatError::Upstream(
            "request body is not a JSON object".to_string(),
        ));
    };

    match object.get("message") {
        None => Ok(String::new()),
        Some(value) if is_falsy(value) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Bool(_)) => Ok("True".to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ChatError::Upstream(format!(
            "`message` is not a scalar: {other}"
        ))),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Capability returning a fixed outcome and recording what it was sent
    struct ScriptedCapability {
        outcome: Result<Generation, ChatError>,
        calls: AtomicUsize,
        last: Mutex<Option<(String, String)>>,
    }

    impl ScriptedCapability {
        fn replying(text: &str) -> Arc<Self> {
            Self::with_outcome(Ok(Generation::new(json!({
                "candidates": [{"content": {"parts": [{"text": text}]}}]
            }))))
        }

        fn with_outcome(outcome: Result<Generation, ChatError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationCapability for ScriptedCapability {
        async fn generate(&self, model: &str, prompt: &str) -> Result<Generation, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((model.to_string(), prompt.to_string()));
            self.outcome.clone()
        }
    }

    fn relay_with(capability: &Arc<ScriptedCapability>) -> ChatRelay {
        ChatRelay::with_capability(capability.clone(), "gemini-2.0-flash")
    }

    fn error_reply(status: StatusCode, message: &str) -> ChatReply {
        ChatReply {
            status,
            envelope: ChatEnvelope::Error(message.to_string()),
        }
    }

    #[tokio::test]
    async fn test_relays_generated_text() {
        let capability = ScriptedCapability::replying("It sounds like a hard day.");
        let relay = relay_with(&capability);

        for message in ["I feel low", " ", "😔", "a much longer message about my week"] {
            let body = json!({ "message": message }).to_string();
            let reply = relay.handle_chat(body.as_bytes()).await;
            assert_eq!(reply, ChatReply::ok("It sounds like a hard day.".to_string()));
        }
        assert_eq!(capability.calls(), 4);
    }

    #[tokio::test]
    async fn test_sends_combined_prompt_and_model() {
        let capability = ScriptedCapability::replying("ok");
        let relay = relay_with(&capability);

        relay.handle_chat(br#"{"message":"I can't sleep"}"#).await;

        let (model, prompt) = capability.last.lock().unwrap().clone().unwrap();
        assert_eq!(model, "gemini-2.0-flash");
        assert_eq!(prompt, build_prompt("I can't sleep"));
    }

    #[tokio::test]
    async fn test_empty_or_missing_message_is_rejected() {
        let capability = ScriptedCapability::replying("unused");
        let relay = relay_with(&capability);

        for body in [r#"{"message":""}"#, "{}", r#"{"message":null}"#, r#"{"text":"hi"}"#] {
            let reply = relay.handle_chat(body.as_bytes()).await;
            assert_eq!(
                reply,
                error_reply(StatusCode::BAD_REQUEST, "No message provided")
            );
        }
        assert_eq!(capability.calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_precedes_credential_check() {
        let relay = ChatRelay::unconfigured("gemini-2.0-flash");
        let reply = relay.handle_chat(br#"{"message":""}"#).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let relay = ChatRelay::unconfigured("gemini-2.0-flash");
        for message in ["hello", "help me"] {
            let body = json!({ "message": message }).to_string();
            let reply = relay.handle_chat(body.as_bytes()).await;
            assert_eq!(
                reply,
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, "API key not configured")
            );
        }
    }

    #[tokio::test]
    async fn test_from_config_without_key() {
        let mut config = crate::config::test_config().chat;
        config.api_key = Some(String::new());
        let relay = ChatRelay::from_config(&config);
        assert!(!relay.is_configured());

        let reply = relay.handle_chat(br#"{"message":"hi"}"#).await;
        assert_eq!(
            reply,
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, "API key not configured")
        );
    }

    #[tokio::test]
    async fn test_from_config_with_bad_base_url() {
        let mut config = crate::config::test_config().chat;
        config.api_key = Some("key".to_string());
        config.api_base = "::nope::".to_string();
        let relay = ChatRelay::from_config(&config);
        assert!(!relay.is_configured());

        let reply = relay.handle_chat(br#"{"message":"hi"}"#).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        let ChatEnvelope::Error(message) = reply.envelope else {
            panic!("expected error envelope");
        };
        assert!(message.starts_with("Configuration error: invalid API base URL"));
    }

    #[tokio::test]
    async fn test_from_config_with_empty_model() {
        let mut config = crate::config::test_config().chat;
        config.api_key = Some("key".to_string());
        config.model = "  ".to_string();
        let relay = ChatRelay::from_config(&config);

        let reply = relay.handle_chat(br#"{"message":"hi"}"#).await;
        assert_eq!(
            reply,
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error: model identifier must not be empty"
            )
        );
    }

    #[test]
    fn test_from_config_with_key_is_ready() {
        let mut config = crate::config::test_config().chat;
        config.api_key = Some("key".to_string());
        assert!(ChatRelay::from_config(&config).is_configured());
    }

    #[tokio::test]
    async fn test_upstream_failures_are_generic() {
        let failures = [
            "connection reset by peer",
            "Gemini returned 429 Too Many Requests: quota",
            "Gemini response parse error: EOF",
        ];
        for detail in failures {
            let capability =
                ScriptedCapability::with_outcome(Err(ChatError::Upstream(detail.to_string())));
            let relay = relay_with(&capability);
            let reply = relay.handle_chat(br#"{"message":"hi"}"#).await;
            assert_eq!(
                reply,
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_APOLOGY)
            );
            assert_eq!(capability.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_generic() {
        let capability = ScriptedCapability::replying("unused");
        let relay = relay_with(&capability);

        for body in [
            "not json",
            "",
            "[\"hi\"]",
            "null",
            r#"{"message":["hi"]}"#,
            r#"{"message":{"text":"hi"}}"#,
        ] {
            let reply = relay.handle_chat(body.as_bytes()).await;
            assert_eq!(
                reply,
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_APOLOGY)
            );
        }
        assert_eq!(capability.calls(), 0);
    }

    #[tokio::test]
    async fn test_falsy_messages_are_missing() {
        let capability = ScriptedCapability::replying("unused");
        let relay = relay_with(&capability);

        for message in [json!(false), json!(0), json!(0.0), json!([]), json!({}), json!(null)] {
            let body = json!({ "message": message }).to_string();
            let reply = relay.handle_chat(body.as_bytes()).await;
            assert_eq!(
                reply,
                error_reply(StatusCode::BAD_REQUEST, "No message provided")
            );
        }
        assert_eq!(capability.calls(), 0);
    }

    #[tokio::test]
    async fn test_scalar_messages_are_relayed_as_text() {
        for (message, text) in [(json!(42), "42"), (json!(1.5), "1.5"), (json!(true), "True")] {
            let capability = ScriptedCapability::replying("Thank you for sharing.");
            let relay = relay_with(&capability);

            let body = json!({ "message": message }).to_string();
            let reply = relay.handle_chat(body.as_bytes()).await;
            assert_eq!(reply, ChatReply::ok("Thank you for sharing.".to_string()));

            let (_, prompt) = capability.last.lock().unwrap().clone().unwrap();
            assert!(prompt.contains(&format!("User message: {text}\n\n")));
        }
    }

    #[tokio::test]
    async fn test_capability_errors_are_reported_as_upstream() {
        for err in [ChatError::MissingMessage, ChatError::MissingCredential] {
            let capability = ScriptedCapability::with_outcome(Err(err));
            let relay = relay_with(&capability);
            let reply = relay.handle_chat(br#"{"message":"hi"}"#).await;
            assert_eq!(
                reply,
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_APOLOGY)
            );
            assert_eq!(capability.calls(), 1);
        }

        let capability = ScriptedCapability::with_outcome(Err(ChatError::Configuration(
            "model not found".to_string(),
        )));
        let reply = relay_with(&capability)
            .handle_chat(br#"{"message":"hi"}"#)
            .await;
        assert_eq!(
            reply,
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error: model not found"
            )
        );
    }

    #[tokio::test]
    async fn test_response_without_text_is_stringified() {
        let raw = json!({"candidates": [], "usageMetadata": {"promptTokenCount": 80}});
        let capability = ScriptedCapability::with_outcome(Ok(Generation::new(raw.clone())));
        let relay = relay_with(&capability);

        let reply = relay.handle_chat(br#"{"message":"hi"}"#).await;
        assert_eq!(reply, ChatReply::ok(raw.to_string()));
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let capability = ScriptedCapability::replying("Take a slow breath.");
        let relay = relay_with(&capability);
        let body = br#"{"message":"I am stressed"}"#;

        let first = relay.handle_chat(body).await;
        let second = relay.handle_chat(body).await;
        assert_eq!(first, second);
        assert_eq!(capability.calls(), 2);
    }

    #[test]
    fn test_envelope_serialization() {
        assert_eq!(
            serde_json::to_value(ChatEnvelope::Response("hi".into())).unwrap(),
            json!({"response": "hi"})
        );
        assert_eq!(
            serde_json::to_value(ChatEnvelope::Error("No message provided".into())).unwrap(),
            json!({"error": "No message provided"})
        );
    }
}
