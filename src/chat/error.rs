//! Chat failure kinds and their HTTP mapping

use hyper::StatusCode;
use thiserror::Error;

/// Reply text for every failure whose detail must stay server-side
pub const GENERIC_APOLOGY: &str =
    "I apologize, but I encountered a technical issue. Please try again in a moment.";

/// Failure of a single chat relay call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Request carried no usable `message`
    #[error("No message provided")]
    MissingMessage,

    /// No API key in the configuration or environment
    #[error("API key not configured")]
    MissingCredential,

    /// Client could not be built from the configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything else: body parsing, transport, upstream status, upstream payload
    #[error("{0}")]
    Upstream(String),
}

impl ChatError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingMessage => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::Configuration(_) | Self::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message placed in the `error` field of the envelope
    pub fn public_message(&self) -> String {
        match self {
            Self::Upstream(_) => GENERIC_APOLOGY.to_string(),
            other => other.to_string(),
        }
    }
}
