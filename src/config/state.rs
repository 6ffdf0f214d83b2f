// Application state module
// Immutable configuration and services shared by all connections

use std::sync::Arc;

use super::types::Config;
use crate::chat::ChatRelay;

/// Application state
pub struct AppState {
    pub config: Config,
    pub relay: Arc<ChatRelay>,
}

impl AppState {
    /// Create `AppState`, building the chat relay from the chat section
    pub fn new(config: &Config) -> Self {
        Self::with_relay(config, ChatRelay::from_config(&config.chat))
    }

    /// Create `AppState` around an already constructed relay
    pub fn with_relay(config: &Config, relay: ChatRelay) -> Self {
        Self {
            config: config.clone(),
            relay: Arc::new(relay),
        }
    }
}
