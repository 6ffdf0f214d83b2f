// Configuration module entry point
// Loads application configuration and holds shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{ChatConfig, Config};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Values from the file are overridden by `MINDFUL__SECTION__KEY`
    /// environment variables. The chat API key falls back to `GEMINI_API_KEY`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("MINDFUL").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 60)?
            .set_default("performance.write_timeout", 60)?
            .set_default("http.server_name", "MindfulWeb/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("pages.templates_dir", "templates")?
            .set_default("pages.static_dir", "static")?
            .set_default(
                "chat.api_base",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("chat.model", "gemini-2.0-flash")?
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        if cfg.chat.api_key().is_none() {
            cfg.chat.api_key = std::env::var(API_KEY_ENV).ok();
        }
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    use types::{HttpConfig, LoggingConfig, PagesConfig, PerformanceConfig, ServerConfig};

    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            workers: None,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            access_log: false,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        },
        performance: PerformanceConfig {
            keep_alive_timeout: 75,
            read_timeout: 60,
            write_timeout: 60,
            max_connections: None,
        },
        http: HttpConfig {
            server_name: "MindfulWeb/test".to_string(),
            enable_cors: false,
            max_body_size: 1024,
        },
        pages: PagesConfig {
            templates_dir: "templates".to_string(),
            static_dir: "static".to_string(),
        },
        chat: ChatConfig {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
        },
    }
}
