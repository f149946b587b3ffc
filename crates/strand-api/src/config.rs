use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub mongodb: MongoDbConfig,
    pub llm: LlmConfig,
    pub dedup: DedupSettings,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub openrouter_api_key: String,
    #[serde(default)]
    pub auth_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Fallback model when a request does not name one.
    pub default_model: String,
    /// Model used for background title generation.
    pub title_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupSettings {
    pub manual_window_ms: i64,
    pub upsert_window_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub chat_limit: u32,
    pub thread_limit: u32,
    pub general_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (with SERVER_, MONGODB_, LLM_, etc. prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("MONGODB")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LLM")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOG")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let mut cfg: Config = config.try_deserialize()?;

        // Secrets never live in TOML
        cfg.mongodb_uri = std::env::var("MONGODB_URI").map_err(|_| {
            ConfigError::Message("MONGODB_URI environment variable is required".to_string())
        })?;
        cfg.openrouter_api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            ConfigError::Message("OPENROUTER_API_KEY environment variable is required".to_string())
        })?;
        cfg.auth_secret = std::env::var("AUTH_SECRET").map_err(|_| {
            ConfigError::Message("AUTH_SECRET environment variable is required".to_string())
        })?;

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 3000

            [cors]
            enabled = true
            origins = ["http://localhost:3000"]

            [mongodb]
            database = "strand_test"

            [llm]
            default_model = "openai/gpt-4o-mini"
            title_model = "openai/gpt-4o-mini"
            temperature = 0.7

            [dedup]
            manual_window_ms = 2000
            upsert_window_ms = 1000

            [rate_limit]
            window_secs = 60
            chat_limit = 30
            thread_limit = 10
            general_limit = 100

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.chat_limit, 30);
        assert_eq!(config.dedup.manual_window_ms, 2000);
    }
}
