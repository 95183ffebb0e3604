use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub storage_dir: PathBuf,
    /// Applied when a quiz carries no time limit of its own.
    pub default_time_limit_minutes: u32,
    pub tick_interval_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env_name = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let api_base_url = settings
            .get_string("api.base_url")
            .or_else(|_| env::var("QUIZ_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        Url::parse(&api_base_url).map_err(|e| {
            config::ConfigError::Message(format!("invalid api base url {api_base_url:?}: {e}"))
        })?;

        let storage_dir = settings
            .get_string("storage.dir")
            .or_else(|_| env::var("QUIZ_STORAGE_DIR"))
            .unwrap_or_else(|_| ".quiz_progress".to_string());

        let default_time_limit_minutes = settings
            .get_int("quiz.default_time_limit_minutes")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(30);

        let tick_interval_ms = settings
            .get_int("quiz.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(1000);

        let request_timeout_seconds = settings
            .get_int("api.request_timeout_seconds")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(5);

        Ok(Config {
            api_base_url,
            storage_dir: PathBuf::from(storage_dir),
            default_time_limit_minutes,
            tick_interval_ms,
            request_timeout_seconds,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
