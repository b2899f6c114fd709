//! Configuration loading and management

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use store_rpc::ClientConfig;

/// Main configuration for the auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HS256 secret for authentication assertions
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Store server URL (e.g. `ws://127.0.0.1:3306`). Without one the
    /// service runs on an in-process store seeded with the fixtures.
    #[serde(default)]
    pub store_url: Option<String>,

    /// Origins allowed to call the API from a browser
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Store connection liveness settings
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Idle streams are health-checked after this many seconds (default: 10)
    #[serde(default = "default_read_idle_timeout")]
    pub read_idle_timeout_secs: u64,

    /// Health-check pong deadline in seconds (default: 15)
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    /// Per-request response deadline in seconds (default: 5)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_idle_timeout_secs: default_read_idle_timeout(),
            ping_timeout_secs: default_ping_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl StoreConfig {
    /// Client settings for the store at `url`
    pub fn client_config(&self, url: &str) -> ClientConfig {
        ClientConfig {
            read_idle_timeout: Duration::from_secs(self.read_idle_timeout_secs),
            ping_timeout: Duration::from_secs(self.ping_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientConfig::new(url)
        }
    }
}

fn default_jwt_secret() -> String {
    "JWT_SECRET".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_read_idle_timeout() -> u64 {
    10
}

fn default_ping_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            store_url: None,
            allowed_origins: default_allowed_origins(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_file);
            let config = Config::default();

            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Written out so operators have something to edit
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }
}
