use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::DEFAULT_OPENAI_BASE_URL;

/// Main configuration structure for the study relay and its client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub openai: OpenAIConfig,
    pub client: ClientConfig,
    pub storage: StorageConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub bind: String,
    /// Reported by the status endpoint
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    /// Never read from the config file in practice; `OPENAI_API_KEY` wins
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full URL of the chat endpoint
    pub api_url: String,
    pub timeout_seconds: u64,
    /// Answer locally without touching the network
    pub test_mode: bool,
    pub test_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
    Redis,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "redis" => Ok(StorageBackend::Redis),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// JSON file used by the `file` backend
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub key_prefix: String,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "study-fast".to_string(),
            bind: "127.0.0.1:3000".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000/api/chat".to_string(),
            timeout_seconds: 120,
            test_mode: false,
            test_delay_ms: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("study-fast-data.json"),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            key_prefix: "study".to_string(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            timeout_seconds: 5,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// Always returns a usable config; problems are logged.
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("STUDY_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = Self::from_file(Path::new(&config_path));
        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {} - using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub(crate) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(bind) = lookup("STUDY_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Some(environment) = lookup("STUDY_ENV").or_else(|| lookup("NODE_ENV")) {
            self.server.environment = environment;
        }

        // Provider overrides
        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = Some(api_key);
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.openai.base_url = base_url;
        }
        if self
            .openai
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.openai.api_key = None;
        }

        // Client overrides
        if let Some(url) = lookup("STUDY_API_URL") {
            self.client.api_url = url;
        }
        if let Some(test_mode) = lookup("STUDY_TEST_MODE") {
            self.client.test_mode = matches!(test_mode.as_str(), "1" | "true" | "yes");
        }

        // Storage overrides
        if let Some(backend) = lookup("STUDY_STORAGE") {
            match backend.parse() {
                Ok(b) => self.storage.backend = b,
                Err(e) => tracing::warn!("Ignoring STUDY_STORAGE: {}", e),
            }
        }
        if let Some(path) = lookup("STUDY_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        // Redis overrides
        if let Some(host) = lookup("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Some(db) = lookup("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.openai.api_key.is_none() {
            return Err("OPENAI_API_KEY is not set; /api/chat will answer 500".to_string());
        }
        if self.redis.port == 0 {
            return Err("Redis port cannot be 0".to_string());
        }
        if self.client.timeout_seconds == 0 {
            return Err("client.timeout_seconds cannot be 0".to_string());
        }
        Ok(())
    }

    pub fn api_key_configured(&self) -> bool {
        self.openai.api_key.is_some()
    }

    /// Get Redis URL with password from environment
    pub fn get_redis_url(&self) -> String {
        let password = env::var("REDIS_PASSWORD")
            .or_else(|_| env::var("REDIS_PASS"))
            .unwrap_or_default();

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.database
            )
        }
    }

    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_seconds)
    }
}
