use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_enabled: Option<bool>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub rate_limit_max_requests: Option<u32>,
    pub rate_limit_window_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://subchat.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                enabled: true,
                api_key: None,
                base_url: "http://localhost:11434/v1".to_string(),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 3,
                retry_base_delay_ms: 500,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            rate_limit: RateLimitConfig {
                max_requests: 10,
                window_secs: 60,
                sweep_interval_secs: 300,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    /// Precedence: defaults, then the TOML patch file, then environment
    /// variables, then programmatic overrides. Validation runs last.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => config.apply_patch(read_patch(&path)?),
            None if options.require_file => {
                return Err(ConfigError::MissingConfigFile(
                    options.config_path.unwrap_or_else(|| PathBuf::from("subchat.toml")),
                ));
            }
            None => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            apply_if_some(&mut self.database.url, database.url);
            apply_if_some(&mut self.database.max_connections, database.max_connections);
            apply_if_some(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(llm) = patch.llm {
            apply_if_some(&mut self.llm.enabled, llm.enabled);
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(SecretString::from(api_key));
            }
            apply_if_some(&mut self.llm.base_url, llm.base_url);
            apply_if_some(&mut self.llm.model, llm.model);
            apply_if_some(&mut self.llm.timeout_secs, llm.timeout_secs);
            apply_if_some(&mut self.llm.max_retries, llm.max_retries);
            apply_if_some(&mut self.llm.retry_base_delay_ms, llm.retry_base_delay_ms);
        }
        if let Some(server) = patch.server {
            apply_if_some(&mut self.server.bind_address, server.bind_address);
            apply_if_some(&mut self.server.port, server.port);
            apply_if_some(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(rate_limit) = patch.rate_limit {
            apply_if_some(&mut self.rate_limit.max_requests, rate_limit.max_requests);
            apply_if_some(&mut self.rate_limit.window_secs, rate_limit.window_secs);
            apply_if_some(&mut self.rate_limit.sweep_interval_secs, rate_limit.sweep_interval_secs);
        }
        if let Some(logging) = patch.logging {
            apply_if_some(&mut self.logging.level, logging.level);
            if let Some(format) = logging.format.and_then(|value| value.parse().ok()) {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = read_env("SUBCHAT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(value) = read_env("SUBCHAT_LLM_ENABLED") {
            self.llm.enabled = parse_bool("SUBCHAT_LLM_ENABLED", &value)?;
        }
        if let Some(api_key) = read_env("SUBCHAT_LLM_API_KEY") {
            self.llm.api_key = Some(SecretString::from(api_key));
        }
        if let Some(base_url) = read_env("SUBCHAT_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = read_env("SUBCHAT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(value) = read_env("SUBCHAT_SERVER_PORT") {
            self.server.port = parse_u16("SUBCHAT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SUBCHAT_RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = parse_u32("SUBCHAT_RATE_LIMIT_MAX_REQUESTS", &value)?;
        }
        if let Some(value) = read_env("SUBCHAT_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = parse_u64("SUBCHAT_RATE_LIMIT_WINDOW_SECS", &value)?;
        }
        if let Some(level) = read_env("SUBCHAT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = read_env("SUBCHAT_LOG_FORMAT") {
            self.logging.format = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "SUBCHAT_LOG_FORMAT".to_string(),
                value,
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        apply_if_some(&mut self.database.url, overrides.database_url);
        apply_if_some(&mut self.logging.level, overrides.log_level);
        apply_if_some(&mut self.llm.enabled, overrides.llm_enabled);
        apply_if_some(&mut self.llm.model, overrides.llm_model);
        apply_if_some(&mut self.llm.base_url, overrides.llm_base_url);
        apply_if_some(&mut self.rate_limit.max_requests, overrides.rate_limit_max_requests);
        apply_if_some(&mut self.rate_limit.window_secs, overrides.rate_limit_window_secs);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.llm.enabled && self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.base_url must be set when llm.enabled = true".to_string(),
            ));
        }
        if self.llm.max_retries == 0 {
            return Err(ConfigError::Validation(
                "llm.max_retries must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.max_requests must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.window_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn apply_if_some<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("subchat.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    rate_limit: Option<RateLimitPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitPatch {
    max_requests: Option<u32>,
    window_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<String>,
}
