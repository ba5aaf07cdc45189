//! Configuration module
//!
//! All tunables are loaded once (environment variables first, then an
//! optional JSON override file using the same SCREAMING_SNAKE_CASE keys),
//! validated, and shared read-only for the rest of the process. The bot token
//! is never logged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::errors::{AppError, AppResult, ErrorCode};

/// Immutable application configuration, shared by the client, the pipeline,
/// and the control API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct AppConfig {
    /// Bot credential token. Required, never logged.
    pub bot_token: String,
    /// Business connection identifier. Required.
    pub business_connection_id: String,
    /// Recipient chat id. Must be positive.
    pub target_chat_id: i64,
    /// Stars moved into the bot pool per transfer
    pub star_count: u32,
    /// Attempt budget for retryable API calls
    pub max_retries: u32,
    /// Base backoff delay in seconds
    pub retry_delay: u64,
    /// Seconds to wait after the star transfer before enumerating gifts
    pub transfer_wait_time: u64,
    /// Continue past a non-business bot (warning instead of termination)
    pub bypass_business_check: bool,
    /// Issue a second star transfer after the first succeeds
    pub enable_redundant_transfer: bool,
    /// Directory for per-Run log files
    pub log_dir: String,
    /// Shared secret for the control API. Absent disables the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            business_connection_id: String::new(),
            target_chat_id: 0,
            star_count: 25,
            max_retries: 3,
            retry_delay: 5,
            transfer_wait_time: 60,
            bypass_business_check: false,
            enable_redundant_transfer: false,
            log_dir: "logs".to_string(),
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Load from environment variables, then apply the JSON override file
    /// when given, then validate.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::from_env();

        if let Some(path) = config_file {
            config = config.merge_file(path)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load for the control API server: an incomplete environment is fine
    /// because per-request bodies carry the credentials. Falls back to
    /// defaults plus whatever the environment provides.
    pub fn load_or_fallback() -> Self {
        let config = Self::from_env();
        if let Err(e) = config.validate() {
            warn!("Could not load full configuration: {}", e);
        }
        config
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bot_token: env_str("BOT_TOKEN").unwrap_or(defaults.bot_token),
            business_connection_id: env_str("BUSINESS_CONNECTION_ID")
                .unwrap_or(defaults.business_connection_id),
            target_chat_id: env_parse("TARGET_CHAT_ID").unwrap_or(defaults.target_chat_id),
            star_count: env_parse("STAR_COUNT").unwrap_or(defaults.star_count),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay: env_parse("RETRY_DELAY").unwrap_or(defaults.retry_delay),
            transfer_wait_time: env_parse("TRANSFER_WAIT_TIME")
                .unwrap_or(defaults.transfer_wait_time),
            bypass_business_check: env_flag("BYPASS_BUSINESS_CHECK"),
            enable_redundant_transfer: env_flag("ENABLE_REDUNDANT_TRANSFER"),
            log_dir: env_str("LOG_DIR").unwrap_or(defaults.log_dir),
            api_key: env_str("API_KEY"),
        }
    }

    /// Overlay values from a JSON file. Keys use the same names as the
    /// environment variables; unknown keys are ignored.
    fn merge_file(self, path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::with_source(
                ErrorCode::ConfigFileError,
                format!("Error loading configuration file {}", path.display()),
                e,
            )
        })?;

        let overrides: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::with_source(
                ErrorCode::ConfigFileError,
                format!("Configuration file {} is not valid JSON", path.display()),
                e,
            )
        })?;

        let mut base = serde_json::to_value(&self)
            .map_err(|e| AppError::with_source(ErrorCode::ConfigFileError, "Config encode", e))?;

        if let (Some(base_map), Some(override_map)) = (base.as_object_mut(), overrides.as_object())
        {
            for (key, value) in override_map {
                base_map.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(base).map_err(|e| {
            AppError::with_source(
                ErrorCode::ConfigFileError,
                format!("Invalid value in configuration file {}", path.display()),
                e,
            )
        })
    }

    /// Validate once at load time. Credentials must be present, counts must
    /// be positive.
    pub fn validate(&self) -> AppResult<()> {
        if self.bot_token.trim().is_empty() {
            return Err(AppError::missing_field("BOT_TOKEN"));
        }
        if self.business_connection_id.trim().is_empty() {
            return Err(AppError::missing_field("BUSINESS_CONNECTION_ID"));
        }
        if self.target_chat_id <= 0 {
            return Err(AppError::invalid_value(
                "TARGET_CHAT_ID must be a positive integer",
            ));
        }
        if self.star_count == 0 {
            return Err(AppError::invalid_value("STAR_COUNT must be positive"));
        }
        if self.max_retries == 0 {
            return Err(AppError::invalid_value("MAX_RETRIES must be positive"));
        }
        if self.retry_delay == 0 {
            return Err(AppError::invalid_value("RETRY_DELAY must be positive"));
        }
        Ok(())
    }

    /// Balance required before the star transfer begins: double when the
    /// redundant transfer is enabled, single otherwise.
    pub fn required_balance(&self) -> i64 {
        if self.enable_redundant_transfer {
            i64::from(self.star_count) * 2
        } else {
            i64::from(self.star_count)
        }
    }

    /// Token masked for display. Only the bot id prefix survives.
    pub fn masked_token(&self) -> String {
        match self.bot_token.split_once(':') {
            Some((bot_id, _)) => format!("{}:***", bot_id),
            None => "***".to_string(),
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "1"))
        .unwrap_or(false)
}
