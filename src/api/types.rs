//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::core::runlog::OutputLine;
use crate::models::errors::AppError;
use crate::models::types::OwnedGift;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: None,
        }
    }
}

// ============================================
// Run / Transfer / Gifts
// ============================================

/// Per-request configuration body shared by run, transfer, and gifts
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub business_connection_id: String,
    #[serde(default)]
    pub target_chat_id: i64,
    #[serde(default = "default_star_count")]
    pub star_count: u32,
    #[serde(default)]
    pub bypass_business_check: bool,
    #[serde(default)]
    pub enable_redundant_transfer: bool,
    /// Present on transfer requests; ignored fields never fail decoding
    #[serde(default)]
    pub gift_id: Option<String>,
}

fn default_star_count() -> u32 {
    25
}

impl RunRequest {
    /// Build the Run's immutable config: request fields for the credentials
    /// and flags, server config for everything operational.
    pub fn to_config(&self, server: &AppConfig) -> AppConfig {
        AppConfig {
            bot_token: self.bot_token.trim().to_string(),
            business_connection_id: self.business_connection_id.trim().to_string(),
            target_chat_id: self.target_chat_id,
            star_count: self.star_count,
            bypass_business_check: self.bypass_business_check,
            enable_redundant_transfer: self.enable_redundant_transfer,
            max_retries: server.max_retries,
            retry_delay: server.retry_delay,
            transfer_wait_time: server.transfer_wait_time,
            log_dir: server.log_dir.clone(),
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunStartedData {
    pub job_id: String,
    pub log_file: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct GiftsData {
    pub total: usize,
    pub gifts: Vec<OwnedGift>,
}

// ============================================
// Status / Stop
// ============================================

#[derive(Debug, Serialize)]
pub struct StatusData {
    pub running: bool,
    pub output: Vec<OutputLine>,
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: String,
}

// ============================================
// Logs / Health
// ============================================

#[derive(Debug, Serialize)]
pub struct LogsData {
    pub logs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub running: bool,
    pub version: String,
    pub uptime_seconds: u64,
}
