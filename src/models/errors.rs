//! Centralized Error Handling Module
//!
//! Every failure carries a unique string code for log scanning and monitoring.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - API_xxx: Bot API call errors (transport, rate limit, application)
//! - CFG_xxx: Configuration errors
//! - RUN_xxx: Pipeline terminations
//! - JOB_xxx: Job control errors

use std::fmt;

/// Application-wide error type. All failures flow through this type.
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Bot API Errors
    // ============================================
    /// Network-level failure (connect refused, DNS, reset)
    ApiConnectionFailed,
    /// Request exceeded the fixed timeout
    ApiTimeout,
    /// Remote answered HTTP 429
    ApiRateLimited,
    /// Remote answered `ok: false` with a description
    ApiError,
    /// Response body could not be decoded
    ApiInvalidResponse,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Required field empty or missing
    ConfigMissingField,
    /// Field present but out of range
    ConfigInvalidValue,
    /// Override file unreadable or not valid JSON
    ConfigFileError,

    // ============================================
    // Pipeline Terminations
    // ============================================
    /// Bot is not business-capable and the bypass flag is off
    RunNotBusinessBot,
    /// Business account balance below the required threshold
    RunInsufficientBalance,
    /// Selected gift has `can_be_transferred == false`
    RunGiftNotTransferable,
    /// Selected gift costs more stars than were transferred
    RunGiftTooExpensive,
    /// Directed selection found no gift with the given id
    RunGiftNotFound,
    /// Interactive selection was non-numeric or out of range
    RunInvalidSelection,
    /// A pipeline step failed with no more specific classification
    RunStepFailed,
    /// Run terminated by user request
    RunCancelled,

    // ============================================
    // Job Control Errors
    // ============================================
    /// A Run is already active
    JobBusy,
    /// Stop requested with no active Run
    JobNotRunning,
    /// Invalid or missing API key
    ApiUnauthorized,
    /// Control API rate limit exceeded
    ApiRateLimitExceeded,

    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            // Bot API Errors
            Self::ApiConnectionFailed => "API_CONNECTION_FAILED",
            Self::ApiTimeout => "API_TIMEOUT",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiError => "API_ERROR",
            Self::ApiInvalidResponse => "API_INVALID_RESPONSE",

            // Configuration Errors
            Self::ConfigMissingField => "CFG_MISSING_FIELD",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigFileError => "CFG_FILE_ERROR",

            // Pipeline Terminations
            Self::RunNotBusinessBot => "RUN_NOT_BUSINESS_BOT",
            Self::RunInsufficientBalance => "RUN_INSUFFICIENT_BALANCE",
            Self::RunGiftNotTransferable => "RUN_GIFT_NOT_TRANSFERABLE",
            Self::RunGiftTooExpensive => "RUN_GIFT_TOO_EXPENSIVE",
            Self::RunGiftNotFound => "RUN_GIFT_NOT_FOUND",
            Self::RunInvalidSelection => "RUN_INVALID_SELECTION",
            Self::RunStepFailed => "RUN_STEP_FAILED",
            Self::RunCancelled => "RUN_CANCELLED",

            // Job Control Errors
            Self::JobBusy => "JOB_BUSY",
            Self::JobNotRunning => "JOB_NOT_RUNNING",
            Self::ApiUnauthorized => "API_UNAUTHORIZED",
            Self::ApiRateLimitExceeded => "API_RATE_LIMIT_EXCEEDED",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for control API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ConfigMissingField
            | Self::ConfigInvalidValue
            | Self::ConfigFileError
            | Self::RunInvalidSelection
            | Self::RunGiftNotFound => 400,
            Self::ApiUnauthorized => 401,
            Self::JobNotRunning => 404,
            Self::ApiRateLimited | Self::ApiRateLimitExceeded => 429,
            Self::JobBusy => 409,
            _ => 500,
        }
    }

    /// Check if the client is allowed to retry this failure.
    /// Validation and business-rule codes are always terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiConnectionFailed
                | Self::ApiTimeout
                | Self::ApiRateLimited
                | Self::ApiError
                | Self::ApiInvalidResponse
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Network-level failure
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiConnectionFailed, msg)
    }

    /// Request timeout
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiTimeout, msg)
    }

    /// HTTP 429 from the remote
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiRateLimited, msg)
    }

    /// Remote application error (`ok: false`). The remote numeric error code,
    /// when present, is folded into the message the way the operator sees it.
    pub fn api_error(description: impl Into<String>, error_code: Option<i64>) -> Self {
        let description = description.into();
        match error_code {
            Some(code) => Self::new(
                ErrorCode::ApiError,
                format!("{} (error code: {})", description, code),
            ),
            None => Self::new(ErrorCode::ApiError, description),
        }
    }

    /// Undecodable response body
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInvalidResponse, msg)
    }

    /// Required config field empty or missing
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingField,
            format!("{} cannot be empty", field),
        )
    }

    /// Config field out of range
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// Pipeline step failed
    pub fn step_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RunStepFailed, msg)
    }

    /// Run terminated by user request
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::RunCancelled, "Run terminated by user")
    }

    /// A Run is already active
    pub fn busy() -> Self {
        Self::new(
            ErrorCode::JobBusy,
            "A process is already running. Please wait for it to complete.",
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ApiTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ApiConnectionFailed, "Connection failed")
        } else {
            Self::with_source(ErrorCode::ApiConnectionFailed, "Request failed", err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ApiInvalidResponse, "JSON parse error", err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}
