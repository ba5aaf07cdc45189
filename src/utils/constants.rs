//! Constants Module - Single Source of Truth
//!
//! Every fixed value shared across the client, the pipeline, and the control
//! API lives here. No hardcoded values in other modules.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "GiftCourier";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outgoing Bot API requests
pub const USER_AGENT: &str = "GiftCourier/0.1.0";

// ============================================
// BOT API CONSTANTS
// ============================================

/// Base URL for the Bot API. The bot token is appended directly, then the
/// endpoint path: `{BASE}{token}/{endpoint}`.
pub const API_BASE_URL: &str = "https://api.telegram.org/bot";

/// Fixed per-request timeout (seconds)
pub const API_TIMEOUT_SECS: u64 = 10;

/// Cap applied to every retry sleep, exponential or server-hinted (seconds)
pub const MAX_RETRY_SLEEP_SECS: u64 = 30;

/// Page size used when enumerating owned gifts
pub const GIFT_PAGE_LIMIT: u32 = 100;

// ============================================
// PIPELINE CONSTANTS
// ============================================

/// The post-transfer wait is slept in chunks of this size so progress stays
/// observable and a stop request lands between chunks at the latest.
pub const WAIT_CHUNK_SECS: u64 = 5;

/// Log file name prefix; one file per Run, suffixed with a timestamp.
pub const LOG_FILE_PREFIX: &str = "gift_transfer_log_";

/// Timestamp format used in log file names
pub const LOG_FILE_TIMESTAMP: &str = "%Y%m%d_%H%M%S";
