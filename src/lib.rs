//! Gift Courier Library
//!
//! Automated star and gift transfer pipeline for the Telegram Bot API:
//! - Retrying API client with exponential backoff and rate-limit handling
//! - Fail-fast orchestration of the transfer sequence (connectivity →
//!   validation → balance → star transfer → wait → gift selection → transfer)
//! - One-Run-at-a-time job control with per-Run log artifacts
//! - Web control surface for starting, watching, and stopping Runs

pub mod api;
pub mod client;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;

pub use crate::client::{ApiMethod, BotApiClient};
pub use crate::config::AppConfig;
pub use crate::core::gifts::{find_gift_by_id, validate_gift_for_transfer};
pub use crate::core::pipeline::TransferPipeline;
pub use crate::core::registry::{RunMode, RunRegistry, RunStatus, StartedRun};
pub use crate::core::runlog::{OutputLine, RunLog};
pub use crate::core::selector::{DirectedSelector, GiftSelector, PromptSelector};
pub use crate::models::errors::{AppError, AppResult, ErrorCode};
pub use crate::models::types::{BotProfile, ChatInfo, GiftDetails, OwnedGift, OwnedGifts};
