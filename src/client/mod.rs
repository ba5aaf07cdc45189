//! Bot API client

pub mod bot_api;

pub use bot_api::{ApiMethod, BotApiClient};
