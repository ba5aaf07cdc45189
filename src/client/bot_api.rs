//! Bot API Client
//!
//! Executes one logical remote operation at a time, hiding retry, backoff,
//! and rate-limit handling from callers. Callers only ever see a final
//! Ok/Err; retryable failures are resolved internally.
//!
//! Retry contract:
//! - transport failures, HTTP errors, and `ok: false` bodies sleep
//!   `retry_delay * 2^k` seconds (capped at 30) where `k` counts only these
//!   backoff-consuming failures;
//! - HTTP 429 sleeps the `Retry-After` hint (base delay when absent or
//!   unparseable, capped at 30) and consumes an attempt but not the exponent;
//! - a success body returns immediately without consuming remaining attempts;
//! - an exhausted budget returns an error summarizing the last failure.
//!
//! The bot token is part of every request URL and never appears in a log line.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::runlog::RunLog;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{decode_result, BotProfile, ChatInfo, OwnedGifts, StarBalance};
use crate::utils::constants::{
    API_BASE_URL, API_TIMEOUT_SECS, MAX_RETRY_SLEEP_SECS, USER_AGENT as USER_AGENT_CONST,
};

/// Logical operation names, mapped to remote endpoint paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    GetMe,
    GetChat,
    GetStarBalance,
    TransferStars,
    GetOwnedGifts,
    TransferGift,
}

impl ApiMethod {
    /// Remote endpoint path for this operation
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::GetMe => "getMe",
            Self::GetChat => "getChat",
            Self::GetStarBalance => "getBusinessAccountStarBalance",
            Self::TransferStars => "transferBusinessAccountStars",
            Self::GetOwnedGifts => "getBusinessAccountGifts",
            Self::TransferGift => "transferGift",
        }
    }
}

/// What kind of pause the next attempt should take
enum RetryDelay {
    /// Exponential backoff; advances the exponent
    Backoff,
    /// Server-hinted wait in seconds; does not advance the exponent
    Server(u64),
}

/// Bot API client with retry logic. No shared mutable state between calls
/// beyond the connection pool; safe to reuse across one Run's sequential
/// calls.
#[derive(Clone)]
pub struct BotApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: u32,
    retry_delay_secs: u64,
    run_log: Option<RunLog>,
    cancel: Option<CancellationToken>,
}

impl BotApiClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .gzip(true)
            .build()
            .map_err(|e| AppError::connection_failed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
            token: config.bot_token.clone(),
            max_retries: config.max_retries,
            retry_delay_secs: config.retry_delay,
            run_log: None,
            cancel: None,
        })
    }

    /// Point the client at a different base URL (local stub in tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Mirror request/response lines into a Run's log artifact
    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Make retry sleeps interruptible by a stop request
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Request URL with the token replaced, safe for display
    pub fn masked_url(&self, method: ApiMethod) -> String {
        format!("{}***/{}", self.base_url, method.endpoint())
    }

    /// Execute one logical operation with the configured retry budget
    pub async fn call(&self, method: ApiMethod, payload: Option<Value>) -> AppResult<Value> {
        self.call_with_retries(method, payload, self.max_retries).await
    }

    /// Execute one logical operation with an explicit retry budget
    pub async fn call_with_retries(
        &self,
        method: ApiMethod,
        payload: Option<Value>,
        retries: u32,
    ) -> AppResult<Value> {
        let budget = retries.max(1);
        let url = format!("{}{}/{}", self.base_url, self.token, method.endpoint());
        let endpoint = method.endpoint();

        let mut backoff_steps = 0u32;
        let mut last_error = AppError::connection_failed("No attempt was made");

        for attempt in 1..=budget {
            self.log_info(format!(
                "Sending request to {} (attempt {}/{})",
                endpoint, attempt, budget
            ));
            if let Some(body) = &payload {
                self.log_debug(format!("Payload: {}", pretty(body)));
            }

            let (error, delay) = match self.execute_call(&url, &payload).await {
                Ok(body) => return Ok(body),
                Err(outcome) => outcome,
            };

            self.log_warn(format!("Request to {} failed: {}", endpoint, error.message));
            last_error = error;

            if attempt < budget {
                let sleep_secs = match delay {
                    RetryDelay::Server(secs) => {
                        self.log_warn(format!(
                            "Rate limited, waiting {}s before retrying... (attempt {}/{})",
                            secs, attempt, budget
                        ));
                        secs
                    }
                    RetryDelay::Backoff => {
                        let secs = backoff_delay(self.retry_delay_secs, backoff_steps);
                        backoff_steps += 1;
                        self.log_warn(format!(
                            "Will retry in {}s... (attempt {}/{})",
                            secs, attempt, budget
                        ));
                        secs
                    }
                };
                self.sleep(Duration::from_secs(sleep_secs)).await?;
            }
        }

        Err(AppError::new(
            last_error.code,
            format!(
                "Request to {} failed after {} attempts: {}",
                endpoint, budget, last_error.message
            ),
        ))
    }

    /// Execute a single attempt. A failure carries the retry-delay kind the
    /// next attempt should use.
    async fn execute_call(
        &self,
        url: &str,
        payload: &Option<Value>,
    ) -> Result<Value, (AppError, RetryDelay)> {
        let request = self.http.post(url);
        let request = match payload {
            Some(body) => request.json(body),
            None => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err((AppError::from(e), RetryDelay::Backoff)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let secs = retry_after_secs(response.headers())
                .unwrap_or(self.retry_delay_secs)
                .min(MAX_RETRY_SLEEP_SECS);
            return Err((
                AppError::rate_limited("Rate limited (HTTP 429)"),
                RetryDelay::Server(secs),
            ));
        }

        // The remote answers application failures with a decodable envelope
        // even on 4xx/5xx, so the body is decoded before the status decides.
        match response.json::<Value>().await {
            Ok(body) => {
                self.log_debug(format!("Response: {}", pretty(&body)));
                if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
                    Ok(body)
                } else {
                    let description = body
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error")
                        .to_string();
                    let error_code = body.get("error_code").and_then(Value::as_i64);
                    Err((
                        AppError::api_error(description, error_code),
                        RetryDelay::Backoff,
                    ))
                }
            }
            Err(_) if !status.is_success() => Err((
                AppError::connection_failed(format!("HTTP error: {}", status)),
                RetryDelay::Backoff,
            )),
            Err(e) => Err((
                AppError::invalid_response(format!("Failed to parse response: {}", e)),
                RetryDelay::Backoff,
            )),
        }
    }

    /// Sleep that resolves early (with a terminal error) on cancellation
    async fn sleep(&self, duration: Duration) -> AppResult<()> {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(AppError::cancelled()),
                _ = tokio::time::sleep(duration) => Ok(()),
            },
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }

    // ============================================
    // Typed operation helpers
    // ============================================

    /// Identity lookup with the full retry budget
    pub async fn get_me(&self) -> AppResult<BotProfile> {
        let body = self.call(ApiMethod::GetMe, None).await?;
        decode_result(&body)
    }

    /// Identity lookup with a single attempt (connectivity probe)
    pub async fn get_me_once(&self) -> AppResult<BotProfile> {
        let body = self.call_with_retries(ApiMethod::GetMe, None, 1).await?;
        decode_result(&body)
    }

    pub async fn get_chat(&self, chat_id: i64) -> AppResult<ChatInfo> {
        let body = self
            .call(ApiMethod::GetChat, Some(json!({ "chat_id": chat_id })))
            .await?;
        decode_result(&body)
    }

    pub async fn star_balance(&self, business_connection_id: &str) -> AppResult<i64> {
        let body = self
            .call(
                ApiMethod::GetStarBalance,
                Some(json!({ "business_connection_id": business_connection_id })),
            )
            .await?;
        let balance: StarBalance = decode_result(&body)?;
        Ok(balance.amount)
    }

    pub async fn transfer_stars(
        &self,
        business_connection_id: &str,
        star_count: u32,
    ) -> AppResult<()> {
        self.call(
            ApiMethod::TransferStars,
            Some(json!({
                "business_connection_id": business_connection_id,
                "star_count": star_count,
            })),
        )
        .await?;
        Ok(())
    }

    pub async fn owned_gifts(
        &self,
        business_connection_id: &str,
        limit: u32,
    ) -> AppResult<OwnedGifts> {
        let body = self
            .call(
                ApiMethod::GetOwnedGifts,
                Some(json!({
                    "business_connection_id": business_connection_id,
                    "limit": limit,
                })),
            )
            .await?;
        decode_result(&body)
    }

    pub async fn transfer_gift(
        &self,
        business_connection_id: &str,
        owned_gift_id: &str,
        new_owner_chat_id: i64,
        transfer_star_count: u32,
    ) -> AppResult<()> {
        self.call(
            ApiMethod::TransferGift,
            Some(json!({
                "business_connection_id": business_connection_id,
                "owned_gift_id": owned_gift_id,
                "new_owner_chat_id": new_owner_chat_id,
                "transfer_star_count": transfer_star_count,
            })),
        )
        .await?;
        Ok(())
    }

    // ============================================
    // Logging helpers (run log when attached, tracing otherwise)
    // ============================================

    fn log_info(&self, message: String) {
        match &self.run_log {
            Some(log) => log.info(&message),
            None => info!("{}", message),
        }
    }

    fn log_warn(&self, message: String) {
        match &self.run_log {
            Some(log) => log.warn(&message),
            None => warn!("{}", message),
        }
    }

    fn log_debug(&self, message: String) {
        match &self.run_log {
            Some(log) => log.debug(&message),
            None => debug!("{}", message),
        }
    }
}

/// Exponential backoff delay in seconds: `base * 2^k`, capped
fn backoff_delay(base_secs: u64, backoff_steps: u32) -> u64 {
    base_secs
        .saturating_mul(2u64.saturating_pow(backoff_steps))
        .min(MAX_RETRY_SLEEP_SECS)
}

/// Seconds from a `Retry-After` header, when present and parseable
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
