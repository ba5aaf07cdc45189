//! Transfer Pipeline
//!
//! A fixed, ordered sequence of steps, each gated on the success of the ones
//! before it. The first unrecoverable failure terminates the Run with a
//! reason; only the redundant star transfer is allowed to fail softly. No
//! step is ever re-entered, and the orchestrator itself never retries an API
//! call; retries live entirely inside [`BotApiClient`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::BotApiClient;
use crate::config::AppConfig;
use crate::core::gifts::validate_gift_for_transfer;
use crate::core::runlog::RunLog;
use crate::core::selector::GiftSelector;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{BotProfile, OwnedGift};
use crate::utils::constants::{GIFT_PAGE_LIMIT, WAIT_CHUNK_SECS};

/// One Run of the transfer sequence. Configuration is captured immutably at
/// construction; a Run never observes config changes made after it started.
pub struct TransferPipeline {
    config: Arc<AppConfig>,
    client: BotApiClient,
    log: RunLog,
    cancel: CancellationToken,
}

impl TransferPipeline {
    pub fn new(
        config: Arc<AppConfig>,
        log: RunLog,
        cancel: CancellationToken,
    ) -> AppResult<Self> {
        let client = BotApiClient::new(&config)?
            .with_run_log(log.clone())
            .with_cancel(cancel.clone());
        Ok(Self::from_parts(config, client, log, cancel))
    }

    /// Assemble from an existing client (tests point it at a stub server)
    pub fn from_parts(
        config: Arc<AppConfig>,
        client: BotApiClient,
        log: RunLog,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            client: client.with_run_log(log.clone()).with_cancel(cancel.clone()),
            log,
            cancel,
        }
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Execute the full pipeline. The selector decides which enumerated gift
    /// gets transferred (interactive prompt or caller-supplied id).
    pub async fn run<S>(&self, selector: &mut S) -> AppResult<()>
    where
        S: GiftSelector + ?Sized,
    {
        self.log_header();

        let result = self.execute(selector).await;
        match &result {
            Ok(()) => self.log.info("🏁 Transfer pipeline completed"),
            Err(e) if e.code == ErrorCode::RunCancelled => {
                self.log.warn("🛑 Run terminated by user")
            }
            Err(e) => self.log.error(&format!("❌ Terminating: {}", e.message)),
        }
        result
    }

    /// Read-only variant: validates connectivity and the business connection,
    /// then returns the raw gift list. Never moves stars or gifts.
    pub async fn list_gifts(&self) -> AppResult<Vec<OwnedGift>> {
        self.check_connectivity().await?;
        self.validate_business_connection().await?;
        self.enumerate_gifts().await
    }

    async fn execute<S>(&self, selector: &mut S) -> AppResult<()>
    where
        S: GiftSelector + ?Sized,
    {
        // Step 1: connectivity
        self.check_connectivity().await?;

        // Step 2: business connection is real
        self.checkpoint()?;
        self.validate_business_connection().await?;

        // Step 3: bot identity and business capability
        self.checkpoint()?;
        let profile = self.fetch_bot_profile().await?;
        self.enforce_business_capability(&profile)?;

        // Step 4: target chat exists and (probably) accepts gifts
        self.checkpoint()?;
        self.validate_target_chat().await?;

        // Step 5: enough balance for what we are about to spend
        self.checkpoint()?;
        self.check_balance().await?;

        // Steps 6-7: move stars into the bot pool
        self.checkpoint()?;
        self.transfer_stars().await?;

        // Step 8: let the transfer settle
        self.wait_for_settlement().await?;

        // Step 9: enumerate what the account owns
        self.checkpoint()?;
        let gifts = self.enumerate_gifts().await?;

        // Steps 10-11: pick a gift and check it is actually sendable
        self.log_gift_listing(&gifts);
        let gift = selector.select(&gifts, &self.log)?;
        self.validate_selection(gift)?;

        // Step 12: the transfer itself
        self.checkpoint()?;
        self.transfer_gift(gift).await
    }

    /// Terminal error once a stop has been requested. Called between steps;
    /// sleeps observe the token directly.
    fn checkpoint(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::cancelled())
        } else {
            Ok(())
        }
    }

    fn log_header(&self) {
        self.log.info("=== Gift Courier ===");
        self.log
            .info(&format!("Log file: {}", self.log.path().display()));
        self.log
            .info(&format!("Bot token: {}", self.config.masked_token()));
        self.log
            .info(&format!("Target chat ID: {}", self.config.target_chat_id));
        self.log.info(&format!(
            "Business connection ID: {}",
            self.config.business_connection_id
        ));
        self.log
            .info(&format!("Star count: {}", self.config.star_count));
        self.log.info(&format!(
            "Wait time after transfer: {} seconds",
            self.config.transfer_wait_time
        ));
        self.log.info(&"=".repeat(50));
    }

    async fn check_connectivity(&self) -> AppResult<()> {
        self.log.info("🔄 Checking API connectivity...");
        match self.client.get_me_once().await {
            Ok(_) => {
                self.log.info("✅ API connection successful");
                Ok(())
            }
            Err(e) => {
                self.log
                    .error(&format!("❌ API connection failed: {}", e.message));
                Err(AppError::step_failed("Could not connect to the Bot API"))
            }
        }
    }

    async fn validate_business_connection(&self) -> AppResult<()> {
        self.log.info("🔄 Validating business connection ID...");
        // A balance read is a pure probe; it reserves and spends nothing.
        match self
            .client
            .star_balance(&self.config.business_connection_id)
            .await
        {
            Ok(_) => {
                self.log
                    .info("✅ Business connection ID validated successfully");
                Ok(())
            }
            Err(e) => {
                self.log
                    .error(&format!("❌ Invalid business connection ID: {}", e.message));
                self.log.error(
                    "Please verify the BUSINESS_CONNECTION_ID in your business account settings.",
                );
                Err(AppError::step_failed("Invalid business connection ID"))
            }
        }
    }

    async fn fetch_bot_profile(&self) -> AppResult<BotProfile> {
        self.log.info("🔄 Getting bot information...");
        match self.client.get_me().await {
            Ok(profile) => {
                self.log.info("✅ Bot information retrieved successfully");
                self.log
                    .info(&format!("   Username: {}", profile.display_name()));
                self.log.info(&format!("   ID: {}", profile.id));
                self.log
                    .info(&format!("   Is business bot: {}", profile.is_business_bot));
                Ok(profile)
            }
            Err(e) => {
                self.log
                    .error(&format!("❌ Failed to get bot info: {}", e.message));
                Err(AppError::step_failed("Could not retrieve bot information"))
            }
        }
    }

    fn enforce_business_capability(&self, profile: &BotProfile) -> AppResult<()> {
        if profile.is_business_bot {
            return Ok(());
        }

        if self.config.bypass_business_check {
            self.log
                .warn("⚠️ WARNING: Bot is not a business bot, but the check is bypassed.");
            self.log.warn("Some functionality may not work as expected!");
            return Ok(());
        }

        self.log.error("❌ Bot is not a business bot.");
        self.log
            .error("Gift and star transfer functionality requires a business bot.");
        self.log.error("To resolve this:");
        self.log.error(&format!(
            "1. Check whether {} can be upgraded to a business bot.",
            profile.display_name()
        ));
        self.log
            .error("2. Alternatively, create a new bot with business features enabled.");
        self.log
            .error("3. Update BOT_TOKEN in the configuration with the new token.");
        self.log
            .warn("To bypass this check for testing, set BYPASS_BUSINESS_CHECK to true.");
        Err(AppError::new(
            ErrorCode::RunNotBusinessBot,
            "Bot is not a business bot",
        ))
    }

    async fn validate_target_chat(&self) -> AppResult<()> {
        let chat_id = self.config.target_chat_id;
        self.log
            .info(&format!("🔄 Validating target chat (ID: {})...", chat_id));
        match self.client.get_chat(chat_id).await {
            Ok(chat) => {
                self.log.info("✅ Target chat validated successfully");
                if let Some(kind) = &chat.kind {
                    self.log.info(&format!("   Type: {}", kind));
                }
                if let Some(username) = &chat.username {
                    self.log.info(&format!("   Username: @{}", username));
                }
                if let Some(title) = &chat.title {
                    self.log.info(&format!("   Title: {}", title));
                }
                if let Some(first_name) = &chat.first_name {
                    let last_name = chat.last_name.as_deref().unwrap_or("");
                    self.log
                        .info(&format!("   Name: {} {}", first_name, last_name));
                }
                // Explicit refusal is a warning, not a termination; the final
                // transfer call is the authority on whether gifts land.
                if chat.can_send_gift == Some(false) {
                    self.log.warn("⚠️ This chat may not accept gifts!");
                }
                Ok(())
            }
            Err(e) => {
                self.log
                    .error(&format!("❌ Failed to validate chat: {}", e.message));
                Err(AppError::step_failed("Invalid target chat ID"))
            }
        }
    }

    async fn check_balance(&self) -> AppResult<()> {
        self.log.info("🔄 Checking business account star balance...");
        let balance = match self
            .client
            .star_balance(&self.config.business_connection_id)
            .await
        {
            Ok(balance) => balance,
            Err(e) => {
                self.log.error(&format!(
                    "❌ Failed to get business star balance: {}",
                    e.message
                ));
                Err(AppError::step_failed(
                    "Could not read business account star balance",
                ))?
            }
        };

        self.log
            .info(&format!("✅ Business account star balance: {}", balance));

        let required = self.config.required_balance();
        if balance < required {
            self.log.error(&format!(
                "❌ Not enough stars in business account (need at least {}, have {})",
                required, balance
            ));
            return Err(AppError::new(
                ErrorCode::RunInsufficientBalance,
                "Not enough stars in business account",
            ));
        }
        Ok(())
    }

    async fn transfer_stars(&self) -> AppResult<()> {
        self.log
            .warn("⚠️ NOTE: The API does not expose the bot's own star balance");
        self.log
            .warn("   A failed gift transfer later is the only signal the pool is short");

        let star_count = self.config.star_count;
        self.log
            .info(&format!("🔄 Transferring {} stars to bot...", star_count));
        match self
            .client
            .transfer_stars(&self.config.business_connection_id, star_count)
            .await
        {
            Ok(()) => self.log.info(&format!(
                "✅ Successfully transferred {} stars to bot",
                star_count
            )),
            Err(e) => {
                self.log
                    .error(&format!("❌ Failed to transfer stars: {}", e.message));
                return Err(AppError::step_failed("Failed to transfer stars to bot"));
            }
        }

        if self.config.enable_redundant_transfer {
            self.checkpoint()?;
            self.log
                .info("🔄 Attempting additional star transfer for reliability...");
            match self
                .client
                .transfer_stars(&self.config.business_connection_id, star_count)
                .await
            {
                Ok(()) => self.log.info(&format!(
                    "✅ Successfully transferred {} stars to bot",
                    star_count
                )),
                // The primary transfer already succeeded; a failed top-up
                // must not kill the Run.
                Err(e) => self.log.warn(&format!(
                    "⚠️ Warning: Additional star transfer failed: {}",
                    e.message
                )),
            }
        }

        Ok(())
    }

    async fn wait_for_settlement(&self) -> AppResult<()> {
        let total = self.config.transfer_wait_time;
        if total == 0 {
            return Ok(());
        }

        self.log.info(&format!(
            "⏳ Waiting {} seconds for star transfer to process...",
            total
        ));

        let mut remaining = total;
        while remaining > 0 {
            let chunk = remaining.min(WAIT_CHUNK_SECS);
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(AppError::cancelled()),
                _ = tokio::time::sleep(Duration::from_secs(chunk)) => {}
            }
            remaining -= chunk;
            if remaining > 0 {
                self.log.info(&format!("⏳ {} seconds remaining...", remaining));
            }
        }
        Ok(())
    }

    async fn enumerate_gifts(&self) -> AppResult<Vec<OwnedGift>> {
        self.log.info("🔄 Retrieving owned gifts...");
        match self
            .client
            .owned_gifts(&self.config.business_connection_id, GIFT_PAGE_LIMIT)
            .await
        {
            Ok(owned) => {
                self.log
                    .info(&format!("✅ Found {} gifts", owned.total_count));
                if owned.gifts.is_empty() {
                    self.log.error("❌ No gifts found to transfer");
                    return Err(AppError::step_failed("No gifts found to transfer"));
                }
                Ok(owned.gifts)
            }
            Err(e) => {
                self.log
                    .error(&format!("❌ Failed to get gifts: {}", e.message));
                Err(AppError::step_failed("No gifts found to transfer"))
            }
        }
    }

    fn log_gift_listing(&self, gifts: &[OwnedGift]) {
        self.log.info("Available gifts:");
        for (index, gift) in gifts.iter().enumerate() {
            self.log.info(&format!("🎁 Gift {}:", index + 1));
            self.log.info(&format!("ID: {}", gift.owned_gift_id));
            self.log.info(&format!(
                "Name: {} ({})",
                gift.base_name(),
                gift.full_name()
            ));
            self.log.info(&format!(
                "Type: {}",
                gift.kind.as_deref().unwrap_or("Unknown")
            ));
            self.log.info(&format!(
                "Can be transferred: {}",
                if gift.can_be_transferred { "Yes" } else { "No" }
            ));
            self.log
                .info(&format!("Transfer cost: {} stars", gift.transfer_star_count));
            self.log.info(&"-".repeat(30));
        }
    }

    fn validate_selection(&self, gift: &OwnedGift) -> AppResult<()> {
        self.log.info(&format!(
            "Selected gift: {} (ID: {})",
            gift.base_name(),
            gift.owned_gift_id
        ));

        let (valid, reason) = validate_gift_for_transfer(gift, self.config.star_count);
        if valid {
            return Ok(());
        }

        self.log.error(&format!("❌ {}", reason));
        let code = if gift.can_be_transferred {
            ErrorCode::RunGiftTooExpensive
        } else {
            ErrorCode::RunGiftNotTransferable
        };
        Err(AppError::new(code, reason))
    }

    async fn transfer_gift(&self, gift: &OwnedGift) -> AppResult<()> {
        let chat_id = self.config.target_chat_id;
        self.log.info(&format!(
            "🔄 Attempting to transfer gift {} to user {}...",
            gift.owned_gift_id, chat_id
        ));

        match self
            .client
            .transfer_gift(
                &self.config.business_connection_id,
                &gift.owned_gift_id,
                chat_id,
                gift.transfer_star_count,
            )
            .await
        {
            Ok(()) => {
                self.log.info(&format!(
                    "✅ Gift {} successfully transferred to user {}",
                    gift.owned_gift_id, chat_id
                ));
                Ok(())
            }
            Err(e) => {
                self.log
                    .error(&format!("❌ Error transferring gift: {}", e.message));
                self.diagnose_transfer_failure(&e.message).await;
                Err(AppError::step_failed(format!(
                    "Gift transfer failed: {}",
                    e.message
                )))
            }
        }
    }

    /// Map the remote failure description to an actionable explanation. The
    /// terminal outcome is failure either way; this only improves the log.
    async fn diagnose_transfer_failure(&self, description: &str) {
        if description.contains("PAYMENT_REQUIRED") {
            self.analyze_payment_error().await;
        } else if description.contains("CHAT_NOT_FOUND") {
            self.log
                .error("❌ The target chat ID is invalid or inaccessible.");
            self.log.error(
                "Please verify TARGET_CHAT_ID is correct and the user has interacted with the bot.",
            );
        } else if description.contains("Forbidden") {
            self.log
                .error("❌ The bot does not have permission to perform this action.");
            self.log.error(
                "Ensure the bot has the necessary permissions and the user has not blocked it.",
            );
        } else if description.contains("Bad Request") {
            self.log.error("❌ Invalid parameters in the transfer request.");
            self.log.error(
                "Check owned_gift_id, transfer_star_count, and business_connection_id.",
            );
        }
    }

    async fn analyze_payment_error(&self) {
        self.log.warn("🔍 Analyzing PAYMENT_REQUIRED error...");
        self.log
            .warn("This error occurs when the bot does not have enough stars in its own pool.");
        self.log.warn("Possible causes:");
        self.log
            .warn("1. The bot is not a business bot (most likely cause)");
        self.log
            .warn("2. Stars cannot be transferred from this business account to a regular bot");
        self.log.warn("3. The remote API has internal limitations");

        let balance = self
            .client
            .star_balance(&self.config.business_connection_id)
            .await
            .unwrap_or(0);

        self.log.info("📊 Current star balance:");
        self.log
            .info(&format!("Business account stars: {}", balance));
        self.log.info(&format!(
            "Required for transfer: {}",
            self.config.star_count
        ));

        self.log.warn("Recommended solutions:");
        self.log.warn("1. Upgrade the bot to a business bot");
        self.log
            .warn("2. Create a new bot with the business type enabled");
        self.log.warn("3. Check the Bot API documentation");
        self.log
            .warn("4. Contact platform support if the problem persists");
    }
}
