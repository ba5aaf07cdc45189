//! Gift selection seam
//!
//! Interactive and directed selection are two implementations of one
//! interface; the pipeline never knows which one is driving it.

use std::io::{self, BufRead};

use crate::core::gifts::find_gift_by_id;
use crate::core::runlog::RunLog;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::OwnedGift;

/// Picks one gift out of the current Run's enumeration. A failed selection is
/// terminal; the pipeline never re-prompts.
pub trait GiftSelector {
    fn select<'a>(&mut self, gifts: &'a [OwnedGift], log: &RunLog) -> AppResult<&'a OwnedGift>;
}

/// Selection by a caller-supplied gift identifier (web transfer requests)
pub struct DirectedSelector {
    gift_id: String,
}

impl DirectedSelector {
    pub fn new(gift_id: impl Into<String>) -> Self {
        Self {
            gift_id: gift_id.into(),
        }
    }
}

impl GiftSelector for DirectedSelector {
    fn select<'a>(&mut self, gifts: &'a [OwnedGift], log: &RunLog) -> AppResult<&'a OwnedGift> {
        log.info(&format!("🔍 Looking up gift {}...", self.gift_id));
        match find_gift_by_id(gifts, &self.gift_id) {
            Some(gift) => Ok(gift),
            None => {
                log.error(&format!("❌ Gift with ID {} not found", self.gift_id));
                Err(AppError::new(
                    ErrorCode::RunGiftNotFound,
                    format!("Gift with ID {} not found", self.gift_id),
                ))
            }
        }
    }
}

/// Selection by a 1-based index read from an input source. Non-numeric or
/// out-of-range input is terminal; there is no second prompt.
pub struct PromptSelector<R: BufRead> {
    input: R,
}

impl PromptSelector<io::StdinLock<'static>> {
    /// Interactive selection from the terminal
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl PromptSelector<io::Empty> {
    /// No input source at all. An unattended run that reaches the selection
    /// step terminates with an invalid selection, exactly like an interactive
    /// run whose stdin closed.
    pub fn unattended() -> Self {
        Self { input: io::empty() }
    }
}

impl<R: BufRead> PromptSelector<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> GiftSelector for PromptSelector<R> {
    fn select<'a>(&mut self, gifts: &'a [OwnedGift], log: &RunLog) -> AppResult<&'a OwnedGift> {
        log.info(&format!(
            "Enter the gift number to transfer (1-{}):",
            gifts.len()
        ));

        let mut line = String::new();
        let choice = match self.input.read_line(&mut line) {
            Ok(_) => line.trim().parse::<usize>(),
            Err(_) => "".parse::<usize>(),
        };

        match choice {
            Ok(index) if (1..=gifts.len()).contains(&index) => Ok(&gifts[index - 1]),
            Ok(_) => {
                let message = format!("Invalid choice. Enter a number from 1 to {}", gifts.len());
                log.error(&format!("❌ {}", message));
                Err(AppError::new(ErrorCode::RunInvalidSelection, message))
            }
            Err(_) => {
                let message = "Invalid input. Please enter a number".to_string();
                log.error(&format!("❌ {}", message));
                Err(AppError::new(ErrorCode::RunInvalidSelection, message))
            }
        }
    }
}
