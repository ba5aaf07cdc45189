//! Remote payload records
//!
//! The Bot API returns loosely structured JSON. Every operation's expected
//! payload is modeled as an explicit record with optional/defaulted fields so
//! a missing key decodes to a default instead of failing the whole call.

use serde::{Deserialize, Serialize};

use crate::models::errors::{AppError, AppResult};

/// Identity returned by `getMe`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotProfile {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    /// Business-capability flag. Absent on older API versions; absent means no.
    #[serde(default)]
    pub is_business_bot: bool,
}

impl BotProfile {
    /// Username for display, `@`-prefixed, or the numeric id when unset
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) => format!("@{}", name),
            None => self.id.to_string(),
        }
    }
}

/// Chat returned by `getChat` for the configured target
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatInfo {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Explicit `false` means the chat refuses gifts; absent means unknown.
    #[serde(default)]
    pub can_send_gift: Option<bool>,
}

/// Balance returned by `getBusinessAccountStarBalance`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StarBalance {
    #[serde(default)]
    pub amount: i64,
}

/// Page of gifts returned by `getBusinessAccountGifts`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnedGifts {
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub gifts: Vec<OwnedGift>,
}

/// A single owned gift. `owned_gift_id` is only stable within one enumeration;
/// a gift selected for transfer must come from the current Run's listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnedGift {
    #[serde(default)]
    pub owned_gift_id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub gift: GiftDetails,
    #[serde(default)]
    pub can_be_transferred: bool,
    #[serde(default)]
    pub transfer_star_count: u32,
}

/// Display names nested under each owned gift
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GiftDetails {
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl OwnedGift {
    /// Short display name, falling back to "Unknown" like the remote UI does
    pub fn base_name(&self) -> &str {
        self.gift.base_name.as_deref().unwrap_or("Unknown")
    }

    /// Full display name
    pub fn full_name(&self) -> &str {
        self.gift.name.as_deref().unwrap_or("Unknown")
    }
}

/// Decode the `result` field of a success envelope into a typed record,
/// defaulting on missing keys.
pub fn decode_result<T: for<'de> Deserialize<'de> + Default>(
    body: &serde_json::Value,
) -> AppResult<T> {
    match body.get("result") {
        Some(result) => serde_json::from_value(result.clone())
            .map_err(|e| AppError::invalid_response(format!("Unexpected result shape: {}", e))),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bot_profile_defaults() {
        let body = json!({"result": {"id": 42, "username": "courier_bot"}});
        let profile: BotProfile = decode_result(&body).unwrap();
        assert_eq!(profile.id, 42);
        assert_eq!(profile.display_name(), "@courier_bot");
        // Absent business flag decodes to false, not an error
        assert!(!profile.is_business_bot);
    }

    #[test]
    fn test_chat_info_gift_flag_tristate() {
        let refuses: ChatInfo =
            decode_result(&json!({"result": {"id": 1, "can_send_gift": false}})).unwrap();
        assert_eq!(refuses.can_send_gift, Some(false));

        let unknown: ChatInfo = decode_result(&json!({"result": {"id": 1}})).unwrap();
        assert_eq!(unknown.can_send_gift, None);
    }

    #[test]
    fn test_owned_gift_partial_decode() {
        let body = json!({"result": {"total_count": 2, "gifts": [
            {"owned_gift_id": "g1", "gift": {"base_name": "Bear"},
             "can_be_transferred": true, "transfer_star_count": 25},
            {"owned_gift_id": "g2"}
        ]}});
        let gifts: OwnedGifts = decode_result(&body).unwrap();
        assert_eq!(gifts.total_count, 2);
        assert_eq!(gifts.gifts[0].base_name(), "Bear");
        // Gift with every optional field missing still decodes
        assert_eq!(gifts.gifts[1].base_name(), "Unknown");
        assert!(!gifts.gifts[1].can_be_transferred);
        assert_eq!(gifts.gifts[1].transfer_star_count, 0);
    }

    #[test]
    fn test_missing_result_defaults() {
        let balance: StarBalance = decode_result(&json!({"ok": true})).unwrap();
        assert_eq!(balance.amount, 0);
    }
}
