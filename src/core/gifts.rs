//! Gift selection and eligibility rules

use crate::models::types::OwnedGift;

/// Find the gift with an exactly matching identifier. Identifiers are only
/// stable within one enumeration, so callers must pass the current Run's
/// list.
pub fn find_gift_by_id<'a>(gifts: &'a [OwnedGift], gift_id: &str) -> Option<&'a OwnedGift> {
    gifts.iter().find(|gift| gift.owned_gift_id == gift_id)
}

/// Check whether a gift can actually be sent with the stars that were
/// transferred. Returns `(is_valid, reason)`; the reason is empty when valid.
///
/// A non-transferable gift is rejected before cost is even looked at.
pub fn validate_gift_for_transfer(gift: &OwnedGift, transferred_stars: u32) -> (bool, String) {
    if !gift.can_be_transferred {
        return (false, "This gift cannot be transferred".to_string());
    }
    if gift.transfer_star_count > transferred_stars {
        return (
            false,
            format!(
                "Gift requires {} stars, but only {} were transferred",
                gift.transfer_star_count, transferred_stars
            ),
        );
    }
    (true, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift(id: &str, can_transfer: bool, cost: u32) -> OwnedGift {
        OwnedGift {
            owned_gift_id: id.to_string(),
            can_be_transferred: can_transfer,
            transfer_star_count: cost,
            ..OwnedGift::default()
        }
    }

    #[test]
    fn test_find_gift_by_id_exists() {
        let gifts = vec![gift("g1", true, 10), gift("g2", true, 20), gift("g3", true, 30)];
        let found = find_gift_by_id(&gifts, "g2").unwrap();
        assert_eq!(found.owned_gift_id, "g2");
        assert_eq!(found.transfer_star_count, 20);
    }

    #[test]
    fn test_find_gift_by_id_not_exists() {
        let gifts = vec![gift("g1", true, 10), gift("g2", true, 20)];
        assert!(find_gift_by_id(&gifts, "g3").is_none());
    }

    #[test]
    fn test_find_gift_by_id_idempotent() {
        let gifts = vec![gift("g1", true, 10), gift("g2", false, 20)];
        let first = find_gift_by_id(&gifts, "g2").map(|g| g.owned_gift_id.clone());
        let second = find_gift_by_id(&gifts, "g2").map(|g| g.owned_gift_id.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_valid_gift() {
        let (valid, reason) = validate_gift_for_transfer(&gift("g", true, 20), 25);
        assert!(valid);
        assert_eq!(reason, "");
    }

    #[test]
    fn test_validate_cost_equal_to_transferred_is_valid() {
        let (valid, reason) = validate_gift_for_transfer(&gift("g", true, 25), 25);
        assert!(valid);
        assert_eq!(reason, "");
    }

    #[test]
    fn test_validate_non_transferable() {
        let (valid, reason) = validate_gift_for_transfer(&gift("g", false, 10), 25);
        assert!(!valid);
        assert!(reason.contains("cannot be transferred"));
    }

    #[test]
    fn test_validate_non_transferable_beats_cost() {
        // Transferability is checked first regardless of cost
        let (valid, reason) = validate_gift_for_transfer(&gift("g", false, 999), 25);
        assert!(!valid);
        assert!(reason.contains("cannot be transferred"));
        assert!(!reason.contains("999"));
    }

    #[test]
    fn test_validate_insufficient_stars_names_exact_cost() {
        let (valid, reason) = validate_gift_for_transfer(&gift("g", true, 30), 25);
        assert!(!valid);
        assert!(reason.contains("requires 30 stars"));
        assert!(reason.contains("only 25 were transferred"));
    }
}
