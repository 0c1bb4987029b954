//! Session-ID invariants: alphabet, length, uniqueness.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use ticket_mcp::server::session::{SessionManager, is_valid_session_id};

#[test]
fn test_created_ids_are_32_visible_ascii_chars() {
    let manager = SessionManager::default();

    for _ in 0..500 {
        let id = manager.create(HashMap::new());
        assert_eq!(id.len(), 32);
        assert!(id.bytes().all(|b| (0x21..=0x7E).contains(&b)), "bad id: {id:?}");
    }
}

#[test]
fn test_created_ids_are_pairwise_distinct() {
    let manager = SessionManager::default();

    let ids: HashSet<String> = (0..500).map(|_| manager.create(HashMap::new())).collect();
    assert_eq!(ids.len(), 500);
}

proptest! {
    /// The validator accepts exactly the strings whose bytes all fall in
    /// 0x21..=0x7E (and rejects the empty string).
    #[test]
    fn prop_validator_matches_byte_range(s in ".*") {
        let expected = !s.is_empty() && s.bytes().all(|b| (0x21..=0x7E).contains(&b));
        prop_assert_eq!(is_valid_session_id(&s), expected);
    }

    /// Space and DEL are excluded even though they border the range.
    #[test]
    fn prop_space_and_del_are_rejected(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}") {
        let with_space = format!("{prefix} {suffix}");
        let with_del = format!("{prefix}\u{7f}{suffix}");
        prop_assert!(!is_valid_session_id(&with_space));
        prop_assert!(!is_valid_session_id(&with_del));
    }
}
