//! Plan identifiers and lexical predicates
//!
//! A plan id is `aps-` followed by 8 lowercase hex characters; a plan hash is
//! exactly 64 lowercase hex characters.

/// Prefix shared by every plan id
pub const PLAN_ID_PREFIX: &str = "aps-";

/// Lexical pattern of a plan id
pub const PLAN_ID_PATTERN: &str = r"^aps-[a-f0-9]{8}$";

/// Lexical pattern of a plan hash
pub const HASH_PATTERN: &str = r"^[a-f0-9]{64}$";

const PLAN_ID_HEX_LEN: usize = 8;
const HASH_HEX_LEN: usize = 64;

/// Generate a fresh plan id from 32 random bits
#[must_use]
pub fn generate_plan_id() -> String {
    format!("{PLAN_ID_PREFIX}{:08x}", rand::random::<u32>())
}

/// Check a string against the plan id pattern
#[must_use]
pub fn is_valid_plan_id(id: &str) -> bool {
    id.strip_prefix(PLAN_ID_PREFIX)
        .is_some_and(|rest| is_lower_hex(rest, PLAN_ID_HEX_LEN))
}

/// Check a string against the plan hash pattern
#[must_use]
pub fn is_valid_hash(hash: &str) -> bool {
    is_lower_hex(hash, HASH_HEX_LEN)
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_well_formed_plan_id() {
        assert!(is_valid_plan_id("aps-12345678"));
        assert!(is_valid_plan_id("aps-a1b2c3d4"));
    }

    #[test]
    fn rejects_malformed_plan_ids() {
        assert!(!is_valid_plan_id("aps-ABCDEF00"));
        assert!(!is_valid_plan_id("aps-1234567"));
        assert!(!is_valid_plan_id("aps-123456789"));
        assert!(!is_valid_plan_id("APS-12345678"));
        assert!(!is_valid_plan_id("plan-12345678"));
        assert!(!is_valid_plan_id("aps-1234567g"));
        assert!(!is_valid_plan_id(""));
    }

    #[test]
    fn generated_ids_are_valid() {
        for _ in 0..64 {
            assert!(is_valid_plan_id(&generate_plan_id()));
        }
    }

    #[test]
    fn hash_predicate_checks_length_and_case() {
        assert!(is_valid_hash(&"a".repeat(64)));
        assert!(is_valid_hash(&"0123456789abcdef".repeat(4)));
        assert!(!is_valid_hash(&"a".repeat(63)));
        assert!(!is_valid_hash(&"a".repeat(65)));
        assert!(!is_valid_hash(&"A".repeat(64)));
        assert!(!is_valid_hash(&"g".repeat(64)));
    }

    proptest! {
        #[test]
        fn plan_id_predicate_matches_pattern(s in "aps-[0-9a-fA-F]{6,10}") {
            let expected = s.len() == 12 && !s[4..].chars().any(|c| c.is_ascii_uppercase());
            prop_assert_eq!(is_valid_plan_id(&s), expected);
        }

        #[test]
        fn hash_predicate_accepts_any_lower_hex_of_length_64(s in "[0-9a-f]{64}") {
            prop_assert!(is_valid_hash(&s));
        }

        #[test]
        fn hash_predicate_rejects_other_lengths(s in "[0-9a-f]{0,63}|[0-9a-f]{65,80}") {
            prop_assert!(!is_valid_hash(&s));
        }
    }
}
