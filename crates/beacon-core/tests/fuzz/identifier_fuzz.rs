//! Fuzz tests for peer identifiers
//!
//! Property-based testing of the `@<hex>:<relay>` round trip.

use beacon_core::Identifier;
use proptest::prelude::*;

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Lower-case, even-length hex public key hash
fn hash_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 1..64).prop_map(hex::encode)
}

/// Relay host, possibly containing further separators
fn relay_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9.-]{0,40}(:[0-9]{1,5})?").unwrap()
}

// ============================================================================
// Round Trip
// ============================================================================

proptest! {
    /// format(parse(s)) == s for well-formed identifiers
    #[test]
    fn identifier_round_trip(hash in hash_strategy(), relay in relay_strategy()) {
        let value = format!("@{hash}:{relay}");
        let id = Identifier::parse(&value).unwrap();

        prop_assert_eq!(id.format(), value);
        prop_assert_eq!(id.public_key_hash_hex(), hash);
        prop_assert_eq!(id.relay_server(), relay.as_str());
    }

    /// parse(format(id)) == id for constructed identifiers
    #[test]
    fn constructed_identifier_round_trip(
        bytes in prop::collection::vec(any::<u8>(), 1..64),
        relay in relay_strategy(),
    ) {
        let id = Identifier::new(bytes, relay);
        prop_assert_eq!(Identifier::parse(&id.format()).unwrap(), id);
    }

    /// Parsing never panics, and anything it accepts formats back to an accepted value
    #[test]
    fn parse_never_panics(value in ".{0,80}") {
        if let Ok(id) = Identifier::parse(&value) {
            prop_assert!(Identifier::is_valid(&id.format()));
        }
    }

    /// Values without the marker are always rejected
    #[test]
    fn missing_marker_rejected(hash in hash_strategy(), relay in relay_strategy()) {
        let value = format!("{hash}:{relay}");
        prop_assert!(Identifier::parse(&value).is_err());
    }
}
