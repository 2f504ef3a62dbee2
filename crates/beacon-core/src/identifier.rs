//! Peer addressing
//!
//! A peer on the relay network is addressed by the hash of its public key and
//! the relay server it is registered on:
//!
//! ```text
//! @<hex(public key hash)>:<relay host>
//! ```
//!
//! The same text form is used as the relay user id, so identifiers parsed from
//! relay events can be mapped back to a peer without any extra lookup.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Marker that starts every identifier
pub const IDENTIFIER_PREFIX: char = '@';

/// Separator between the public key hash and the relay server
pub const IDENTIFIER_SEPARATOR: char = ':';

/// Portable peer address: public key hash plus relay location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    public_key_hash: Vec<u8>,
    relay_server: String,
}

impl Identifier {
    /// Create an identifier from raw hash bytes and a relay host
    pub fn new(public_key_hash: impl Into<Vec<u8>>, relay_server: impl Into<String>) -> Self {
        Self {
            public_key_hash: public_key_hash.into(),
            relay_server: relay_server.into(),
        }
    }

    /// Parse an identifier from its text form.
    ///
    /// The value is split on the first separator only, so everything after it
    /// belongs to the relay server. Both halves must be non-empty and the hash
    /// half must be valid hex once the marker is stripped.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidValue(value.to_string());

        let rest = value.strip_prefix(IDENTIFIER_PREFIX).ok_or_else(invalid)?;
        let (hash, relay_server) = rest.split_once(IDENTIFIER_SEPARATOR).ok_or_else(invalid)?;

        if hash.is_empty() || relay_server.is_empty() {
            return Err(invalid());
        }

        let public_key_hash = hex::decode(hash).map_err(|_| invalid())?;

        Ok(Self {
            public_key_hash,
            relay_server: relay_server.to_string(),
        })
    }

    /// Check whether a value would be accepted by [`Identifier::parse`]
    pub fn is_valid(value: &str) -> bool {
        Self::parse(value).is_ok()
    }

    /// Format as `@<hex>:<relay>`
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Raw public key hash
    pub fn public_key_hash(&self) -> &[u8] {
        &self.public_key_hash
    }

    /// Public key hash as lower-case hex
    pub fn public_key_hash_hex(&self) -> String {
        hex::encode(&self.public_key_hash)
    }

    /// Relay server host
    pub fn relay_server(&self) -> &str {
        &self.relay_server
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            IDENTIFIER_PREFIX,
            self.public_key_hash_hex(),
            IDENTIFIER_SEPARATOR,
            self.relay_server
        )
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
