//! Core types shared by the message model, the chain handlers and storage
//!
//! Records defined here ([`AppMetadata`], [`Peer`], the permission traits) are
//! persisted through the storage collaborator only; nothing in this crate
//! mutates them beyond reading and writing whole collections.

use crate::identifier::Identifier;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blockchain identifier as carried on the wire (`"tezos"`, `"substrate"`, ...)
pub type BlockchainIdentifier = String;

/// Wire protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// Legacy Tezos-only format, senders identified by `beaconId`
    V1,
    /// Tezos-only format, senders identified by `senderId`
    V2,
    /// Chain-generic format with nested `message` content
    V3,
}

impl ProtocolVersion {
    /// Latest version spoken by this SDK
    pub const LATEST: ProtocolVersion = ProtocolVersion::V3;

    /// Resolve a wire version string (`"2"`, `"2.0.0"`, ...) by its major part
    pub fn from_version_str(version: &str) -> Result<Self> {
        let major = version.split('.').next().unwrap_or_default();
        match major {
            "1" => Ok(ProtocolVersion::V1),
            "2" => Ok(ProtocolVersion::V2),
            "3" => Ok(ProtocolVersion::V3),
            _ => Err(Error::UnsupportedVersion(version.to_string())),
        }
    }

    /// Default version string written to the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "1",
            ProtocolVersion::V2 => "2",
            ProtocolVersion::V3 => "3",
        }
    }

    /// Check whether a version string belongs to this generation
    pub fn matches(&self, version: &str) -> bool {
        Self::from_version_str(version).is_ok_and(|v| v == *self)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport a message travelled over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Relay-based peer-to-peer transport
    P2p,
}

/// Transport and peer identity a message arrived from or is destined to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub kind: ConnectionKind,
    /// Peer identity on the transport (hex public key hash for P2P)
    pub id: String,
}

impl Origin {
    /// Create a P2P origin
    pub fn p2p(id: impl Into<String>) -> Self {
        Self {
            kind: ConnectionKind::P2p,
            id: id.into(),
        }
    }

    /// Create a P2P origin from a relay identifier
    pub fn from_identifier(identifier: &Identifier) -> Self {
        Self::p2p(identifier.public_key_hash_hex())
    }
}

/// Metadata describing a dApp, as announced in its permission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    /// Sender id the app uses on the wire
    pub sender_id: String,
    /// Display name
    pub name: String,
    /// Icon URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl AppMetadata {
    /// Create app metadata
    pub fn new(sender_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            name: name.into(),
            icon: None,
        }
    }

    /// Set icon URL
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Anything that can be looked up by the sender id of its owning app
pub trait AppMetadataRecord: Serialize + DeserializeOwned + Send + Sync {
    fn sender_id(&self) -> &str;
}

impl AppMetadataRecord for AppMetadata {
    fn sender_id(&self) -> &str {
        &self.sender_id
    }
}

/// A paired peer reachable over the relay network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// Hex public key hash, equal to the [`Origin::id`] of its messages
    pub id: String,
    /// Display name
    pub name: String,
    /// Peer public key (hex)
    pub public_key: String,
    /// Relay server the peer is registered on
    pub relay_server: String,
    /// Protocol version the peer speaks
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
}

impl Peer {
    /// Create a peer record
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        public_key: impl Into<String>,
        relay_server: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            public_key: public_key.into(),
            relay_server: relay_server.into(),
            version: version.into(),
            icon: None,
            app_url: None,
        }
    }

    /// Relay identifier of this peer
    pub fn identifier(&self) -> Result<Identifier> {
        let hash = hex::decode(&self.id)?;
        Ok(Identifier::new(hash, self.relay_server.clone()))
    }

    /// Protocol generation the peer speaks
    pub fn protocol_version(&self) -> Result<ProtocolVersion> {
        ProtocolVersion::from_version_str(&self.version)
    }

    /// Check whether messages from `origin` belong to this peer
    pub fn matches_origin(&self, origin: &Origin) -> bool {
        self.id.eq_ignore_ascii_case(&origin.id)
    }
}

/// A granted permission, persisted per chain
pub trait PermissionRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Account the permission was granted for
    fn account_id(&self) -> &str;
    /// Sender id of the app holding the permission
    fn sender_id(&self) -> &str;
}

/// A permission record persisted under an older schema
pub trait LegacyPermission: Serialize + DeserializeOwned + Send + Sync {
    /// SDK version whose schema this record follows; also the storage key tag
    const FROM_VERSION: &'static str;

    /// Current schema this record migrates to
    type Current: PermissionRecord;

    /// Convert into the current schema
    fn migrate(self) -> Result<Self::Current>;
}

/// Error reported by a wallet in an error response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "ABORTED_ERROR")]
    Aborted,
    #[serde(rename = "BROADCAST_ERROR")]
    Broadcast,
    #[serde(rename = "NETWORK_NOT_SUPPORTED")]
    NetworkNotSupported,
    #[serde(rename = "NO_ADDRESS_ERROR")]
    NoAddress,
    #[serde(rename = "NO_PRIVATE_KEY_FOUND_ERROR")]
    NoPrivateKeyFound,
    #[serde(rename = "NOT_GRANTED_ERROR")]
    NotGranted,
    #[serde(rename = "PARAMETERS_INVALID_ERROR")]
    ParametersInvalid,
    #[serde(rename = "TOO_MANY_OPERATIONS")]
    TooManyOperations,
    #[serde(rename = "TRANSACTION_INVALID_ERROR")]
    TransactionInvalid,
    #[serde(rename = "SIGNATURE_TYPE_NOT_SUPPORTED")]
    SignatureTypeNotSupported,
    #[serde(rename = "UNKNOWN_ERROR")]
    Unknown,
}
