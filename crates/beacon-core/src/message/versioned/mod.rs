//! Versioned wire messages
//!
//! Three generations of the wire format coexist:
//!
//! | Version | Sender field | Chains          | Layout                          |
//! |---------|--------------|-----------------|---------------------------------|
//! | V1      | `beaconId`   | Tezos           | flat, no acknowledge            |
//! | V2      | `senderId`   | Tezos           | flat                            |
//! | V3      | `senderId`   | any registered  | content nested under `message`  |
//!
//! Decoding reads the `version` field first, then the `type` discriminator,
//! and only then decodes the body, so an unknown discriminator is reported as
//! such rather than as a shape mismatch.

pub mod v1;
pub mod v2;
pub mod v3;

use super::BeaconMessage;
use crate::chain::ChainRegistry;
use crate::storage::StorageManager;
use crate::types::{AppMetadata, Origin, ProtocolVersion};
use crate::{Error, Result};
use serde_json::Value;
use tracing::debug;

pub use v1::V1Message;
pub use v2::V2Message;
pub use v3::V3Message;

/// A wire message of any supported protocol version
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedMessage {
    V1(V1Message),
    V2(V2Message),
    V3(V3Message),
}

impl VersionedMessage {
    /// Decode a raw wire message.
    ///
    /// The protocol version is read from the message's `version` field and
    /// falls back to `version_hint` when the field is missing.
    pub fn decode(raw: &str, version_hint: Option<&str>) -> Result<Self> {
        let mut value: Value =
            serde_json::from_str(raw).map_err(|e| Error::MalformedPayload(e.to_string()))?;

        let object = value
            .as_object_mut()
            .ok_or_else(|| Error::MalformedPayload("message is not a JSON object".to_string()))?;

        let version = match object.get("version").and_then(Value::as_str) {
            Some(version) => version.to_string(),
            None => {
                let hint = version_hint.ok_or_else(|| {
                    Error::MalformedPayload("missing 'version' and no version hint".to_string())
                })?;
                object.insert("version".to_string(), Value::String(hint.to_string()));
                hint.to_string()
            }
        };

        let message = match ProtocolVersion::from_version_str(&version)? {
            ProtocolVersion::V1 => VersionedMessage::V1(V1Message::from_value(value)?),
            ProtocolVersion::V2 => VersionedMessage::V2(V2Message::from_value(value)?),
            ProtocolVersion::V3 => VersionedMessage::V3(V3Message::from_value(value)?),
        };

        debug!(
            version = %version,
            message_type = message.message_type(),
            "Decoded wire message"
        );

        Ok(message)
    }

    /// Encode a canonical message for a peer speaking `version`.
    ///
    /// The message keeps its own version string when it already belongs to
    /// the target generation; otherwise the generation's default is written.
    pub fn from_canonical(
        message: &BeaconMessage,
        version: ProtocolVersion,
        sender_id: &str,
        registry: &ChainRegistry,
    ) -> Result<Self> {
        let wire_version = if version.matches(message.version()) {
            message.version().to_string()
        } else {
            version.as_str().to_string()
        };

        match version {
            ProtocolVersion::V1 => {
                V1Message::from_canonical(message, wire_version, sender_id).map(Self::V1)
            }
            ProtocolVersion::V2 => {
                V2Message::from_canonical(message, wire_version, sender_id).map(Self::V2)
            }
            ProtocolVersion::V3 => {
                V3Message::from_canonical(message, wire_version, sender_id, registry).map(Self::V3)
            }
        }
    }

    /// Convert into the canonical model.
    ///
    /// Requests are enriched with app metadata found in storage for their
    /// sender. Responses are only accepted from a stored peer whose id equals
    /// `origin.id`.
    pub async fn to_canonical(
        &self,
        origin: Origin,
        storage: &StorageManager,
        registry: &ChainRegistry,
    ) -> Result<BeaconMessage> {
        match self {
            VersionedMessage::V1(message) => message.to_canonical(origin, storage).await,
            VersionedMessage::V2(message) => message.to_canonical(origin, storage).await,
            VersionedMessage::V3(message) => {
                message.to_canonical(origin, storage, registry).await
            }
        }
    }

    /// Check if this is a disconnect or sign-payload response sent by `app`
    pub fn comes_from(&self, app: &AppMetadata) -> bool {
        match self {
            VersionedMessage::V1(message) => message.comes_from(app),
            VersionedMessage::V2(message) => message.comes_from(app),
            VersionedMessage::V3(message) => message.comes_from(app),
        }
    }

    /// Wire `type` discriminator
    pub fn message_type(&self) -> &str {
        match self {
            VersionedMessage::V1(message) => message.message_type(),
            VersionedMessage::V2(message) => message.message_type(),
            VersionedMessage::V3(message) => message.message_type(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VersionedMessage::V1(message) => &message.id,
            VersionedMessage::V2(message) => &message.id,
            VersionedMessage::V3(message) => &message.id,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            VersionedMessage::V1(message) => &message.version,
            VersionedMessage::V2(message) => &message.version,
            VersionedMessage::V3(message) => &message.version,
        }
    }

    /// `beaconId` for V1, `senderId` otherwise
    pub fn sender_id(&self) -> &str {
        match self {
            VersionedMessage::V1(message) => &message.beacon_id,
            VersionedMessage::V2(message) => &message.sender_id,
            VersionedMessage::V3(message) => &message.sender_id,
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        match self {
            VersionedMessage::V1(_) => ProtocolVersion::V1,
            VersionedMessage::V2(_) => ProtocolVersion::V2,
            VersionedMessage::V3(_) => ProtocolVersion::V3,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            VersionedMessage::V1(message) => serde_json::to_value(message)?,
            VersionedMessage::V2(message) => serde_json::to_value(message)?,
            VersionedMessage::V3(message) => serde_json::to_value(message)?,
        };
        Ok(value)
    }

    /// Serialize with the exact wire field names
    pub fn to_json(&self) -> Result<String> {
        let json = match self {
            VersionedMessage::V1(message) => serde_json::to_string(message)?,
            VersionedMessage::V2(message) => serde_json::to_string(message)?,
            VersionedMessage::V3(message) => serde_json::to_string(message)?,
        };
        Ok(json)
    }
}

// ============================================================================
// Helpers shared by the version modules
// ============================================================================

/// Read the `type` discriminator of a flat message
pub(crate) fn read_message_type(value: &Value) -> Result<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedPayload("missing 'type' discriminator".to_string()))
}

/// Reject discriminators not in `known`
pub(crate) fn check_known_type(version: ProtocolVersion, message_type: &str, known: &[&str]) -> Result<()> {
    if known.contains(&message_type) {
        Ok(())
    } else {
        Err(Error::unknown_type(version.as_str(), message_type))
    }
}

pub(crate) fn decode_wire<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::MalformedPayload(e.to_string()))
}

/// App metadata stored for a sender; absence is not an error
pub(crate) async fn find_app_metadata(
    storage: &StorageManager,
    sender_id: &str,
) -> Result<Option<AppMetadata>> {
    storage
        .find_app_metadata(|metadata: &AppMetadata| metadata.sender_id == sender_id)
        .await
}

/// Ensure a response arrives from a paired peer
pub(crate) async fn require_peer(storage: &StorageManager, origin: &Origin) -> Result<()> {
    match storage.find_peer(|peer| peer.matches_origin(origin)).await? {
        Some(_) => Ok(()),
        None => Err(Error::OriginMismatch(format!(
            "no paired peer with id {}",
            origin.id
        ))),
    }
}
