//! V3 wire format: chain-generic envelope
//!
//! ```json
//! {
//!   "id": "...", "version": "3", "senderId": "...",
//!   "message": {
//!     "type": "blockchain_request",
//!     "blockchainIdentifier": "substrate",
//!     "accountId": "...",
//!     "blockchainData": { "type": "transfer_request", ... }
//!   }
//! }
//! ```
//!
//! `blockchainData` stays raw JSON here and is decoded by the chain handler
//! registered for `blockchainIdentifier` during canonicalization.

use super::{check_known_type, decode_wire, find_app_metadata, require_peer};
use crate::chain::ChainRegistry;
use crate::message::{
    AcknowledgeResponse, BeaconMessage, BeaconRequest, BeaconResponse, BlockchainRequest,
    BlockchainResponse, DisconnectMessage, ErrorResponse, PermissionRequest, PermissionResponse,
};
use crate::storage::StorageManager;
use crate::types::{AppMetadata, ErrorType, Origin, ProtocolVersion};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SIGN_PAYLOAD_RESPONSE: &str = "sign_payload_response";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Message {
    pub id: String,
    pub version: String,
    pub sender_id: String,
    pub message: V3Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum V3Content {
    #[serde(rename_all = "camelCase")]
    PermissionRequest {
        blockchain_identifier: String,
        blockchain_data: Value,
    },
    #[serde(rename_all = "camelCase")]
    BlockchainRequest {
        blockchain_identifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account_id: Option<String>,
        blockchain_data: Value,
    },
    #[serde(rename_all = "camelCase")]
    PermissionResponse {
        blockchain_identifier: String,
        blockchain_data: Value,
    },
    #[serde(rename_all = "camelCase")]
    BlockchainResponse {
        blockchain_identifier: String,
        blockchain_data: Value,
    },
    Acknowledge,
    #[serde(rename_all = "camelCase")]
    Error {
        error_type: ErrorType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Disconnect,
}

impl V3Content {
    pub const TYPES: [&'static str; 7] = [
        "permission_request",
        "blockchain_request",
        "permission_response",
        "blockchain_response",
        "acknowledge",
        "error",
        "disconnect",
    ];

    pub fn message_type(&self) -> &'static str {
        match self {
            V3Content::PermissionRequest { .. } => "permission_request",
            V3Content::BlockchainRequest { .. } => "blockchain_request",
            V3Content::PermissionResponse { .. } => "permission_response",
            V3Content::BlockchainResponse { .. } => "blockchain_response",
            V3Content::Acknowledge => "acknowledge",
            V3Content::Error { .. } => "error",
            V3Content::Disconnect => "disconnect",
        }
    }

    /// Chain the content belongs to, if any
    pub fn blockchain_identifier(&self) -> Option<&str> {
        match self {
            V3Content::PermissionRequest {
                blockchain_identifier,
                ..
            }
            | V3Content::BlockchainRequest {
                blockchain_identifier,
                ..
            }
            | V3Content::PermissionResponse {
                blockchain_identifier,
                ..
            }
            | V3Content::BlockchainResponse {
                blockchain_identifier,
                ..
            } => Some(blockchain_identifier),
            _ => None,
        }
    }
}

impl V3Message {
    /// Decode from a JSON value whose version is already known to be 3.x
    pub fn from_value(value: Value) -> Result<Self> {
        let message_type = value
            .get("message")
            .and_then(|message| message.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::MalformedPayload("missing 'message.type' discriminator".to_string())
            })?;

        check_known_type(ProtocolVersion::V3, message_type, &V3Content::TYPES)?;
        decode_wire(value)
    }

    pub fn message_type(&self) -> &'static str {
        self.message.message_type()
    }

    pub fn comes_from(&self, app: &AppMetadata) -> bool {
        let relevant = match &self.message {
            V3Content::Disconnect => true,
            V3Content::BlockchainResponse {
                blockchain_data, ..
            } => blockchain_data.get("type").and_then(Value::as_str) == Some(SIGN_PAYLOAD_RESPONSE),
            _ => false,
        };

        relevant && self.sender_id == app.sender_id
    }

    pub fn from_canonical(
        message: &BeaconMessage,
        version: String,
        sender_id: &str,
        registry: &ChainRegistry,
    ) -> Result<Self> {
        let content = match message {
            BeaconMessage::Request(BeaconRequest::Permission(request)) => {
                let chain = request.content.blockchain_identifier();
                V3Content::PermissionRequest {
                    blockchain_identifier: chain.to_string(),
                    blockchain_data: registry.get(chain)?.encode_permission_request(&request.content)?,
                }
            }
            BeaconMessage::Request(BeaconRequest::Blockchain(request)) => {
                let chain = request.content.blockchain_identifier();
                V3Content::BlockchainRequest {
                    blockchain_identifier: chain.to_string(),
                    account_id: request.account_id.clone(),
                    blockchain_data: registry.get(chain)?.encode_blockchain_request(&request.content)?,
                }
            }
            BeaconMessage::Response(BeaconResponse::Permission(response)) => {
                let chain = response.content.blockchain_identifier();
                V3Content::PermissionResponse {
                    blockchain_identifier: chain.to_string(),
                    blockchain_data: registry
                        .get(chain)?
                        .encode_permission_response(&response.content)?,
                }
            }
            BeaconMessage::Response(BeaconResponse::Blockchain(response)) => {
                let chain = response.content.blockchain_identifier();
                V3Content::BlockchainResponse {
                    blockchain_identifier: chain.to_string(),
                    blockchain_data: registry
                        .get(chain)?
                        .encode_blockchain_response(&response.content)?,
                }
            }
            BeaconMessage::Response(BeaconResponse::Acknowledge(_)) => V3Content::Acknowledge,
            BeaconMessage::Response(BeaconResponse::Error(response)) => V3Content::Error {
                error_type: response.error_type,
                description: response.description.clone(),
            },
            BeaconMessage::Disconnect(_) => V3Content::Disconnect,
        };

        Ok(Self {
            id: message.id().to_string(),
            version,
            sender_id: sender_id.to_string(),
            message: content,
        })
    }

    pub async fn to_canonical(
        &self,
        origin: Origin,
        storage: &StorageManager,
        registry: &ChainRegistry,
    ) -> Result<BeaconMessage> {
        let id = self.id.clone();
        let version = self.version.clone();

        let message = match &self.message {
            V3Content::PermissionRequest {
                blockchain_identifier,
                blockchain_data,
            } => {
                let handler = registry.get(blockchain_identifier)?;
                BeaconMessage::Request(BeaconRequest::Permission(PermissionRequest {
                    id,
                    version,
                    sender_id: self.sender_id.clone(),
                    origin,
                    content: handler.decode_permission_request(blockchain_data.clone())?,
                }))
            }
            V3Content::BlockchainRequest {
                blockchain_identifier,
                account_id,
                blockchain_data,
            } => {
                let handler = registry.get(blockchain_identifier)?;
                let content = handler.decode_blockchain_request(blockchain_data.clone())?;
                let app_metadata = find_app_metadata(storage, &self.sender_id).await?;

                BeaconMessage::Request(BeaconRequest::Blockchain(BlockchainRequest {
                    id,
                    version,
                    sender_id: self.sender_id.clone(),
                    origin,
                    app_metadata,
                    account_id: account_id.clone(),
                    content,
                }))
            }
            V3Content::PermissionResponse {
                blockchain_identifier,
                blockchain_data,
            } => {
                let handler = registry.get(blockchain_identifier)?;
                let content = handler.decode_permission_response(blockchain_data.clone())?;
                require_peer(storage, &origin).await?;

                BeaconMessage::Response(BeaconResponse::Permission(PermissionResponse {
                    id,
                    version,
                    origin,
                    content,
                }))
            }
            V3Content::BlockchainResponse {
                blockchain_identifier,
                blockchain_data,
            } => {
                let handler = registry.get(blockchain_identifier)?;
                let content = handler.decode_blockchain_response(blockchain_data.clone())?;
                require_peer(storage, &origin).await?;

                BeaconMessage::Response(BeaconResponse::Blockchain(BlockchainResponse {
                    id,
                    version,
                    origin,
                    content,
                }))
            }
            V3Content::Acknowledge => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Acknowledge(AcknowledgeResponse {
                    id,
                    version,
                    origin,
                }))
            }
            V3Content::Error {
                error_type,
                description,
            } => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Error(ErrorResponse {
                    id,
                    version,
                    origin,
                    error_type: *error_type,
                    description: description.clone(),
                }))
            }
            V3Content::Disconnect => BeaconMessage::Disconnect(DisconnectMessage {
                id,
                version,
                sender_id: self.sender_id.clone(),
                origin,
            }),
        };

        Ok(message)
    }
}
