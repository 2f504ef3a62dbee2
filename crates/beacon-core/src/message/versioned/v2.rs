//! V2 wire format: flat Tezos messages addressed by `senderId`

use super::{check_known_type, decode_wire, find_app_metadata, read_message_type, require_peer};
use crate::chain::tezos::{
    TezosBlockchainRequest, TezosBlockchainResponse, TezosBroadcastRequest,
    TezosBroadcastResponse, TezosOperationRequest, TezosOperationResponse,
    TezosPermissionRequest, TezosPermissionResponse, TezosSignPayloadRequest,
    TezosSignPayloadResponse,
};
use crate::chain::{
    ChainBlockchainRequest, ChainBlockchainResponse, ChainPermissionRequest,
    ChainPermissionResponse,
};
use crate::message::{
    AcknowledgeResponse, BeaconMessage, BeaconRequest, BeaconResponse, BlockchainRequest,
    BlockchainResponse, DisconnectMessage, ErrorResponse, PermissionRequest, PermissionResponse,
};
use crate::storage::StorageManager;
use crate::types::{AppMetadata, ErrorType, Origin, ProtocolVersion};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Message {
    pub version: String,
    pub id: String,
    pub sender_id: String,
    #[serde(flatten)]
    pub content: V2Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum V2Content {
    PermissionRequest(TezosPermissionRequest),
    OperationRequest(TezosOperationRequest),
    SignPayloadRequest(TezosSignPayloadRequest),
    BroadcastRequest(TezosBroadcastRequest),
    PermissionResponse(TezosPermissionResponse),
    OperationResponse(TezosOperationResponse),
    SignPayloadResponse(TezosSignPayloadResponse),
    BroadcastResponse(TezosBroadcastResponse),
    Acknowledge,
    #[serde(rename_all = "camelCase")]
    Error {
        error_type: ErrorType,
    },
    Disconnect,
}

impl V2Content {
    pub const TYPES: [&'static str; 11] = [
        "permission_request",
        "operation_request",
        "sign_payload_request",
        "broadcast_request",
        "permission_response",
        "operation_response",
        "sign_payload_response",
        "broadcast_response",
        "acknowledge",
        "error",
        "disconnect",
    ];

    pub fn message_type(&self) -> &'static str {
        match self {
            V2Content::PermissionRequest(_) => "permission_request",
            V2Content::OperationRequest(_) => "operation_request",
            V2Content::SignPayloadRequest(_) => "sign_payload_request",
            V2Content::BroadcastRequest(_) => "broadcast_request",
            V2Content::PermissionResponse(_) => "permission_response",
            V2Content::OperationResponse(_) => "operation_response",
            V2Content::SignPayloadResponse(_) => "sign_payload_response",
            V2Content::BroadcastResponse(_) => "broadcast_response",
            V2Content::Acknowledge => "acknowledge",
            V2Content::Error { .. } => "error",
            V2Content::Disconnect => "disconnect",
        }
    }
}

impl V2Message {
    /// Decode from a JSON value whose version is already known to be 2.x
    pub fn from_value(value: Value) -> Result<Self> {
        check_known_type(ProtocolVersion::V2, read_message_type(&value)?, &V2Content::TYPES)?;
        decode_wire(value)
    }

    pub fn message_type(&self) -> &'static str {
        self.content.message_type()
    }

    pub fn comes_from(&self, app: &AppMetadata) -> bool {
        matches!(
            self.content,
            V2Content::Disconnect | V2Content::SignPayloadResponse(_)
        ) && self.sender_id == app.sender_id
    }

    pub fn from_canonical(message: &BeaconMessage, version: String, sender_id: &str) -> Result<Self> {
        let unsupported = |chain: &str| {
            Error::unsupported_for_version(
                ProtocolVersion::V2.as_str(),
                format!("{chain} {}", message.kind()),
            )
        };

        let content = match message {
            BeaconMessage::Request(BeaconRequest::Permission(request)) => match &request.content {
                ChainPermissionRequest::Tezos(content) => V2Content::PermissionRequest(content.clone()),
                other => return Err(unsupported(other.blockchain_identifier())),
            },
            BeaconMessage::Request(BeaconRequest::Blockchain(request)) => match &request.content {
                ChainBlockchainRequest::Tezos(content) => tezos_request(content),
                other => return Err(unsupported(other.blockchain_identifier())),
            },
            BeaconMessage::Response(BeaconResponse::Permission(response)) => match &response.content {
                ChainPermissionResponse::Tezos(content) => {
                    V2Content::PermissionResponse(content.clone())
                }
                other => return Err(unsupported(other.blockchain_identifier())),
            },
            BeaconMessage::Response(BeaconResponse::Blockchain(response)) => match &response.content {
                ChainBlockchainResponse::Tezos(content) => tezos_response(content),
                other => return Err(unsupported(other.blockchain_identifier())),
            },
            BeaconMessage::Response(BeaconResponse::Acknowledge(_)) => V2Content::Acknowledge,
            BeaconMessage::Response(BeaconResponse::Error(response)) => V2Content::Error {
                error_type: response.error_type,
            },
            BeaconMessage::Disconnect(_) => V2Content::Disconnect,
        };

        Ok(Self {
            version,
            id: message.id().to_string(),
            sender_id: sender_id.to_string(),
            content,
        })
    }

    pub async fn to_canonical(&self, origin: Origin, storage: &StorageManager) -> Result<BeaconMessage> {
        let id = self.id.clone();
        let version = self.version.clone();

        let message = match &self.content {
            V2Content::PermissionRequest(content) => {
                BeaconMessage::Request(BeaconRequest::Permission(PermissionRequest {
                    id,
                    version,
                    sender_id: self.sender_id.clone(),
                    origin,
                    content: ChainPermissionRequest::Tezos(content.clone()),
                }))
            }
            V2Content::OperationRequest(content) => {
                self.blockchain_request(origin, storage, TezosBlockchainRequest::Operation(content.clone()))
                    .await?
            }
            V2Content::SignPayloadRequest(content) => {
                self.blockchain_request(origin, storage, TezosBlockchainRequest::SignPayload(content.clone()))
                    .await?
            }
            V2Content::BroadcastRequest(content) => {
                self.blockchain_request(origin, storage, TezosBlockchainRequest::Broadcast(content.clone()))
                    .await?
            }
            V2Content::PermissionResponse(content) => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Permission(PermissionResponse {
                    id,
                    version,
                    origin,
                    content: ChainPermissionResponse::Tezos(content.clone()),
                }))
            }
            V2Content::OperationResponse(content) => {
                self.blockchain_response(origin, storage, TezosBlockchainResponse::Operation(content.clone()))
                    .await?
            }
            V2Content::SignPayloadResponse(content) => {
                self.blockchain_response(origin, storage, TezosBlockchainResponse::SignPayload(content.clone()))
                    .await?
            }
            V2Content::BroadcastResponse(content) => {
                self.blockchain_response(origin, storage, TezosBlockchainResponse::Broadcast(content.clone()))
                    .await?
            }
            V2Content::Acknowledge => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Acknowledge(AcknowledgeResponse {
                    id,
                    version,
                    origin,
                }))
            }
            V2Content::Error { error_type } => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Error(ErrorResponse {
                    id,
                    version,
                    origin,
                    error_type: *error_type,
                    description: None,
                }))
            }
            V2Content::Disconnect => BeaconMessage::Disconnect(DisconnectMessage {
                id,
                version,
                sender_id: self.sender_id.clone(),
                origin,
            }),
        };

        Ok(message)
    }

    async fn blockchain_request(
        &self,
        origin: Origin,
        storage: &StorageManager,
        content: TezosBlockchainRequest,
    ) -> Result<BeaconMessage> {
        let app_metadata = find_app_metadata(storage, &self.sender_id).await?;

        Ok(BeaconMessage::Request(BeaconRequest::Blockchain(BlockchainRequest {
            id: self.id.clone(),
            version: self.version.clone(),
            sender_id: self.sender_id.clone(),
            origin,
            app_metadata,
            account_id: None,
            content: ChainBlockchainRequest::Tezos(content),
        })))
    }

    async fn blockchain_response(
        &self,
        origin: Origin,
        storage: &StorageManager,
        content: TezosBlockchainResponse,
    ) -> Result<BeaconMessage> {
        require_peer(storage, &origin).await?;

        Ok(BeaconMessage::Response(BeaconResponse::Blockchain(BlockchainResponse {
            id: self.id.clone(),
            version: self.version.clone(),
            origin,
            content: ChainBlockchainResponse::Tezos(content),
        })))
    }
}

fn tezos_request(content: &TezosBlockchainRequest) -> V2Content {
    match content {
        TezosBlockchainRequest::Operation(request) => V2Content::OperationRequest(request.clone()),
        TezosBlockchainRequest::SignPayload(request) => V2Content::SignPayloadRequest(request.clone()),
        TezosBlockchainRequest::Broadcast(request) => V2Content::BroadcastRequest(request.clone()),
    }
}

fn tezos_response(content: &TezosBlockchainResponse) -> V2Content {
    match content {
        TezosBlockchainResponse::Operation(response) => V2Content::OperationResponse(response.clone()),
        TezosBlockchainResponse::SignPayload(response) => {
            V2Content::SignPayloadResponse(response.clone())
        }
        TezosBlockchainResponse::Broadcast(response) => V2Content::BroadcastResponse(response.clone()),
    }
}
