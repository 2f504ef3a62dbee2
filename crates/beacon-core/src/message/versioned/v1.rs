//! V1 wire format: flat Tezos messages addressed by `beaconId`
//!
//! V1 predates acknowledge responses and signing types; sign-payload
//! messages always carry raw payloads.

use super::{check_known_type, decode_wire, find_app_metadata, read_message_type, require_peer};
use crate::chain::tezos::{
    SigningType, TezosBlockchainRequest, TezosBlockchainResponse, TezosBroadcastRequest,
    TezosBroadcastResponse, TezosNetwork, TezosOperationRequest, TezosOperationResponse,
    TezosPermissionRequest, TezosPermissionResponse, TezosScope, TezosSignPayloadRequest,
    TezosSignPayloadResponse,
};
use crate::chain::{
    ChainBlockchainRequest, ChainBlockchainResponse, ChainPermissionRequest,
    ChainPermissionResponse,
};
use crate::message::{
    BeaconMessage, BeaconRequest, BeaconResponse, BlockchainRequest, BlockchainResponse,
    DisconnectMessage, ErrorResponse, PermissionRequest, PermissionResponse,
};
use crate::storage::StorageManager;
use crate::types::{AppMetadata, ErrorType, Origin, ProtocolVersion};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Message {
    pub version: String,
    pub id: String,
    pub beacon_id: String,
    #[serde(flatten)]
    pub content: V1Content,
}

/// App metadata as announced by V1 apps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1AppMetadata {
    pub beacon_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl From<V1AppMetadata> for AppMetadata {
    fn from(metadata: V1AppMetadata) -> Self {
        AppMetadata {
            sender_id: metadata.beacon_id,
            name: metadata.name,
            icon: metadata.icon,
        }
    }
}

impl From<AppMetadata> for V1AppMetadata {
    fn from(metadata: AppMetadata) -> Self {
        V1AppMetadata {
            beacon_id: metadata.sender_id,
            name: metadata.name,
            icon: metadata.icon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1PermissionRequest {
    pub app_metadata: V1AppMetadata,
    pub network: TezosNetwork,
    pub scopes: Vec<TezosScope>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1SignPayloadRequest {
    pub payload: String,
    pub source_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1SignPayloadResponse {
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum V1Content {
    PermissionRequest(V1PermissionRequest),
    OperationRequest(TezosOperationRequest),
    SignPayloadRequest(V1SignPayloadRequest),
    BroadcastRequest(TezosBroadcastRequest),
    PermissionResponse(TezosPermissionResponse),
    OperationResponse(TezosOperationResponse),
    SignPayloadResponse(V1SignPayloadResponse),
    BroadcastResponse(TezosBroadcastResponse),
    #[serde(rename_all = "camelCase")]
    Error {
        error_type: ErrorType,
    },
    Disconnect,
}

impl V1Content {
    pub const TYPES: [&'static str; 10] = [
        "permission_request",
        "operation_request",
        "sign_payload_request",
        "broadcast_request",
        "permission_response",
        "operation_response",
        "sign_payload_response",
        "broadcast_response",
        "error",
        "disconnect",
    ];

    pub fn message_type(&self) -> &'static str {
        match self {
            V1Content::PermissionRequest(_) => "permission_request",
            V1Content::OperationRequest(_) => "operation_request",
            V1Content::SignPayloadRequest(_) => "sign_payload_request",
            V1Content::BroadcastRequest(_) => "broadcast_request",
            V1Content::PermissionResponse(_) => "permission_response",
            V1Content::OperationResponse(_) => "operation_response",
            V1Content::SignPayloadResponse(_) => "sign_payload_response",
            V1Content::BroadcastResponse(_) => "broadcast_response",
            V1Content::Error { .. } => "error",
            V1Content::Disconnect => "disconnect",
        }
    }
}

impl V1Message {
    /// Decode from a JSON value whose version is already known to be 1.x
    pub fn from_value(value: Value) -> Result<Self> {
        check_known_type(ProtocolVersion::V1, read_message_type(&value)?, &V1Content::TYPES)?;
        decode_wire(value)
    }

    pub fn message_type(&self) -> &'static str {
        self.content.message_type()
    }

    pub fn comes_from(&self, app: &AppMetadata) -> bool {
        matches!(
            self.content,
            V1Content::Disconnect | V1Content::SignPayloadResponse(_)
        ) && self.beacon_id == app.sender_id
    }

    pub fn from_canonical(message: &BeaconMessage, version: String, beacon_id: &str) -> Result<Self> {
        let unsupported = |what: String| {
            Error::unsupported_for_version(ProtocolVersion::V1.as_str(), what)
        };
        let other_chain = |chain: &str| unsupported(format!("{chain} {}", message.kind()));
        let signing_type = |signing_type: SigningType| {
            if signing_type == SigningType::Raw {
                Ok(())
            } else {
                Err(unsupported(format!(
                    "{} with {signing_type:?} signing type",
                    message.kind()
                )))
            }
        };

        let content = match message {
            BeaconMessage::Request(BeaconRequest::Permission(request)) => match &request.content {
                ChainPermissionRequest::Tezos(content) => {
                    V1Content::PermissionRequest(V1PermissionRequest {
                        app_metadata: content.app_metadata.clone().into(),
                        network: content.network.clone(),
                        scopes: content.scopes.clone(),
                    })
                }
                other => return Err(other_chain(other.blockchain_identifier())),
            },
            BeaconMessage::Request(BeaconRequest::Blockchain(request)) => match &request.content {
                ChainBlockchainRequest::Tezos(TezosBlockchainRequest::Operation(content)) => {
                    V1Content::OperationRequest(content.clone())
                }
                ChainBlockchainRequest::Tezos(TezosBlockchainRequest::SignPayload(content)) => {
                    signing_type(content.signing_type)?;
                    V1Content::SignPayloadRequest(V1SignPayloadRequest {
                        payload: content.payload.clone(),
                        source_address: content.source_address.clone(),
                    })
                }
                ChainBlockchainRequest::Tezos(TezosBlockchainRequest::Broadcast(content)) => {
                    V1Content::BroadcastRequest(content.clone())
                }
                other => return Err(other_chain(other.blockchain_identifier())),
            },
            BeaconMessage::Response(BeaconResponse::Permission(response)) => match &response.content {
                ChainPermissionResponse::Tezos(content) => {
                    V1Content::PermissionResponse(content.clone())
                }
                other => return Err(other_chain(other.blockchain_identifier())),
            },
            BeaconMessage::Response(BeaconResponse::Blockchain(response)) => match &response.content {
                ChainBlockchainResponse::Tezos(TezosBlockchainResponse::Operation(content)) => {
                    V1Content::OperationResponse(content.clone())
                }
                ChainBlockchainResponse::Tezos(TezosBlockchainResponse::SignPayload(content)) => {
                    signing_type(content.signing_type)?;
                    V1Content::SignPayloadResponse(V1SignPayloadResponse {
                        signature: content.signature.clone(),
                    })
                }
                ChainBlockchainResponse::Tezos(TezosBlockchainResponse::Broadcast(content)) => {
                    V1Content::BroadcastResponse(content.clone())
                }
                other => return Err(other_chain(other.blockchain_identifier())),
            },
            BeaconMessage::Response(BeaconResponse::Acknowledge(_)) => {
                return Err(unsupported(message.kind().to_string()));
            }
            BeaconMessage::Response(BeaconResponse::Error(response)) => V1Content::Error {
                error_type: response.error_type,
            },
            BeaconMessage::Disconnect(_) => V1Content::Disconnect,
        };

        Ok(Self {
            version,
            id: message.id().to_string(),
            beacon_id: beacon_id.to_string(),
            content,
        })
    }

    pub async fn to_canonical(&self, origin: Origin, storage: &StorageManager) -> Result<BeaconMessage> {
        let message = match &self.content {
            V1Content::PermissionRequest(content) => {
                BeaconMessage::Request(BeaconRequest::Permission(PermissionRequest {
                    id: self.id.clone(),
                    version: self.version.clone(),
                    sender_id: self.beacon_id.clone(),
                    origin,
                    content: ChainPermissionRequest::Tezos(TezosPermissionRequest {
                        app_metadata: content.app_metadata.clone().into(),
                        network: content.network.clone(),
                        scopes: content.scopes.clone(),
                    }),
                }))
            }
            V1Content::OperationRequest(content) => {
                let content = TezosBlockchainRequest::Operation(content.clone());
                self.blockchain_request(origin, storage, content).await?
            }
            V1Content::SignPayloadRequest(content) => {
                let content = TezosBlockchainRequest::SignPayload(TezosSignPayloadRequest {
                    signing_type: SigningType::Raw,
                    payload: content.payload.clone(),
                    source_address: content.source_address.clone(),
                });
                self.blockchain_request(origin, storage, content).await?
            }
            V1Content::BroadcastRequest(content) => {
                let content = TezosBlockchainRequest::Broadcast(content.clone());
                self.blockchain_request(origin, storage, content).await?
            }
            V1Content::PermissionResponse(content) => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Permission(PermissionResponse {
                    id: self.id.clone(),
                    version: self.version.clone(),
                    origin,
                    content: ChainPermissionResponse::Tezos(content.clone()),
                }))
            }
            V1Content::OperationResponse(content) => {
                let content = TezosBlockchainResponse::Operation(content.clone());
                self.blockchain_response(origin, storage, content).await?
            }
            V1Content::SignPayloadResponse(content) => {
                let content = TezosBlockchainResponse::SignPayload(TezosSignPayloadResponse {
                    signing_type: SigningType::Raw,
                    signature: content.signature.clone(),
                });
                self.blockchain_response(origin, storage, content).await?
            }
            V1Content::BroadcastResponse(content) => {
                let content = TezosBlockchainResponse::Broadcast(content.clone());
                self.blockchain_response(origin, storage, content).await?
            }
            V1Content::Error { error_type } => {
                require_peer(storage, &origin).await?;
                BeaconMessage::Response(BeaconResponse::Error(ErrorResponse {
                    id: self.id.clone(),
                    version: self.version.clone(),
                    origin,
                    error_type: *error_type,
                    description: None,
                }))
            }
            V1Content::Disconnect => BeaconMessage::Disconnect(DisconnectMessage {
                id: self.id.clone(),
                version: self.version.clone(),
                sender_id: self.beacon_id.clone(),
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
        let app_metadata = find_app_metadata(storage, &self.beacon_id).await?;

        Ok(BeaconMessage::Request(BeaconRequest::Blockchain(BlockchainRequest {
            id: self.id.clone(),
            version: self.version.clone(),
            sender_id: self.beacon_id.clone(),
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
