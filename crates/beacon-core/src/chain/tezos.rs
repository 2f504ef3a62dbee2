//! Tezos chain handler
//!
//! Tezos is the only chain V1 and V2 messages can carry, so the content types
//! here are also reused by the flat V1/V2 wire formats.

use super::{
    BlockchainHandler, CHAIN_DATA_VERSION, ChainBlockchainRequest, ChainBlockchainResponse,
    ChainPermissionRequest, ChainPermissionResponse, decode_body, read_type, wrong_chain,
};
use crate::types::{AppMetadata, LegacyPermission, PermissionRecord};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of the Tezos chain
pub const TEZOS_IDENTIFIER: &str = "tezos";

// ============================================================================
// Network
// ============================================================================

/// Kind of Tezos network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TezosNetworkType {
    Mainnet,
    Ghostnet,
    Custom,
}

/// Tezos network a request targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosNetwork {
    #[serde(rename = "type")]
    pub network_type: TezosNetworkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl TezosNetwork {
    pub fn new(network_type: TezosNetworkType) -> Self {
        Self {
            network_type,
            name: None,
            rpc_url: None,
        }
    }

    pub fn mainnet() -> Self {
        Self::new(TezosNetworkType::Mainnet)
    }

    /// Set a custom RPC endpoint
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }
}

/// Permission scope an app can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TezosScope {
    OperationRequest,
    Sign,
    Encrypt,
}

/// How a sign-payload request payload is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningType {
    #[default]
    Raw,
    Operation,
    Micheline,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosPermissionRequest {
    pub app_metadata: AppMetadata,
    pub network: TezosNetwork,
    pub scopes: Vec<TezosScope>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosOperationRequest {
    pub network: TezosNetwork,
    /// Partial operations, forwarded untouched
    pub operation_details: Vec<Value>,
    pub source_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosSignPayloadRequest {
    pub signing_type: SigningType,
    pub payload: String,
    pub source_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosBroadcastRequest {
    pub network: TezosNetwork,
    pub signed_transaction: String,
}

/// Tezos blockchain request content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TezosBlockchainRequest {
    #[serde(rename = "operation_request")]
    Operation(TezosOperationRequest),
    #[serde(rename = "sign_payload_request")]
    SignPayload(TezosSignPayloadRequest),
    #[serde(rename = "broadcast_request")]
    Broadcast(TezosBroadcastRequest),
}

impl TezosBlockchainRequest {
    pub const TYPES: [&'static str; 3] =
        ["operation_request", "sign_payload_request", "broadcast_request"];

    pub fn message_type(&self) -> &'static str {
        match self {
            TezosBlockchainRequest::Operation(_) => Self::TYPES[0],
            TezosBlockchainRequest::SignPayload(_) => Self::TYPES[1],
            TezosBlockchainRequest::Broadcast(_) => Self::TYPES[2],
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosPermissionResponse {
    pub public_key: String,
    pub network: TezosNetwork,
    pub scopes: Vec<TezosScope>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosOperationResponse {
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosSignPayloadResponse {
    pub signing_type: SigningType,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosBroadcastResponse {
    pub transaction_hash: String,
}

/// Tezos blockchain response content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TezosBlockchainResponse {
    #[serde(rename = "operation_response")]
    Operation(TezosOperationResponse),
    #[serde(rename = "sign_payload_response")]
    SignPayload(TezosSignPayloadResponse),
    #[serde(rename = "broadcast_response")]
    Broadcast(TezosBroadcastResponse),
}

impl TezosBlockchainResponse {
    pub const TYPES: [&'static str; 3] =
        ["operation_response", "sign_payload_response", "broadcast_response"];

    pub fn message_type(&self) -> &'static str {
        match self {
            TezosBlockchainResponse::Operation(_) => Self::TYPES[0],
            TezosBlockchainResponse::SignPayload(_) => Self::TYPES[1],
            TezosBlockchainResponse::Broadcast(_) => Self::TYPES[2],
        }
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Permission granted to an app on a Tezos account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosPermission {
    pub account_id: String,
    pub sender_id: String,
    /// Grant time, milliseconds since the epoch
    pub connected_at: i64,
    pub address: String,
    pub public_key: String,
    pub network: TezosNetwork,
    pub scopes: Vec<TezosScope>,
    pub app_metadata: AppMetadata,
}

impl PermissionRecord for TezosPermission {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn sender_id(&self) -> &str {
        &self.sender_id
    }
}

/// Tezos permission as persisted by SDK versions before 3.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTezosPermission {
    pub account_identifier: String,
    pub address: String,
    pub network: TezosNetwork,
    pub scopes: Vec<TezosScope>,
    pub sender_id: String,
    pub app_metadata: AppMetadata,
    pub public_key: String,
    pub connected_at: i64,
}

impl LegacyPermission for LegacyTezosPermission {
    const FROM_VERSION: &'static str = "2.0.0";

    type Current = TezosPermission;

    fn migrate(self) -> Result<TezosPermission> {
        if self.account_identifier.is_empty() {
            return Err(Error::Storage(format!(
                "legacy permission for {} has no account identifier",
                self.address
            )));
        }

        Ok(TezosPermission {
            account_id: self.account_identifier,
            sender_id: self.sender_id,
            connected_at: self.connected_at,
            address: self.address,
            public_key: self.public_key,
            network: self.network,
            scopes: self.scopes,
            app_metadata: self.app_metadata,
        })
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Codec for Tezos `blockchainData` bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct TezosHandler;

impl BlockchainHandler for TezosHandler {
    fn identifier(&self) -> &'static str {
        TEZOS_IDENTIFIER
    }

    fn decode_permission_request(&self, data: Value) -> Result<ChainPermissionRequest> {
        decode_body(data).map(ChainPermissionRequest::Tezos)
    }

    fn encode_permission_request(&self, content: &ChainPermissionRequest) -> Result<Value> {
        match content {
            ChainPermissionRequest::Tezos(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(TEZOS_IDENTIFIER, other.blockchain_identifier())),
        }
    }

    fn decode_permission_response(&self, data: Value) -> Result<ChainPermissionResponse> {
        decode_body(data).map(ChainPermissionResponse::Tezos)
    }

    fn encode_permission_response(&self, content: &ChainPermissionResponse) -> Result<Value> {
        match content {
            ChainPermissionResponse::Tezos(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(TEZOS_IDENTIFIER, other.blockchain_identifier())),
        }
    }

    fn decode_blockchain_request(&self, data: Value) -> Result<ChainBlockchainRequest> {
        let message_type = read_type(&data)?;
        if !TezosBlockchainRequest::TYPES.contains(&message_type.as_str()) {
            return Err(Error::unknown_type(CHAIN_DATA_VERSION, message_type));
        }
        decode_body(data).map(ChainBlockchainRequest::Tezos)
    }

    fn encode_blockchain_request(&self, content: &ChainBlockchainRequest) -> Result<Value> {
        match content {
            ChainBlockchainRequest::Tezos(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(TEZOS_IDENTIFIER, other.blockchain_identifier())),
        }
    }

    fn decode_blockchain_response(&self, data: Value) -> Result<ChainBlockchainResponse> {
        let message_type = read_type(&data)?;
        if !TezosBlockchainResponse::TYPES.contains(&message_type.as_str()) {
            return Err(Error::unknown_type(CHAIN_DATA_VERSION, message_type));
        }
        decode_body(data).map(ChainBlockchainResponse::Tezos)
    }

    fn encode_blockchain_response(&self, content: &ChainBlockchainResponse) -> Result<Value> {
        match content {
            ChainBlockchainResponse::Tezos(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(TEZOS_IDENTIFIER, other.blockchain_identifier())),
        }
    }
}
