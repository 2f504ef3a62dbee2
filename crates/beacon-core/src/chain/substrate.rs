//! Substrate chain handler
//!
//! Substrate content only exists in V3 messages. Transfer and sign-payload
//! responses are tri-state on the wire: which of `transactionHash` and
//! `payload` is present decides the [`SubstrateOutcome`] variant.

use super::{
    BlockchainHandler, CHAIN_DATA_VERSION, ChainBlockchainRequest, ChainBlockchainResponse,
    ChainPermissionRequest, ChainPermissionResponse, decode_body, read_type, wrong_chain,
};
use crate::types::{AppMetadata, PermissionRecord};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of the Substrate chain
pub const SUBSTRATE_IDENTIFIER: &str = "substrate";

const TRANSFER_REQUEST: &str = "transfer_request";
const SIGN_PAYLOAD_REQUEST: &str = "sign_payload_request";
const TRANSFER_RESPONSE: &str = "transfer_response";
const SIGN_PAYLOAD_RESPONSE: &str = "sign_payload_response";

// ============================================================================
// Network & Accounts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateNetwork {
    pub genesis_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl SubstrateNetwork {
    pub fn new(genesis_hash: impl Into<String>) -> Self {
        Self {
            genesis_hash: genesis_hash.into(),
            name: None,
            rpc_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<SubstrateNetwork>,
    /// SS58 address prefix
    pub address_prefix: u16,
    pub public_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstrateScope {
    Transfer,
    SignPayloadJson,
    SignPayloadRaw,
}

/// What the wallet should do with a built transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstrateMode {
    Broadcast,
    BroadcastAndReturn,
    Return,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstratePermissionRequest {
    pub app_metadata: AppMetadata,
    pub scopes: Vec<SubstrateScope>,
    pub networks: Vec<SubstrateNetwork>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateTransferRequest {
    pub scope: SubstrateScope,
    pub source_address: String,
    pub amount: String,
    pub recipient: String,
    pub network: SubstrateNetwork,
    pub mode: SubstrateMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateSignPayloadRequest {
    pub scope: SubstrateScope,
    pub address: String,
    /// JSON or raw payload, forwarded untouched
    pub payload: Value,
    pub mode: SubstrateMode,
}

/// Substrate blockchain request content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SubstrateBlockchainRequest {
    #[serde(rename = "transfer_request")]
    Transfer(SubstrateTransferRequest),
    #[serde(rename = "sign_payload_request")]
    SignPayload(SubstrateSignPayloadRequest),
}

impl SubstrateBlockchainRequest {
    pub fn message_type(&self) -> &'static str {
        match self {
            SubstrateBlockchainRequest::Transfer(_) => TRANSFER_REQUEST,
            SubstrateBlockchainRequest::SignPayload(_) => SIGN_PAYLOAD_REQUEST,
        }
    }

    pub fn scope(&self) -> SubstrateScope {
        match self {
            SubstrateBlockchainRequest::Transfer(content) => content.scope,
            SubstrateBlockchainRequest::SignPayload(content) => content.scope,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstratePermissionResponse {
    pub scopes: Vec<SubstrateScope>,
    pub accounts: Vec<SubstrateAccount>,
}

/// Result of a broadcast/return operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstrateOutcome {
    /// Transaction was broadcast
    Broadcast { transaction_hash: String },
    /// Transaction was broadcast and its payload returned
    BroadcastAndReturn {
        transaction_hash: String,
        payload: String,
    },
    /// Payload returned without broadcasting
    Return { payload: String },
}

impl SubstrateOutcome {
    /// Pick the variant from the optional wire fields.
    ///
    /// A response carrying neither a transaction hash nor a payload is
    /// rejected with [`Error::InvalidMessage`].
    pub fn from_fields(transaction_hash: Option<String>, payload: Option<String>) -> Result<Self> {
        match (transaction_hash, payload) {
            (Some(transaction_hash), None) => Ok(SubstrateOutcome::Broadcast { transaction_hash }),
            (Some(transaction_hash), Some(payload)) => Ok(SubstrateOutcome::BroadcastAndReturn {
                transaction_hash,
                payload,
            }),
            (None, Some(payload)) => Ok(SubstrateOutcome::Return { payload }),
            (None, None) => Err(Error::InvalidMessage(
                "response carries neither transactionHash nor payload".to_string(),
            )),
        }
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        match self {
            SubstrateOutcome::Broadcast { transaction_hash }
            | SubstrateOutcome::BroadcastAndReturn {
                transaction_hash, ..
            } => Some(transaction_hash),
            SubstrateOutcome::Return { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            SubstrateOutcome::BroadcastAndReturn { payload, .. }
            | SubstrateOutcome::Return { payload } => Some(payload),
            SubstrateOutcome::Broadcast { .. } => None,
        }
    }

    /// Mode this outcome answers
    pub fn mode(&self) -> SubstrateMode {
        match self {
            SubstrateOutcome::Broadcast { .. } => SubstrateMode::Broadcast,
            SubstrateOutcome::BroadcastAndReturn { .. } => SubstrateMode::BroadcastAndReturn,
            SubstrateOutcome::Return { .. } => SubstrateMode::Return,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstrateSignPayloadResponse {
    pub signature: String,
    pub outcome: SubstrateOutcome,
}

/// Substrate blockchain response content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstrateBlockchainResponse {
    Transfer(SubstrateOutcome),
    SignPayload(SubstrateSignPayloadResponse),
}

impl SubstrateBlockchainResponse {
    pub fn message_type(&self) -> &'static str {
        match self {
            SubstrateBlockchainResponse::Transfer(_) => TRANSFER_RESPONSE,
            SubstrateBlockchainResponse::SignPayload(_) => SIGN_PAYLOAD_RESPONSE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferResponseData {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignPayloadResponseData {
    #[serde(rename = "type")]
    message_type: String,
    signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
}

// ============================================================================
// Permissions
// ============================================================================

/// Permission granted to an app on Substrate accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstratePermission {
    pub account_id: String,
    pub sender_id: String,
    pub connected_at: i64,
    pub app_metadata: AppMetadata,
    pub scopes: Vec<SubstrateScope>,
    pub accounts: Vec<SubstrateAccount>,
}

impl PermissionRecord for SubstratePermission {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn sender_id(&self) -> &str {
        &self.sender_id
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Codec for Substrate `blockchainData` bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstrateHandler;

impl BlockchainHandler for SubstrateHandler {
    fn identifier(&self) -> &'static str {
        SUBSTRATE_IDENTIFIER
    }

    fn decode_permission_request(&self, data: Value) -> Result<ChainPermissionRequest> {
        decode_body(data).map(ChainPermissionRequest::Substrate)
    }

    fn encode_permission_request(&self, content: &ChainPermissionRequest) -> Result<Value> {
        match content {
            ChainPermissionRequest::Substrate(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(SUBSTRATE_IDENTIFIER, other.blockchain_identifier())),
        }
    }

    fn decode_permission_response(&self, data: Value) -> Result<ChainPermissionResponse> {
        decode_body(data).map(ChainPermissionResponse::Substrate)
    }

    fn encode_permission_response(&self, content: &ChainPermissionResponse) -> Result<Value> {
        match content {
            ChainPermissionResponse::Substrate(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(SUBSTRATE_IDENTIFIER, other.blockchain_identifier())),
        }
    }

    fn decode_blockchain_request(&self, data: Value) -> Result<ChainBlockchainRequest> {
        match read_type(&data)?.as_str() {
            TRANSFER_REQUEST | SIGN_PAYLOAD_REQUEST => {
                decode_body(data).map(ChainBlockchainRequest::Substrate)
            }
            other => Err(Error::unknown_type(CHAIN_DATA_VERSION, other)),
        }
    }

    fn encode_blockchain_request(&self, content: &ChainBlockchainRequest) -> Result<Value> {
        match content {
            ChainBlockchainRequest::Substrate(content) => Ok(serde_json::to_value(content)?),
            other => Err(wrong_chain(SUBSTRATE_IDENTIFIER, other.blockchain_identifier())),
        }
    }

    fn decode_blockchain_response(&self, data: Value) -> Result<ChainBlockchainResponse> {
        let response = match read_type(&data)?.as_str() {
            TRANSFER_RESPONSE => {
                let body: TransferResponseData = decode_body(data)?;
                SubstrateBlockchainResponse::Transfer(SubstrateOutcome::from_fields(
                    body.transaction_hash,
                    body.payload,
                )?)
            }
            SIGN_PAYLOAD_RESPONSE => {
                let body: SignPayloadResponseData = decode_body(data)?;
                SubstrateBlockchainResponse::SignPayload(SubstrateSignPayloadResponse {
                    signature: body.signature,
                    outcome: SubstrateOutcome::from_fields(body.transaction_hash, body.payload)?,
                })
            }
            other => return Err(Error::unknown_type(CHAIN_DATA_VERSION, other)),
        };

        Ok(ChainBlockchainResponse::Substrate(response))
    }

    fn encode_blockchain_response(&self, content: &ChainBlockchainResponse) -> Result<Value> {
        let content = match content {
            ChainBlockchainResponse::Substrate(content) => content,
            other => return Err(wrong_chain(SUBSTRATE_IDENTIFIER, other.blockchain_identifier())),
        };

        let value = match content {
            SubstrateBlockchainResponse::Transfer(outcome) => {
                serde_json::to_value(TransferResponseData {
                    message_type: TRANSFER_RESPONSE.to_string(),
                    transaction_hash: outcome.transaction_hash().map(str::to_string),
                    payload: outcome.payload().map(str::to_string),
                })?
            }
            SubstrateBlockchainResponse::SignPayload(response) => {
                serde_json::to_value(SignPayloadResponseData {
                    message_type: SIGN_PAYLOAD_RESPONSE.to_string(),
                    signature: response.signature.clone(),
                    transaction_hash: response.outcome.transaction_hash().map(str::to_string),
                    payload: response.outcome.payload().map(str::to_string),
                })?
            }
        };

        Ok(value)
    }
}
