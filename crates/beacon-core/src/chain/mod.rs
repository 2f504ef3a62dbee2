//! # Chain Handlers
//!
//! Blockchain-specific message content is kept out of the message model and
//! plugged in through the [`BlockchainHandler`] trait. Each handler decodes
//! and encodes the `blockchainData` bodies carried by V3 messages for one
//! chain, and handlers are looked up by their identifier in a
//! [`ChainRegistry`].
//!
//! ## Supported Chains
//!
//! - **Tezos** - permissions, operation, sign-payload and broadcast requests
//! - **Substrate** - permissions, transfer and sign-payload requests
//!
//! ## Example
//!
//! ```rust,ignore
//! use beacon_core::chain::ChainRegistry;
//!
//! let registry = ChainRegistry::with_defaults();
//! let handler = registry.get("tezos")?;
//! let request = handler.decode_blockchain_request(blockchain_data)?;
//! ```

pub mod substrate;
pub mod tezos;

use crate::types::AppMetadata;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use substrate::{
    SUBSTRATE_IDENTIFIER, SubstrateBlockchainRequest, SubstrateBlockchainResponse,
    SubstrateHandler, SubstratePermissionRequest, SubstratePermissionResponse,
};
pub use tezos::{
    TEZOS_IDENTIFIER, TezosBlockchainRequest, TezosBlockchainResponse, TezosHandler,
    TezosPermissionRequest, TezosPermissionResponse,
};

// ============================================================================
// Chain Content
// ============================================================================

/// Chain-specific content of a permission request
#[derive(Debug, Clone, PartialEq)]
pub enum ChainPermissionRequest {
    Tezos(TezosPermissionRequest),
    Substrate(SubstratePermissionRequest),
}

impl ChainPermissionRequest {
    /// Identifier of the chain this content belongs to
    pub fn blockchain_identifier(&self) -> &'static str {
        match self {
            ChainPermissionRequest::Tezos(_) => TEZOS_IDENTIFIER,
            ChainPermissionRequest::Substrate(_) => SUBSTRATE_IDENTIFIER,
        }
    }

    /// Metadata of the requesting app
    pub fn app_metadata(&self) -> &AppMetadata {
        match self {
            ChainPermissionRequest::Tezos(content) => &content.app_metadata,
            ChainPermissionRequest::Substrate(content) => &content.app_metadata,
        }
    }
}

/// Chain-specific content of a permission response
#[derive(Debug, Clone, PartialEq)]
pub enum ChainPermissionResponse {
    Tezos(TezosPermissionResponse),
    Substrate(SubstratePermissionResponse),
}

impl ChainPermissionResponse {
    pub fn blockchain_identifier(&self) -> &'static str {
        match self {
            ChainPermissionResponse::Tezos(_) => TEZOS_IDENTIFIER,
            ChainPermissionResponse::Substrate(_) => SUBSTRATE_IDENTIFIER,
        }
    }
}

/// Chain-specific content of a blockchain request
#[derive(Debug, Clone, PartialEq)]
pub enum ChainBlockchainRequest {
    Tezos(TezosBlockchainRequest),
    Substrate(SubstrateBlockchainRequest),
}

impl ChainBlockchainRequest {
    pub fn blockchain_identifier(&self) -> &'static str {
        match self {
            ChainBlockchainRequest::Tezos(_) => TEZOS_IDENTIFIER,
            ChainBlockchainRequest::Substrate(_) => SUBSTRATE_IDENTIFIER,
        }
    }

    /// Wire discriminator of the content
    pub fn message_type(&self) -> &'static str {
        match self {
            ChainBlockchainRequest::Tezos(content) => content.message_type(),
            ChainBlockchainRequest::Substrate(content) => content.message_type(),
        }
    }
}

/// Chain-specific content of a blockchain response
#[derive(Debug, Clone, PartialEq)]
pub enum ChainBlockchainResponse {
    Tezos(TezosBlockchainResponse),
    Substrate(SubstrateBlockchainResponse),
}

impl ChainBlockchainResponse {
    pub fn blockchain_identifier(&self) -> &'static str {
        match self {
            ChainBlockchainResponse::Tezos(_) => TEZOS_IDENTIFIER,
            ChainBlockchainResponse::Substrate(_) => SUBSTRATE_IDENTIFIER,
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            ChainBlockchainResponse::Tezos(content) => content.message_type(),
            ChainBlockchainResponse::Substrate(content) => content.message_type(),
        }
    }

    /// Check if this is a sign-payload response
    pub fn is_sign_payload(&self) -> bool {
        match self {
            ChainBlockchainResponse::Tezos(content) => {
                matches!(content, TezosBlockchainResponse::SignPayload(_))
            }
            ChainBlockchainResponse::Substrate(content) => {
                matches!(content, SubstrateBlockchainResponse::SignPayload(_))
            }
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// Codec for the `blockchainData` bodies of one chain
///
/// Every method receives or produces the raw JSON object nested in a V3
/// message. Decoders must read the `type` discriminator (where the body has
/// one) before decoding the rest, and reject unknown discriminators with
/// [`Error::UnknownType`].
pub trait BlockchainHandler: Send + Sync {
    /// Chain identifier as carried in `blockchainIdentifier`
    fn identifier(&self) -> &'static str;

    fn decode_permission_request(&self, data: Value) -> Result<ChainPermissionRequest>;

    fn encode_permission_request(&self, content: &ChainPermissionRequest) -> Result<Value>;

    fn decode_permission_response(&self, data: Value) -> Result<ChainPermissionResponse>;

    fn encode_permission_response(&self, content: &ChainPermissionResponse) -> Result<Value>;

    fn decode_blockchain_request(&self, data: Value) -> Result<ChainBlockchainRequest>;

    fn encode_blockchain_request(&self, content: &ChainBlockchainRequest) -> Result<Value>;

    fn decode_blockchain_response(&self, data: Value) -> Result<ChainBlockchainResponse>;

    fn encode_blockchain_response(&self, content: &ChainBlockchainResponse) -> Result<Value>;
}

// ============================================================================
// Registry
// ============================================================================

/// Registered chain handlers, keyed by chain identifier
#[derive(Clone, Default)]
pub struct ChainRegistry {
    handlers: HashMap<String, Arc<dyn BlockchainHandler>>,
}

impl ChainRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Tezos and Substrate handlers
    pub fn with_defaults() -> Self {
        Self::new()
            .with_handler(Arc::new(TezosHandler))
            .with_handler(Arc::new(SubstrateHandler))
    }

    /// Register a handler, replacing any handler with the same identifier
    pub fn with_handler(mut self, handler: Arc<dyn BlockchainHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn BlockchainHandler>) {
        self.handlers
            .insert(handler.identifier().to_string(), handler);
    }

    /// Look up the handler for a chain
    pub fn get(&self, identifier: &str) -> Result<&Arc<dyn BlockchainHandler>> {
        self.handlers
            .get(identifier)
            .ok_or_else(|| Error::UnsupportedChain(identifier.to_string()))
    }

    /// Check if a chain is registered
    pub fn supports(&self, identifier: &str) -> bool {
        self.handlers.contains_key(identifier)
    }

    /// Identifiers of all registered chains
    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("chains", &self.identifiers())
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Protocol version whose bodies chain handlers decode
pub(crate) const CHAIN_DATA_VERSION: &str = "3";

/// Read the `type` discriminator of a body without validating the rest
pub(crate) fn read_type(data: &Value) -> Result<String> {
    data.get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedPayload("missing 'type' discriminator".to_string()))
}

/// Decode a body whose discriminator has already been checked
pub(crate) fn decode_body<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::MalformedPayload(e.to_string()))
}

/// Error for content handed to a handler of another chain
pub(crate) fn wrong_chain(expected: &str, actual: &str) -> Error {
    Error::InvalidMessage(format!(
        "{actual} content passed to the {expected} handler"
    ))
}
