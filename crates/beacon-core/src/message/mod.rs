//! # Messages
//!
//! Canonical message model exchanged between a dApp and a wallet, and its
//! versioned wire representations.
//!
//! Application code only ever handles [`BeaconMessage`]. The [`versioned`]
//! module maps it to and from the V1, V2 and V3 wire formats; chain-specific
//! content is supplied by the handlers in [`crate::chain`].
//!
//! ## Message Flow
//!
//! ```text
//! dApp                                   Wallet
//!   |-- PermissionRequest ------------------>|
//!   |<---------------------- Acknowledge ----|
//!   |<------------------ PermissionResponse -|
//!   |-- BlockchainRequest ------------------>|
//!   |<------------------ BlockchainResponse -|
//!   |-- Disconnect ------------------------->|
//! ```

pub mod versioned;

use crate::chain::{
    ChainBlockchainRequest, ChainBlockchainResponse, ChainPermissionRequest,
    ChainPermissionResponse,
};
use crate::types::{AppMetadata, ErrorType, Origin};

pub use versioned::VersionedMessage;

// ============================================================================
// Requests
// ============================================================================

/// Request for permissions on a chain
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRequest {
    pub id: String,
    pub version: String,
    pub sender_id: String,
    pub origin: Origin,
    pub content: ChainPermissionRequest,
}

impl PermissionRequest {
    /// Metadata announced by the requesting app
    pub fn app_metadata(&self) -> &AppMetadata {
        self.content.app_metadata()
    }
}

/// Request for a chain operation
#[derive(Debug, Clone, PartialEq)]
pub struct BlockchainRequest {
    pub id: String,
    pub version: String,
    pub sender_id: String,
    pub origin: Origin,
    /// Metadata of the sending app, resolved from storage
    pub app_metadata: Option<AppMetadata>,
    /// Account the request acts on, when the wire format carries it
    pub account_id: Option<String>,
    pub content: ChainBlockchainRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeaconRequest {
    Permission(PermissionRequest),
    Blockchain(BlockchainRequest),
}

impl BeaconRequest {
    pub fn id(&self) -> &str {
        match self {
            BeaconRequest::Permission(request) => &request.id,
            BeaconRequest::Blockchain(request) => &request.id,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            BeaconRequest::Permission(request) => &request.version,
            BeaconRequest::Blockchain(request) => &request.version,
        }
    }

    pub fn sender_id(&self) -> &str {
        match self {
            BeaconRequest::Permission(request) => &request.sender_id,
            BeaconRequest::Blockchain(request) => &request.sender_id,
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            BeaconRequest::Permission(request) => &request.origin,
            BeaconRequest::Blockchain(request) => &request.origin,
        }
    }

    pub fn app_metadata(&self) -> Option<&AppMetadata> {
        match self {
            BeaconRequest::Permission(request) => Some(request.app_metadata()),
            BeaconRequest::Blockchain(request) => request.app_metadata.as_ref(),
        }
    }

    pub fn blockchain_identifier(&self) -> &'static str {
        match self {
            BeaconRequest::Permission(request) => request.content.blockchain_identifier(),
            BeaconRequest::Blockchain(request) => request.content.blockchain_identifier(),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionResponse {
    pub id: String,
    pub version: String,
    pub origin: Origin,
    pub content: ChainPermissionResponse,
}

impl PermissionResponse {
    /// Answer a permission request
    pub fn from_request(request: &PermissionRequest, content: ChainPermissionResponse) -> Self {
        Self {
            id: request.id.clone(),
            version: request.version.clone(),
            origin: request.origin.clone(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockchainResponse {
    pub id: String,
    pub version: String,
    pub origin: Origin,
    pub content: ChainBlockchainResponse,
}

impl BlockchainResponse {
    /// Answer a blockchain request
    pub fn from_request(request: &BlockchainRequest, content: ChainBlockchainResponse) -> Self {
        Self {
            id: request.id.clone(),
            version: request.version.clone(),
            origin: request.origin.clone(),
            content,
        }
    }
}

/// Receipt confirming a request reached the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgeResponse {
    pub id: String,
    pub version: String,
    pub origin: Origin,
}

impl AcknowledgeResponse {
    pub fn from_request(request: &BeaconRequest) -> Self {
        Self {
            id: request.id().to_string(),
            version: request.version().to_string(),
            origin: request.origin().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub id: String,
    pub version: String,
    pub origin: Origin,
    pub error_type: ErrorType,
    pub description: Option<String>,
}

impl ErrorResponse {
    /// Reject a request
    pub fn from_request(request: &BeaconRequest, error_type: ErrorType) -> Self {
        Self {
            id: request.id().to_string(),
            version: request.version().to_string(),
            origin: request.origin().clone(),
            error_type,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeaconResponse {
    Permission(PermissionResponse),
    Blockchain(BlockchainResponse),
    Acknowledge(AcknowledgeResponse),
    Error(ErrorResponse),
}

impl BeaconResponse {
    pub fn id(&self) -> &str {
        match self {
            BeaconResponse::Permission(response) => &response.id,
            BeaconResponse::Blockchain(response) => &response.id,
            BeaconResponse::Acknowledge(response) => &response.id,
            BeaconResponse::Error(response) => &response.id,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            BeaconResponse::Permission(response) => &response.version,
            BeaconResponse::Blockchain(response) => &response.version,
            BeaconResponse::Acknowledge(response) => &response.version,
            BeaconResponse::Error(response) => &response.version,
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            BeaconResponse::Permission(response) => &response.origin,
            BeaconResponse::Blockchain(response) => &response.origin,
            BeaconResponse::Acknowledge(response) => &response.origin,
            BeaconResponse::Error(response) => &response.origin,
        }
    }
}

// ============================================================================
// Disconnect
// ============================================================================

/// Notice that the sender tore down the pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectMessage {
    pub id: String,
    pub version: String,
    pub sender_id: String,
    pub origin: Origin,
}

// ============================================================================
// Canonical Message
// ============================================================================

/// Version-independent message
#[derive(Debug, Clone, PartialEq)]
pub enum BeaconMessage {
    Request(BeaconRequest),
    Response(BeaconResponse),
    Disconnect(DisconnectMessage),
}

impl BeaconMessage {
    pub fn id(&self) -> &str {
        match self {
            BeaconMessage::Request(request) => request.id(),
            BeaconMessage::Response(response) => response.id(),
            BeaconMessage::Disconnect(disconnect) => &disconnect.id,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            BeaconMessage::Request(request) => request.version(),
            BeaconMessage::Response(response) => response.version(),
            BeaconMessage::Disconnect(disconnect) => &disconnect.version,
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            BeaconMessage::Request(request) => request.origin(),
            BeaconMessage::Response(response) => response.origin(),
            BeaconMessage::Disconnect(disconnect) => &disconnect.origin,
        }
    }

    /// Short name of the message kind, used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            BeaconMessage::Request(BeaconRequest::Permission(_)) => "permission_request",
            BeaconMessage::Request(BeaconRequest::Blockchain(request)) => {
                request.content.message_type()
            }
            BeaconMessage::Response(BeaconResponse::Permission(_)) => "permission_response",
            BeaconMessage::Response(BeaconResponse::Blockchain(response)) => {
                response.content.message_type()
            }
            BeaconMessage::Response(BeaconResponse::Acknowledge(_)) => "acknowledge",
            BeaconMessage::Response(BeaconResponse::Error(_)) => "error",
            BeaconMessage::Disconnect(_) => "disconnect",
        }
    }
}

impl From<BeaconRequest> for BeaconMessage {
    fn from(request: BeaconRequest) -> Self {
        BeaconMessage::Request(request)
    }
}

impl From<BeaconResponse> for BeaconMessage {
    fn from(response: BeaconResponse) -> Self {
        BeaconMessage::Response(response)
    }
}
