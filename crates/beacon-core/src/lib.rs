//! # Beacon Core
//!
//! Protocol layer of the Beacon relay SDK, letting a dApp and a wallet
//! exchange permission and signing requests over an untrusted relay network.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Identifiers**: `@<hex(public key hash)>:<relay host>` peer addresses
//! - **Message Model**: canonical, chain-extensible requests and responses
//! - **Versioned Protocol**: V1, V2 and V3 wire formats mapped to and from the canonical model
//! - **Chain Handlers**: Tezos and Substrate content behind a pluggable registry
//! - **Storage Interface**: key-value collaborator trait, typed manager and migrations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use beacon_core::{ChainRegistry, Origin, StorageManager, VersionedMessage};
//!
//! let registry = ChainRegistry::with_defaults();
//! let storage = StorageManager::in_memory();
//!
//! // Decode a raw wire message and lift it into the canonical model
//! let versioned = VersionedMessage::decode(raw, None)?;
//! let message = versioned.to_canonical(Origin::p2p(sender_hash), &storage, &registry).await?;
//!
//! // Answer in the peer's protocol version
//! let reply = VersionedMessage::from_canonical(&response, ProtocolVersion::V2, &my_id, &registry)?;
//! let raw = reply.to_json()?;
//! ```

pub mod chain;
pub mod error;
pub mod identifier;
pub mod message;
pub mod migration;
pub mod storage;
pub mod types;

pub use chain::{BlockchainHandler, ChainRegistry};
pub use error::{Error, Result};
pub use identifier::Identifier;
pub use message::{
    AcknowledgeResponse, BeaconMessage, BeaconRequest, BeaconResponse, BlockchainRequest,
    BlockchainResponse, DisconnectMessage, ErrorResponse, PermissionRequest, PermissionResponse,
    VersionedMessage,
};
pub use migration::{LegacyTezosPermissionMigration, Migration, Migrator};
pub use storage::{MemoryStorage, Storage, StorageKey, StorageManager};
pub use types::{
    AppMetadata, ConnectionKind, ErrorType, Origin, Peer, PermissionRecord, ProtocolVersion,
};

/// SDK version, persisted by the migrator
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version used when a peer does not announce one
pub const DEFAULT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V2;
