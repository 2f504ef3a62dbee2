//! # Beacon Relay
//!
//! Relay layer of the Beacon relay SDK: keeps a session with a relay node,
//! long-polls it for events and carries Beacon messages between peers.
//!
//! ## Features
//!
//! - **Relay Client**: login, room management, text messages and event subscription
//! - **Poll Engine**: long-poll sync loop with bounded retries
//! - **State Store**: serialized session state with event dispatch
//! - **P2P Transport**: versioned Beacon messages over relay rooms
//!
//! ## Sync Flow
//!
//! ```text
//! RelayClient::start
//!    │ login
//!    ▼
//! RelayStore ◄── OnSyncSuccess / OnSyncFailure ── PollEngine ──► relay /sync
//!    │
//!    ▼ events
//! listeners ──► P2pTransport ──► IncomingMessage
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use beacon_relay::{P2pTransport, RelayClient, RelayConfig};
//!
//! let client = Arc::new(RelayClient::new(RelayConfig::new("https://beacon-node-1.sky.papers.tech"))?);
//! client.start(&public_key_hash_hex, &login_signature, &device_id).await?;
//!
//! let transport = Arc::new(P2pTransport::new(client, storage, registry, sender_id));
//! transport.connect();
//!
//! let mut incoming = transport.subscribe();
//! while let Ok(message) = incoming.recv().await {
//!     // handle message.message
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod poll;
pub mod service;
pub mod store;
pub mod transport;

pub use client::RelayClient;
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use event::{Event, EventContent, EventKind, MemberChange, RoomStatus, RoomUpdate, SyncBatch};
pub use poll::{PollEngine, PollExit, PollStatus, Scheduler, TokioScheduler};
pub use service::{HttpRelayBackend, RelayBackend};
pub use store::{ListenerId, RelayState, RelayStore, Room, StoreIntent};
pub use transport::{IncomingMessage, P2pTransport, PayloadCipher, PlaintextCipher};

/// Re-export core types for convenience
pub use beacon_core::{BeaconMessage, Identifier, Peer, ProtocolVersion};
