//! Peer-to-peer transport over the relay
//!
//! Turns relay text messages into canonical Beacon messages and back:
//!
//! ```text
//! incoming: TextMessage ─► open ─► decode ─► to_canonical ─► broadcast
//! outgoing: BeaconMessage ─► from_canonical(peer version) ─► seal ─► room ─► send_text
//! ```
//!
//! Payload encryption is a collaborator ([`PayloadCipher`]); the transport only
//! decides who a payload is sealed for and who it was opened from.

use crate::client::RelayClient;
use crate::event::{Event, EventContent, EventKind};
use crate::store::ListenerId;
use crate::{RelayError, Result};
use beacon_core::{
    AppMetadata, BeaconMessage, ChainRegistry, Identifier, Origin, Peer, StorageManager,
    VersionedMessage,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Seals outgoing and opens incoming payloads
pub trait PayloadCipher: Send + Sync {
    /// Encrypt `message` for `recipient`
    fn seal(&self, recipient: &Identifier, message: &str) -> Result<String>;

    /// Decrypt a payload received from `sender`
    fn open(&self, sender: &Identifier, payload: &str) -> Result<String>;
}

/// Cipher that passes payloads through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl PayloadCipher for PlaintextCipher {
    fn seal(&self, _recipient: &Identifier, message: &str) -> Result<String> {
        Ok(message.to_string())
    }

    fn open(&self, _sender: &Identifier, payload: &str) -> Result<String> {
        Ok(payload.to_string())
    }
}

/// Message received from a peer
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub message: BeaconMessage,
    pub sender: Identifier,
    pub room_id: String,
    /// App the message came from, for disconnects and sign-payload responses
    pub app_metadata: Option<AppMetadata>,
}

/// Capacity of the incoming message channel
const INCOMING_CAPACITY: usize = 64;

/// Beacon message transport over a [`RelayClient`]
pub struct P2pTransport {
    client: Arc<RelayClient>,
    storage: StorageManager,
    registry: Arc<ChainRegistry>,
    cipher: Arc<dyn PayloadCipher>,
    /// Sender id written on outgoing messages
    sender_id: String,
    incoming: broadcast::Sender<IncomingMessage>,
    listeners: Mutex<Vec<ListenerId>>,
    /// Rooms created for peers that have not joined yet, keyed by peer identifier
    pending_rooms: Mutex<HashMap<String, String>>,
}

impl P2pTransport {
    pub fn new(
        client: Arc<RelayClient>,
        storage: StorageManager,
        registry: Arc<ChainRegistry>,
        sender_id: impl Into<String>,
    ) -> Self {
        let (incoming, _) = broadcast::channel(INCOMING_CAPACITY);
        Self {
            client,
            storage,
            registry,
            cipher: Arc::new(PlaintextCipher),
            sender_id: sender_id.into(),
            incoming,
            listeners: Mutex::new(Vec::new()),
            pending_rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn PayloadCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Receive decoded messages
    pub fn subscribe(&self) -> broadcast::Receiver<IncomingMessage> {
        self.incoming.subscribe()
    }

    /// Start handling relay events.
    ///
    /// Events are queued by the relay listeners and handled in order on a
    /// spawned task, which ends on [`P2pTransport::disconnect`].
    pub fn connect(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut listeners = self.listeners.lock();
        for kind in [EventKind::TextMessage, EventKind::Invite] {
            let tx = tx.clone();
            listeners.push(self.client.subscribe(kind, move |event| {
                let _ = tx.send(event.clone());
            }));
        }
        drop(listeners);

        let transport = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(err) = transport.handle_event(&event).await {
                    warn!(room_id = %event.room_id, error = %err, "Dropping relay event");
                }
            }
            debug!("Transport event loop ended");
        });
    }

    /// Stop handling relay events
    pub fn disconnect(&self) {
        for id in self.listeners.lock().drain(..) {
            self.client.unsubscribe(id);
        }
    }

    /// Handle one relay event: join rooms we are invited to, decode messages
    pub async fn handle_event(&self, event: &Event) -> Result<()> {
        match &event.content {
            EventContent::Invite { member } => {
                if self.is_own(member).await {
                    self.client.join_room(&event.room_id).await?;
                }
                Ok(())
            }
            EventContent::TextMessage { body } => {
                let Some(sender) = event.sender.as_deref() else {
                    return Ok(());
                };
                if let Some(incoming) = self.receive(sender, body, &event.room_id).await? {
                    debug!(
                        room_id = %incoming.room_id,
                        message_id = %incoming.message.id(),
                        "Received Beacon message"
                    );
                    // No subscribers is not an error
                    let _ = self.incoming.send(incoming);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn receive(
        &self,
        sender: &str,
        body: &str,
        room_id: &str,
    ) -> Result<Option<IncomingMessage>> {
        let sender = Identifier::parse(sender)?;
        if self.is_own_hash(&sender.public_key_hash_hex()).await {
            return Ok(None);
        }

        let payload = self.cipher.open(&sender, body)?;
        let versioned = VersionedMessage::decode(&payload, None)?;
        let message = versioned
            .to_canonical(Origin::from_identifier(&sender), &self.storage, &self.registry)
            .await?;

        let app_metadata = self
            .storage
            .find_app_metadata(|app: &AppMetadata| versioned.comes_from(app))
            .await?;

        if let (BeaconMessage::Disconnect(_), Some(app)) = (&message, &app_metadata) {
            let removed = self.storage.remove_app_permissions(&app.sender_id).await?;
            info!(sender_id = %app.sender_id, removed, "Peer disconnected, permissions removed");
        }

        // The peer is reachable in this room from now on
        self.pending_rooms.lock().remove(&sender.format());

        Ok(Some(IncomingMessage {
            message,
            sender,
            room_id: room_id.to_string(),
            app_metadata,
        }))
    }

    /// Send a message to a peer in its protocol version
    pub async fn send(&self, message: &BeaconMessage, peer: &Peer) -> Result<()> {
        let version = peer.protocol_version()?;
        let versioned =
            VersionedMessage::from_canonical(message, version, &self.sender_id, &self.registry)?;
        let recipient = peer.identifier()?;
        let sealed = self.cipher.seal(&recipient, &versioned.to_json()?)?;

        let room_id = self.room_for(&recipient).await?;
        debug!(room_id = %room_id, message_id = %message.id(), %version, "Sending Beacon message");
        self.client.send_text(&sealed, &room_id).await
    }

    /// Joined room shared with `recipient`, creating a private one if needed
    async fn room_for(&self, recipient: &Identifier) -> Result<String> {
        let member = recipient.format();

        if let Some(room) = self
            .client
            .joined_rooms()
            .await
            .into_iter()
            .find(|room| room.has_member(&member))
        {
            return Ok(room.id);
        }
        let pending = self.pending_rooms.lock().get(&member).cloned();
        if let Some(room_id) = pending {
            return Ok(room_id);
        }

        let room = self
            .client
            .create_private_room(vec![member.clone()])
            .await?
            .ok_or_else(|| RelayError::RoomNotFound(member.clone()))?;
        self.pending_rooms.lock().insert(member, room.id.clone());
        Ok(room.id)
    }

    async fn is_own(&self, member: &str) -> bool {
        match Identifier::parse(member) {
            Ok(identifier) => self.is_own_hash(&identifier.public_key_hash_hex()).await,
            Err(_) => false,
        }
    }

    async fn is_own_hash(&self, hash: &str) -> bool {
        self.client
            .user_id()
            .await
            .is_some_and(|user| user.eq_ignore_ascii_case(hash))
    }
}

impl std::fmt::Debug for P2pTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2pTransport")
            .field("sender_id", &self.sender_id)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
