//! Relay state store
//!
//! Single source of truth for the relay session. State only changes through
//! [`StoreIntent`]s, applied one at a time behind an async mutex, so readers
//! always see a fully applied transition.
//!
//! Events staged by a successful sync are handed to listeners after the
//! transition is applied and the lock is released, so a listener may read the
//! store (or call back into the client) without deadlocking.

use crate::event::{Event, EventKind, MemberChange, RoomStatus, RoomUpdate, SyncBatch};
use crate::{RelayError, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Room known to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: String,
    pub status: RoomStatus,
    /// Joined members, as far as syncs have told
    pub members: HashSet<String>,
}

impl Room {
    pub fn new(id: impl Into<String>, status: RoomStatus) -> Self {
        Self {
            id: id.into(),
            status,
            members: HashSet::new(),
        }
    }

    /// Apply a sync delta, membership changes in the order they were delivered
    fn update(&mut self, update: &RoomUpdate) {
        self.status = update.status;
        for change in &update.members {
            match change {
                MemberChange::Joined(member) => {
                    self.members.insert(member.clone());
                }
                MemberChange::Left(member) => {
                    self.members.remove(member);
                }
            }
        }
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.contains(member)
    }
}

/// Snapshot of the relay session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayState {
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub access_token: Option<String>,
    /// Cursor of the last successful sync
    pub sync_token: Option<String>,
    /// Long-poll timeout for the next sync, unset until the first success
    pub polling_timeout: Option<Duration>,
    pub rooms: HashMap<String, Room>,
    /// Consecutive failed syncs
    pub polling_retries: u32,
    pub transaction_counter: u64,
    /// A sync call is in flight
    pub is_polling: bool,
}

impl RelayState {
    pub fn rooms_with_status(&self, status: RoomStatus) -> Vec<Room> {
        self.rooms
            .values()
            .filter(|room| room.status == status)
            .cloned()
            .collect()
    }

    pub fn joined_rooms(&self) -> Vec<Room> {
        self.rooms_with_status(RoomStatus::Joined)
    }

    pub fn invited_rooms(&self) -> Vec<Room> {
        self.rooms_with_status(RoomStatus::Invited)
    }

    pub fn left_rooms(&self) -> Vec<Room> {
        self.rooms_with_status(RoomStatus::Left)
    }
}

/// State transitions
#[derive(Debug, Clone, PartialEq)]
pub enum StoreIntent {
    /// Record the session obtained by login and start a fresh retry budget
    Initialize {
        user_id: String,
        device_id: String,
        access_token: String,
    },
    /// A sync call is about to be made
    OnPollStarted,
    /// A sync call succeeded
    OnSyncSuccess {
        batch: SyncBatch,
        polling_timeout: Duration,
    },
    /// A sync call failed
    OnSyncFailure,
    /// A transaction id was handed out
    OnTxnIdCreated,
    /// A room was created locally
    OnRoomCreated { room: Room },
}

/// Listener for relay events
pub type EventListener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`RelayStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    kind: EventKind,
    listener: EventListener,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Serialized owner of [`RelayState`]
#[derive(Default)]
pub struct RelayStore {
    state: Mutex<RelayState>,
    listeners: RwLock<Listeners>,
}

impl RelayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transition, then dispatch any events it staged
    pub async fn intent(&self, intent: StoreIntent) {
        let staged = {
            let mut state = self.state.lock().await;
            apply(&mut state, intent)
        };

        self.dispatch(&staged);
    }

    /// Apply [`StoreIntent::OnSyncFailure`], returning the consecutive failure count
    pub async fn record_sync_failure(&self) -> u32 {
        let mut state = self.state.lock().await;
        apply(&mut state, StoreIntent::OnSyncFailure);
        state.polling_retries
    }

    /// Cloned snapshot of the current state
    pub async fn state(&self) -> RelayState {
        self.state.lock().await.clone()
    }

    /// Access token, or [`RelayError::RequiresAuthorization`] naming `operation`
    pub async fn access_token(&self, operation: &str) -> Result<String> {
        self.state
            .lock()
            .await
            .access_token
            .clone()
            .ok_or_else(|| RelayError::RequiresAuthorization(operation.to_string()))
    }

    /// Mint a transaction id `m<millis>.<counter>` and advance the counter
    pub async fn next_transaction_id(&self, now_millis: i64) -> String {
        let mut state = self.state.lock().await;
        let counter = state.transaction_counter;
        apply(&mut state, StoreIntent::OnTxnIdCreated);
        format!("m{now_millis}.{counter}")
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener called once for every event of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.subscriptions.push(Subscription {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.subscriptions.len();
        listeners.subscriptions.retain(|s| s.id != id);
        listeners.subscriptions.len() != before
    }

    fn dispatch(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }

        // Snapshot so listeners may subscribe or unsubscribe while being called
        let subscriptions: Vec<(EventKind, EventListener)> = self
            .listeners
            .read()
            .subscriptions
            .iter()
            .map(|s| (s.kind, s.listener.clone()))
            .collect();

        for event in events {
            let kind = event.kind();
            trace!(room_id = %event.room_id, ?kind, "Dispatching event");
            for (_, listener) in subscriptions.iter().filter(|(k, _)| *k == kind) {
                listener(event);
            }
        }
    }
}

impl std::fmt::Debug for RelayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStore")
            .field("listeners", &self.listeners.read().subscriptions.len())
            .finish_non_exhaustive()
    }
}

/// Apply one transition, returning events to dispatch
fn apply(state: &mut RelayState, intent: StoreIntent) -> Vec<Event> {
    match intent {
        StoreIntent::Initialize {
            user_id,
            device_id,
            access_token,
        } => {
            state.user_id = Some(user_id);
            state.device_id = Some(device_id);
            state.access_token = Some(access_token);
            state.polling_retries = 0;
            state.is_polling = false;
            Vec::new()
        }
        StoreIntent::OnPollStarted => {
            state.is_polling = true;
            Vec::new()
        }
        StoreIntent::OnSyncSuccess {
            batch,
            polling_timeout,
        } => {
            if batch.next_batch.is_some() {
                state.sync_token = batch.next_batch;
            }
            state.polling_timeout = Some(polling_timeout);
            state.polling_retries = 0;
            state.is_polling = false;

            for update in &batch.rooms {
                state
                    .rooms
                    .entry(update.id.clone())
                    .or_insert_with(|| Room::new(update.id.clone(), RoomStatus::Unknown))
                    .update(update);
            }

            debug!(
                rooms = batch.rooms.len(),
                events = batch.events.len(),
                sync_token = ?state.sync_token,
                "Sync applied"
            );
            batch.events
        }
        StoreIntent::OnSyncFailure => {
            state.polling_retries += 1;
            state.is_polling = false;
            Vec::new()
        }
        StoreIntent::OnTxnIdCreated => {
            state.transaction_counter += 1;
            Vec::new()
        }
        StoreIntent::OnRoomCreated { room } => {
            state.rooms.entry(room.id.clone()).or_insert(room);
            Vec::new()
        }
    }
}
