//! Relay client
//!
//! Public face of the relay layer: session start and stop, room queries, room
//! management, message sending and event subscription. All state lives in the
//! shared [`RelayStore`]; the backend calls are stateless.

use crate::api::{CreateRoomRequest, LoginRequest, TextMessageContent};
use crate::config::RelayConfig;
use crate::event::{Event, EventKind, RoomStatus};
use crate::poll::{PollEngine, PollExit, PollStatus, Scheduler, TokioScheduler};
use crate::service::{HttpRelayBackend, RelayBackend};
use crate::store::{ListenerId, RelayState, RelayStore, Room, StoreIntent};
use crate::{RelayError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Running poll loop
struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<PollExit>,
}

/// Client for one relay session
pub struct RelayClient {
    config: RelayConfig,
    backend: Arc<dyn RelayBackend>,
    store: Arc<RelayStore>,
    scheduler: Arc<dyn Scheduler>,
    status: Arc<watch::Sender<PollStatus>>,
    /// Kept after `stop` until the next `start` has retired it
    poller: Mutex<Option<Poller>>,
}

impl RelayClient {
    /// Create a client talking HTTP to the relay node in `config`
    pub fn new(config: RelayConfig) -> Result<Self> {
        let backend = HttpRelayBackend::new(config.clone())?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Create a client over any backend
    pub fn with_backend(config: RelayConfig, backend: Arc<dyn RelayBackend>) -> Self {
        let (status, _) = watch::channel(PollStatus::Idle);
        Self {
            config,
            backend,
            store: Arc::new(RelayStore::new()),
            scheduler: Arc::new(TokioScheduler),
            status: Arc::new(status),
            poller: Mutex::new(None),
        }
    }

    /// Replace the scheduler used for poll delays and transaction ids
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Log in and start polling.
    ///
    /// Resolves with the outcome of the first sync. Polling goes on in the
    /// background after a failed first sync until retries run out.
    ///
    /// A loop left by an earlier `start` is ended first, dropping its in-flight
    /// sync, so only one sync call is ever outstanding.
    pub async fn start(&self, user: &str, password: &str, device_id: &str) -> Result<()> {
        self.retire_poller().await;

        let response = self
            .backend
            .login(&LoginRequest::password(user, password, device_id))
            .await?;
        let access_token = response.access_token.ok_or_else(|| {
            RelayError::Login("login succeeded but no access token was provided".to_string())
        })?;

        self.store
            .intent(StoreIntent::Initialize {
                user_id: user.to_string(),
                device_id: device_id.to_string(),
                access_token,
            })
            .await;
        info!(user = %user, device_id = %device_id, "Logged in to relay");

        let (first_sync_tx, first_sync_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let engine = PollEngine::new(
            &self.config,
            self.backend.clone(),
            self.store.clone(),
            self.scheduler.clone(),
            self.status.clone(),
        );
        let token = cancel.clone();
        let handle = tokio::spawn(async move { engine.run(token, Some(first_sync_tx)).await });

        let previous = self.poller.lock().replace(Poller { cancel, handle });
        if let Some(previous) = previous {
            // Lost a race with a concurrent start
            previous.cancel.cancel();
            previous.handle.abort();
        }

        first_sync_rx.await.unwrap_or(Err(RelayError::Stopped))
    }

    /// Stop polling; an in-flight sync completes and its result is discarded
    pub fn stop(&self) {
        if let Some(poller) = self.poller.lock().as_ref() {
            debug!("Stopping relay client");
            poller.cancel.cancel();
        }
    }

    /// End the previous poll loop and wait until it is gone
    async fn retire_poller(&self) {
        let previous = self.poller.lock().take();
        let Some(Poller { cancel, handle }) = previous else {
            return;
        };

        cancel.cancel();
        handle.abort();
        if let Ok(exit) = handle.await {
            debug!(?exit, "Previous poll loop had already ended");
        }
        // An aborted loop never reports its own exit
        self.status.send_if_modified(|status| {
            let running = *status == PollStatus::Polling;
            if running {
                *status = PollStatus::Stopped;
            }
            running
        });
    }

    /// Watch the poll loop state
    pub fn poll_status(&self) -> watch::Receiver<PollStatus> {
        self.status.subscribe()
    }

    // ========================================================================
    // State
    // ========================================================================

    pub async fn state(&self) -> RelayState {
        self.store.state().await
    }

    /// User id of the logged-in session
    pub async fn user_id(&self) -> Option<String> {
        self.store.state().await.user_id
    }

    pub async fn joined_rooms(&self) -> Vec<Room> {
        self.store.state().await.joined_rooms()
    }

    pub async fn invited_rooms(&self) -> Vec<Room> {
        self.store.state().await.invited_rooms()
    }

    pub async fn left_rooms(&self) -> Vec<Room> {
        self.store.state().await.left_rooms()
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    /// Create a direct, trusted private room inviting `members`.
    ///
    /// Returns `None` when the relay did not report the new room id.
    pub async fn create_private_room(&self, members: Vec<String>) -> Result<Option<Room>> {
        let access_token = self.store.access_token("create_private_room").await?;
        let response = self
            .backend
            .create_room(&access_token, &CreateRoomRequest::trusted_private(members))
            .await?;

        let Some(room_id) = response.room_id else {
            return Ok(None);
        };
        info!(room_id = %room_id, "Created private room");

        let room = Room::new(room_id, RoomStatus::Unknown);
        self.store
            .intent(StoreIntent::OnRoomCreated { room: room.clone() })
            .await;
        Ok(Some(room))
    }

    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        let access_token = self.store.access_token("join_room").await?;
        self.backend.join_room(&access_token, room_id).await?;
        info!(room_id = %room_id, "Joined room");
        Ok(())
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Send a text message to a room
    pub async fn send_text(&self, message: &str, room_id: &str) -> Result<()> {
        let access_token = self.store.access_token("send").await?;
        let txn_id = self
            .store
            .next_transaction_id(self.scheduler.now_millis())
            .await;

        self.backend
            .send_event(
                &access_token,
                room_id,
                &txn_id,
                &TextMessageContent::new(message),
            )
            .await?;
        Ok(())
    }

    /// Send binary payload, hex encoded, to a room
    pub async fn send_payload(&self, payload: &[u8], room_id: &str) -> Result<()> {
        self.send_text(&hex::encode(payload), room_id).await
    }

    /// Call `listener` for every event of `kind`, in dispatch order
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.store.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.unsubscribe(id)
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("homeserver_url", &self.config.homeserver_url)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}
