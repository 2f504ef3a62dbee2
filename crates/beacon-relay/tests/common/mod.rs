//! Mock relay backend and fixtures shared by the test modules

use async_trait::async_trait;
use beacon_relay::api::{
    CreateRoomRequest, CreateRoomResponse, JoinRoomResponse, LoginRequest, LoginResponse,
    SendEventResponse, SyncParams, SyncResponse, TextMessageContent,
};
use beacon_relay::{RelayBackend, RelayClient, RelayConfig, RelayError, Result, Scheduler};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const RELAY: &str = "relay.example.com";
pub const WALLET_HASH: &str = "aa11aa11";
pub const DAPP_HASH: &str = "bb22bb22";
pub const NOW_MILLIS: i64 = 1_700_000_000_000;

pub fn wallet_user() -> String {
    format!("@{WALLET_HASH}:{RELAY}")
}

pub fn dapp_user() -> String {
    format!("@{DAPP_HASH}:{RELAY}")
}

pub fn config() -> RelayConfig {
    RelayConfig::new(format!("https://{RELAY}"))
}

/// Scheduler that never sleeps and reads a fixed clock
#[derive(Debug, Default)]
pub struct ImmediateScheduler;

#[async_trait]
impl Scheduler for ImmediateScheduler {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }

    fn now_millis(&self) -> i64 {
        NOW_MILLIS
    }
}

/// Event sent through the mock backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEvent {
    pub room_id: String,
    pub txn_id: String,
    pub body: String,
}

/// Scripted relay backend.
///
/// Sync results are served in order. Once the script is exhausted the next
/// sync cancels `exhausted` (if set) and returns an empty batch, otherwise it
/// never completes, like a long poll with nothing to deliver.
pub struct MockBackend {
    pub login_response: Mutex<Result<LoginResponse>>,
    sync_script: Mutex<VecDeque<Result<SyncResponse>>>,
    exhausted: Option<CancellationToken>,
    pub sync_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub sync_params: Mutex<Vec<SyncParams>>,
    pub created_rooms: Mutex<Vec<CreateRoomRequest>>,
    pub joined_rooms: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<SentEvent>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            login_response: Mutex::new(Ok(LoginResponse {
                user_id: Some(wallet_user()),
                device_id: Some("device".to_string()),
                access_token: Some("token".to_string()),
            })),
            sync_script: Mutex::new(VecDeque::new()),
            exhausted: None,
            sync_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            sync_params: Mutex::new(Vec::new()),
            created_rooms: Mutex::new(Vec::new()),
            joined_rooms: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sync(self, result: Result<SyncResponse>) -> Self {
        self.push_sync(result);
        self
    }

    /// Append to the script of a backend already in use
    pub fn push_sync(&self, result: Result<SyncResponse>) {
        self.sync_script.lock().push_back(result);
    }

    /// Script `count` network failures
    pub fn with_sync_failures(self, count: usize) -> Self {
        (0..count).fold(self, |backend, i| {
            backend.with_sync(Err(RelayError::Network(format!("connection reset #{i}"))))
        })
    }

    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.exhausted = Some(token);
        self
    }

    pub fn sync_count(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Most sync calls ever outstanding at the same time
    pub fn max_concurrent_syncs(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Counts a sync call as outstanding until it returns or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelayBackend for MockBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse> {
        match &*self.login_response.lock() {
            Ok(response) => Ok(response.clone()),
            Err(err) => Err(RelayError::Network(err.to_string())),
        }
    }

    async fn sync(&self, _access_token: &str, params: &SyncParams) -> Result<SyncResponse> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.sync_params.lock().push(params.clone());
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let next = self.sync_script.lock().pop_front();
        match next {
            Some(result) => result,
            None => match &self.exhausted {
                Some(token) => {
                    token.cancel();
                    Ok(SyncResponse::default())
                }
                None => std::future::pending().await,
            },
        }
    }

    async fn create_room(
        &self,
        _access_token: &str,
        request: &CreateRoomRequest,
    ) -> Result<CreateRoomResponse> {
        let mut created = self.created_rooms.lock();
        created.push(request.clone());
        Ok(CreateRoomResponse {
            room_id: Some(format!("!created{}:{RELAY}", created.len())),
        })
    }

    async fn join_room(&self, _access_token: &str, room_id: &str) -> Result<JoinRoomResponse> {
        self.joined_rooms.lock().push(room_id.to_string());
        Ok(JoinRoomResponse {
            room_id: Some(room_id.to_string()),
        })
    }

    async fn send_event(
        &self,
        _access_token: &str,
        room_id: &str,
        txn_id: &str,
        content: &TextMessageContent,
    ) -> Result<SendEventResponse> {
        self.sent.lock().push(SentEvent {
            room_id: room_id.to_string(),
            txn_id: txn_id.to_string(),
            body: content.body.clone(),
        });
        Ok(SendEventResponse {
            event_id: Some("$event".to_string()),
        })
    }
}

/// Client over `backend` that never sleeps
pub fn client(backend: Arc<MockBackend>) -> RelayClient {
    RelayClient::with_backend(config(), backend).with_scheduler(Arc::new(ImmediateScheduler))
}

/// Sync response parsed from relay JSON
pub fn sync_response(value: Value) -> SyncResponse {
    serde_json::from_value(value).unwrap()
}

/// Membership state event
pub fn member_event(member: &str, membership: &str) -> Value {
    json!({
        "type": "m.room.member",
        "sender": member,
        "state_key": member,
        "content": { "membership": membership }
    })
}

/// `m.text` timeline event
pub fn text_event(sender: &str, body: &str) -> Value {
    json!({
        "type": "m.room.message",
        "sender": sender,
        "content": { "msgtype": "m.text", "body": body }
    })
}
