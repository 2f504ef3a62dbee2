//! Relay backend services
//!
//! Stateless request/response calls against the relay node. Every call that
//! needs authentication takes the access token explicitly; the state needed to
//! obtain one lives in the [`RelayStore`](crate::store::RelayStore).

use crate::api::{
    CreateRoomRequest, CreateRoomResponse, JoinRoomResponse, LoginRequest, LoginResponse,
    MatrixErrorBody, SendEventResponse, SyncParams, SyncResponse, TextMessageContent,
};
use crate::config::RelayConfig;
use crate::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Calls the relay client depends on
#[async_trait]
pub trait RelayBackend: Send + Sync {
    /// Password login
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;

    /// Fetch events since the cursor in `params`, long-polling up to its timeout
    async fn sync(&self, access_token: &str, params: &SyncParams) -> Result<SyncResponse>;

    async fn create_room(
        &self,
        access_token: &str,
        request: &CreateRoomRequest,
    ) -> Result<CreateRoomResponse>;

    async fn join_room(&self, access_token: &str, room_id: &str) -> Result<JoinRoomResponse>;

    /// Send an `m.room.message` event, deduplicated by `txn_id`
    async fn send_event(
        &self,
        access_token: &str,
        room_id: &str,
        txn_id: &str,
        content: &TextMessageContent,
    ) -> Result<SendEventResponse>;
}

/// [`RelayBackend`] speaking the client-server HTTP API
#[derive(Debug, Clone)]
pub struct HttpRelayBackend {
    config: RelayConfig,
    client: Client,
}

impl HttpRelayBackend {
    /// Create a backend for the relay node in `config`
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Endpoint URL with `segments` appended as encoded path segments
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint(""))
            .map_err(|e| RelayError::Network(format!("invalid relay URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RelayError::Network("relay URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let error: MatrixErrorBody = serde_json::from_str(&body).unwrap_or_default();
        Err(RelayError::Http {
            status: status.as_u16(),
            errcode: error.errcode,
            message: error.error.unwrap_or(body),
        })
    }
}

#[async_trait]
impl RelayBackend for HttpRelayBackend {
    // ========================================================================
    // Auth
    // ========================================================================

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        debug!(user = %request.identifier.user, device_id = %request.device_id, "Logging in");
        let url = self.url(&["login"])?;
        self.execute(self.client.post(url).json(request)).await
    }

    // ========================================================================
    // Events
    // ========================================================================

    async fn sync(&self, access_token: &str, params: &SyncParams) -> Result<SyncResponse> {
        let url = self.url(&["sync"])?;
        self.execute(
            self.client
                .get(url)
                .bearer_auth(access_token)
                .query(&params.query()),
        )
        .await
    }

    async fn send_event(
        &self,
        access_token: &str,
        room_id: &str,
        txn_id: &str,
        content: &TextMessageContent,
    ) -> Result<SendEventResponse> {
        debug!(room_id = %room_id, txn_id = %txn_id, "Sending message");
        let url = self.url(&["rooms", room_id, "send", "m.room.message", txn_id])?;
        self.execute(self.client.put(url).bearer_auth(access_token).json(content))
            .await
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    async fn create_room(
        &self,
        access_token: &str,
        request: &CreateRoomRequest,
    ) -> Result<CreateRoomResponse> {
        debug!(invite = ?request.invite, "Creating room");
        let url = self.url(&["createRoom"])?;
        self.execute(self.client.post(url).bearer_auth(access_token).json(request))
            .await
    }

    async fn join_room(&self, access_token: &str, room_id: &str) -> Result<JoinRoomResponse> {
        debug!(room_id = %room_id, "Joining room");
        let url = self.url(&["rooms", room_id, "join"])?;
        self.execute(
            self.client
                .post(url)
                .bearer_auth(access_token)
                .json(&serde_json::json!({})),
        )
        .await
    }
}
