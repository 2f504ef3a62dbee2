//! Relay client-server API bodies
//!
//! Request and response shapes of the Matrix client-server r0 API, limited to
//! the endpoints the relay client talks to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Login
// ============================================================================

/// `POST /login` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub login_type: String,
    pub identifier: UserIdentifier,
    pub password: String,
    pub device_id: String,
}

impl LoginRequest {
    /// Password login for a plain user id
    pub fn password(
        user: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            login_type: "m.login.password".to_string(),
            identifier: UserIdentifier {
                id_type: "m.id.user".to_string(),
                user: user.into(),
            },
            password: password.into(),
            device_id: device_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentifier {
    #[serde(rename = "type")]
    pub id_type: String,
    pub user: String,
}

/// `POST /login` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

// ============================================================================
// Sync
// ============================================================================

/// Query parameters of `GET /sync`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncParams {
    /// Cursor returned by the previous sync
    pub since: Option<String>,
    /// Long-poll timeout in milliseconds
    pub timeout: Option<u64>,
}

impl SyncParams {
    /// Query pairs in request order
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(since) = &self.since {
            query.push(("since", since.clone()));
        }
        if let Some(timeout) = self.timeout {
            query.push(("timeout", timeout.to_string()));
        }
        query
    }
}

/// `GET /sync` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub next_batch: Option<String>,
    #[serde(default)]
    pub rooms: Option<SyncRooms>,
}

/// Room deltas of a sync, keyed by room id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: BTreeMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: BTreeMap<String, InvitedRoom>,
    #[serde(default)]
    pub leave: BTreeMap<String, LeftRoom>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub state: EventList,
    #[serde(default)]
    pub timeline: EventList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvitedRoom {
    #[serde(default)]
    pub invite_state: EventList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeftRoom {
    #[serde(default)]
    pub state: EventList,
    #[serde(default)]
    pub timeline: EventList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Event as delivered by the relay, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

// ============================================================================
// Rooms
// ============================================================================

/// Room preset understood by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPreset {
    PrivateChat,
    PublicChat,
    TrustedPrivateChat,
}

/// `POST /createRoom` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<String>,
    pub preset: RoomPreset,
    pub is_direct: bool,
}

impl CreateRoomRequest {
    /// Direct, trusted private room inviting `members`
    pub fn trusted_private(members: Vec<String>) -> Self {
        Self {
            room_version: None,
            invite: members,
            preset: RoomPreset::TrustedPrivateChat,
            is_direct: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    #[serde(default)]
    pub room_id: Option<String>,
}

// ============================================================================
// Events
// ============================================================================

/// `m.room.message` body of type `m.text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessageContent {
    pub msgtype: String,
    pub body: String,
}

impl TextMessageContent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.text".to_string(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEventResponse {
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixErrorBody {
    #[serde(default)]
    pub errcode: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
