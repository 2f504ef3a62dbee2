//! Normalized relay events
//!
//! A sync response is flattened into a [`SyncBatch`]: the room deltas it
//! implies and the events it carried, in delivery order. Only the event types
//! the client acts on are recognized; everything else is kept as
//! [`EventContent::Unknown`] so listeners can still see it.

use crate::api::{EventList, RawEvent, SyncResponse};
use serde_json::Value;

/// Event kinds listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Invite,
    Join,
    Leave,
    TextMessage,
    Unknown,
}

/// Decoded event body
#[derive(Debug, Clone, PartialEq)]
pub enum EventContent {
    /// Room created by `creator`
    Create { creator: Option<String> },
    /// `member` was invited
    Invite { member: String },
    /// `member` joined
    Join { member: String },
    /// `member` left or was removed
    Leave { member: String },
    /// `m.text` message
    TextMessage { body: String },
    /// Any other event type
    Unknown { event_type: String, content: Value },
}

/// Event received in a room
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub room_id: String,
    /// User id of the sender
    pub sender: Option<String>,
    pub content: EventContent,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self.content {
            EventContent::Create { .. } => EventKind::Create,
            EventContent::Invite { .. } => EventKind::Invite,
            EventContent::Join { .. } => EventKind::Join,
            EventContent::Leave { .. } => EventKind::Leave,
            EventContent::TextMessage { .. } => EventKind::TextMessage,
            EventContent::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// Normalize a raw event delivered for `room_id`
    pub fn from_raw(room_id: &str, raw: RawEvent) -> Self {
        let content = match raw.event_type.as_str() {
            "m.room.create" => EventContent::Create {
                creator: string_field(&raw.content, "creator"),
            },
            "m.room.member" => member_content(&raw),
            "m.room.message" if msgtype(&raw.content) == Some("m.text") => {
                match string_field(&raw.content, "body") {
                    Some(body) => EventContent::TextMessage { body },
                    None => unknown(raw.event_type.clone(), raw.content.clone()),
                }
            }
            _ => unknown(raw.event_type.clone(), raw.content.clone()),
        };

        Self {
            room_id: room_id.to_string(),
            sender: raw.sender,
            content,
        }
    }

    /// Member the event is about, for membership events
    pub fn member(&self) -> Option<&str> {
        match &self.content {
            EventContent::Invite { member }
            | EventContent::Join { member }
            | EventContent::Leave { member } => Some(member),
            _ => None,
        }
    }
}

fn member_content(raw: &RawEvent) -> EventContent {
    let member = raw
        .state_key
        .clone()
        .or_else(|| raw.sender.clone())
        .unwrap_or_default();

    match string_field(&raw.content, "membership").as_deref() {
        Some("invite") => EventContent::Invite { member },
        Some("join") => EventContent::Join { member },
        Some("leave") | Some("ban") => EventContent::Leave { member },
        _ => unknown(raw.event_type.clone(), raw.content.clone()),
    }
}

fn unknown(event_type: String, content: Value) -> EventContent {
    EventContent::Unknown {
        event_type,
        content,
    }
}

fn msgtype(content: &Value) -> Option<&str> {
    content.get("msgtype").and_then(Value::as_str)
}

fn string_field(content: &Value, field: &str) -> Option<String> {
    content.get(field).and_then(Value::as_str).map(str::to_string)
}

// ============================================================================
// Sync Batches
// ============================================================================

/// Membership status of a room from the local user's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoomStatus {
    /// Created locally, not yet seen in a sync
    #[default]
    Unknown,
    Invited,
    Joined,
    Left,
}

/// Membership change of one room member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberChange {
    Joined(String),
    Left(String),
}

/// Room status change implied by a sync
#[derive(Debug, Clone, PartialEq)]
pub struct RoomUpdate {
    pub id: String,
    pub status: RoomStatus,
    /// Membership changes in delivery order; the last one per member wins
    pub members: Vec<MemberChange>,
}

impl RoomUpdate {
    pub fn new(id: impl Into<String>, status: RoomStatus) -> Self {
        Self {
            id: id.into(),
            status,
            members: Vec::new(),
        }
    }
}

/// Normalized outcome of one successful sync call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncBatch {
    /// Cursor for the next sync
    pub next_batch: Option<String>,
    pub rooms: Vec<RoomUpdate>,
    /// Events in delivery order: joined, invited, then left rooms
    pub events: Vec<Event>,
}

impl From<SyncResponse> for SyncBatch {
    fn from(response: SyncResponse) -> Self {
        let mut batch = SyncBatch {
            next_batch: response.next_batch,
            ..Default::default()
        };
        let Some(rooms) = response.rooms else {
            return batch;
        };

        for (id, room) in rooms.join {
            batch.push_room(id, RoomStatus::Joined, [room.state, room.timeline]);
        }
        for (id, room) in rooms.invite {
            batch.push_room(id, RoomStatus::Invited, [room.invite_state]);
        }
        for (id, room) in rooms.leave {
            batch.push_room(id, RoomStatus::Left, [room.state, room.timeline]);
        }

        batch
    }
}

impl SyncBatch {
    fn push_room<const N: usize>(&mut self, id: String, status: RoomStatus, lists: [EventList; N]) {
        let events: Vec<Event> = lists
            .into_iter()
            .flat_map(|list| list.events)
            .map(|raw| Event::from_raw(&id, raw))
            .collect();

        let mut update = RoomUpdate::new(id, status);
        update.members = events
            .iter()
            .filter_map(|event| match &event.content {
                EventContent::Join { member } => Some(MemberChange::Joined(member.clone())),
                EventContent::Leave { member } => Some(MemberChange::Left(member.clone())),
                _ => None,
            })
            .collect();

        self.rooms.push(update);
        self.events.extend(events);
    }
}
