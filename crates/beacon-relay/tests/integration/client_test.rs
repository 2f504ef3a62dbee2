//! Relay client facade over a mock backend

use crate::common::{
    MockBackend, NOW_MILLIS, client, dapp_user, member_event, sync_response, text_event,
};
use beacon_relay::api::{LoginResponse, RoomPreset};
use beacon_relay::{EventContent, EventKind, PollStatus, RelayError, RoomStatus};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn rooms_sync() -> beacon_relay::api::SyncResponse {
    sync_response(json!({
        "next_batch": "s1",
        "rooms": {
            "join": {
                "!a:relay": {
                    "state": { "events": [member_event(&dapp_user(), "join")] },
                    "timeline": { "events": [
                        text_event(&dapp_user(), "first"),
                        text_event(&dapp_user(), "second")
                    ]}
                }
            },
            "invite": {
                "!b:relay": { "invite_state": { "events": [member_event("@cc:relay", "invite")] } }
            },
            "leave": {
                "!c:relay": { "timeline": { "events": [member_event("@dd:relay", "leave")] } }
            }
        }
    }))
}

// ============================================================================
// Start
// ============================================================================

#[tokio::test]
async fn test_start_resolves_after_first_sync() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let backend = Arc::new(MockBackend::new().with_sync(Ok(rooms_sync())));
    let client = client(backend.clone());
    let status = client.poll_status();

    client.start("aa11aa11", "password", "device").await.unwrap();

    assert_eq!(*status.borrow(), PollStatus::Polling);
    let state = client.state().await;
    assert_eq!(state.access_token.as_deref(), Some("token"));
    assert_eq!(state.user_id.as_deref(), Some("aa11aa11"));
    assert_eq!(state.sync_token.as_deref(), Some("s1"));

    client.stop();
}

#[tokio::test]
async fn test_start_without_access_token_fails() {
    let backend = Arc::new(MockBackend::new());
    *backend.login_response.lock() = Ok(LoginResponse {
        user_id: Some("@aa11aa11:relay".to_string()),
        device_id: None,
        access_token: None,
    });
    let client = client(backend.clone());

    let err = client.start("aa11aa11", "password", "device").await.unwrap_err();

    assert!(matches!(err, RelayError::Login(_)));
    assert_eq!(backend.sync_count(), 0);
    assert_eq!(*client.poll_status().borrow(), PollStatus::Idle);
    assert!(client.state().await.access_token.is_none());
}

#[tokio::test]
async fn test_start_reports_first_sync_failure() {
    let backend = Arc::new(MockBackend::new().with_sync_failures(1));
    let client = client(backend);

    let err = client.start("aa11aa11", "password", "device").await.unwrap_err();
    assert!(matches!(err, RelayError::Network(_)));
    assert!(err.is_retryable());

    client.stop();
}

#[tokio::test]
async fn test_operations_require_authorization() {
    let backend = Arc::new(MockBackend::new());
    let client = client(backend.clone());

    let err = client.send_text("hello", "!a:relay").await.unwrap_err();
    assert!(matches!(err, RelayError::RequiresAuthorization(op) if op == "send"));

    let err = client
        .create_private_room(vec![dapp_user()])
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::RequiresAuthorization(_)));

    assert!(backend.sent.lock().is_empty());
    assert!(backend.created_rooms.lock().is_empty());
}

/// Wait for the background poll loop to make `count` sync calls
async fn wait_for_syncs(backend: &MockBackend, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while backend.sync_count() < count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("sync calls not made");
}

#[tokio::test]
async fn test_restart_after_halt_gets_fresh_retry_budget() {
    let backend = Arc::new(MockBackend::new().with_sync_failures(3));
    let client = client(backend.clone());
    let mut status = client.poll_status();

    assert!(client.start("aa11aa11", "password", "device").await.is_err());
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|status| *status == PollStatus::Halted),
    )
    .await
    .expect("loop never halted")
    .unwrap();
    assert_eq!(backend.sync_count(), 3);
    assert_eq!(client.state().await.polling_retries, 3);

    // One more failure must not halt the restarted loop
    backend.push_sync(Err(RelayError::Network("connection reset".to_string())));
    backend.push_sync(Ok(sync_response(json!({ "next_batch": "s1" }))));
    let err = client.start("aa11aa11", "password", "device").await.unwrap_err();
    assert!(matches!(err, RelayError::Network(_)));

    wait_for_syncs(&backend, 5).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.state().await.sync_token.is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("restarted loop never synced");

    let state = client.state().await;
    assert_eq!(state.sync_token.as_deref(), Some("s1"));
    assert_eq!(state.polling_retries, 0);
    assert_eq!(*client.poll_status().borrow(), PollStatus::Polling);
    assert!(backend.sync_count() >= 5);

    client.stop();
}

#[tokio::test]
async fn test_restart_while_polling_replaces_loop() {
    let backend = Arc::new(MockBackend::new().with_sync(Ok(sync_response(json!({ "next_batch": "s1" })))));
    let client = client(backend.clone());
    client.start("aa11aa11", "password", "device").await.unwrap();

    // The first loop is parked in its second sync
    wait_for_syncs(&backend, 2).await;

    backend.push_sync(Ok(sync_response(json!({ "next_batch": "s2" }))));
    client.start("aa11aa11", "password", "device").await.unwrap();

    wait_for_syncs(&backend, 4).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(*client.poll_status().borrow(), PollStatus::Polling);
    assert_eq!(backend.max_concurrent_syncs(), 1);
    assert_eq!(client.state().await.sync_token.as_deref(), Some("s2"));
    assert_eq!(backend.sync_params.lock()[2].since.as_deref(), Some("s1"));

    client.stop();
}

// ============================================================================
// Rooms
// ============================================================================

#[tokio::test]
async fn test_room_status_filtering() {
    let backend = Arc::new(MockBackend::new().with_sync(Ok(rooms_sync())));
    let client = client(backend);
    client.start("aa11aa11", "password", "device").await.unwrap();

    let ids = |rooms: Vec<beacon_relay::Room>| -> Vec<String> {
        rooms.into_iter().map(|room| room.id).collect()
    };
    assert_eq!(ids(client.joined_rooms().await), vec!["!a:relay"]);
    assert_eq!(ids(client.invited_rooms().await), vec!["!b:relay"]);
    assert_eq!(ids(client.left_rooms().await), vec!["!c:relay"]);

    let joined = client.joined_rooms().await;
    assert!(joined[0].has_member(&dapp_user()));

    client.stop();
}

#[tokio::test]
async fn test_create_private_room() {
    let backend = Arc::new(MockBackend::new().with_sync(Ok(sync_response(json!({ "next_batch": "s1" })))));
    let client = client(backend.clone());
    client.start("aa11aa11", "password", "device").await.unwrap();

    let room = client
        .create_private_room(vec![dapp_user()])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(room.status, RoomStatus::Unknown);
    let requests = backend.created_rooms.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].invite, vec![dapp_user()]);
    assert_eq!(requests[0].preset, RoomPreset::TrustedPrivateChat);
    assert!(requests[0].is_direct);

    // Known locally, but not joined until a sync says so
    assert!(client.state().await.rooms.contains_key(&room.id));
    assert!(client.joined_rooms().await.is_empty());

    client.stop();
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_mints_increasing_transaction_ids() {
    let backend = Arc::new(MockBackend::new().with_sync(Ok(sync_response(json!({ "next_batch": "s1" })))));
    let client = client(backend.clone());
    client.start("aa11aa11", "password", "device").await.unwrap();

    client.send_text("one", "!a:relay").await.unwrap();
    client.send_text("two", "!a:relay").await.unwrap();
    client.send_payload(&[0xde, 0xad], "!b:relay").await.unwrap();

    let sent = backend.sent.lock().clone();
    let txn_ids: Vec<String> = sent.iter().map(|event| event.txn_id.clone()).collect();
    assert_eq!(
        txn_ids,
        vec![
            format!("m{NOW_MILLIS}.0"),
            format!("m{NOW_MILLIS}.1"),
            format!("m{NOW_MILLIS}.2"),
        ]
    );
    assert_eq!(sent[2].body, "dead");
    assert_eq!(sent[2].room_id, "!b:relay");

    client.stop();
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_listeners_receive_events_in_order() {
    let backend = Arc::new(MockBackend::new().with_sync(Ok(rooms_sync())));
    let client = client(backend);

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    client.subscribe(EventKind::TextMessage, move |event| {
        if let EventContent::TextMessage { body } = &event.content {
            sink.lock().push((event.room_id.clone(), body.clone()));
        }
    });
    let invites = Arc::new(Mutex::new(Vec::new()));
    let sink = invites.clone();
    client.subscribe(EventKind::Invite, move |event| {
        sink.lock().push(event.member().map(str::to_string));
    });

    client.start("aa11aa11", "password", "device").await.unwrap();

    assert_eq!(
        *messages.lock(),
        vec![
            ("!a:relay".to_string(), "first".to_string()),
            ("!a:relay".to_string(), "second".to_string()),
        ]
    );
    assert_eq!(*invites.lock(), vec![Some("@cc:relay".to_string())]);

    client.stop();
}

#[tokio::test]
async fn test_stop_lets_in_flight_sync_finish() {
    let backend = Arc::new(MockBackend::new().with_sync(Ok(sync_response(json!({ "next_batch": "s1" })))));
    let client = client(backend);
    client.start("aa11aa11", "password", "device").await.unwrap();

    let mut status = client.poll_status();
    client.stop();

    // The loop is parked in a sync call that never completes; stopping only
    // prevents further calls, so the status stays Polling until it returns.
    assert_eq!(*status.borrow_and_update(), PollStatus::Polling);
}
