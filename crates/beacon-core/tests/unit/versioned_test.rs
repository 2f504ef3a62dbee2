//! Unit tests for versioned wire decoding

use crate::common::{DAPP_ID, app_metadata, wallet_origin, paired_storage};
use beacon_core::chain::substrate::{SubstrateBlockchainResponse, SubstrateOutcome};
use beacon_core::chain::tezos::{SigningType, TezosBlockchainRequest};
use beacon_core::chain::{ChainBlockchainRequest, ChainBlockchainResponse};
use beacon_core::message::versioned::v1::V1Content;
use beacon_core::message::versioned::v3::V3Content;
use beacon_core::{
    BeaconMessage, BeaconRequest, BeaconResponse, ChainRegistry, Error, ProtocolVersion,
    StorageManager, VersionedMessage,
};
use serde_json::json;

// ============================================================================
// Discriminators
// ============================================================================

#[test]
fn test_unknown_type_rejected_at_every_version() {
    let v1 = json!({ "type": "teleport_request", "version": "1", "id": "1", "beaconId": "a" });
    let v2 = json!({ "type": "teleport_request", "version": "2", "id": "1", "senderId": "a" });
    let v3 = json!({
        "id": "1",
        "version": "3",
        "senderId": "a",
        "message": { "type": "teleport_request" }
    });

    for (raw, expected_version) in [(v1, "1"), (v2, "2"), (v3, "3")] {
        let err = VersionedMessage::decode(&raw.to_string(), None).unwrap_err();
        match err {
            Error::UnknownType {
                version,
                message_type,
            } => {
                assert_eq!(version, expected_version);
                assert_eq!(message_type, "teleport_request");
            }
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }
}

#[test]
fn test_version_sniffing() {
    let raw = json!({ "type": "disconnect", "version": "1", "id": "1", "beaconId": "a" });
    let message = VersionedMessage::decode(&raw.to_string(), Some("3")).unwrap();

    assert_eq!(message.protocol_version(), ProtocolVersion::V1);
    assert_eq!(message.sender_id(), "a");
    assert_eq!(message.message_type(), "disconnect");
}

#[test]
fn test_v1_wire_uses_beacon_id() {
    let raw = json!({ "type": "disconnect", "version": "1", "id": "1", "beaconId": "a" });
    let message = VersionedMessage::decode(&raw.to_string(), None).unwrap();

    let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
    assert_eq!(json["beaconId"], "a");
    assert!(json.get("senderId").is_none());

    let VersionedMessage::V1(v1) = message else {
        panic!("expected V1");
    };
    assert_eq!(v1.content, V1Content::Disconnect);
}

// ============================================================================
// Tri-state Substrate responses
// ============================================================================

fn substrate_transfer_response(data: serde_json::Value) -> String {
    json!({
        "id": "transfer-1",
        "version": "3",
        "senderId": "wallet",
        "message": {
            "type": "blockchain_response",
            "blockchainIdentifier": "substrate",
            "blockchainData": data
        }
    })
    .to_string()
}

async fn canonical_transfer(data: serde_json::Value) -> beacon_core::Result<SubstrateOutcome> {
    let storage = paired_storage().await;
    let registry = ChainRegistry::with_defaults();

    let message = VersionedMessage::decode(&substrate_transfer_response(data), None)?;
    match message.to_canonical(wallet_origin(), &storage, &registry).await? {
        BeaconMessage::Response(BeaconResponse::Blockchain(response)) => match response.content {
            ChainBlockchainResponse::Substrate(SubstrateBlockchainResponse::Transfer(outcome)) => {
                Ok(outcome)
            }
            other => panic!("unexpected content {other:?}"),
        },
        other => panic!("unexpected message {other:?}"),
    }
}

#[tokio::test]
async fn test_transfer_response_hash_only_is_broadcast() {
    let outcome = canonical_transfer(json!({
        "type": "transfer_response",
        "transactionHash": "0xabc",
        "payload": null
    }))
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SubstrateOutcome::Broadcast {
            transaction_hash: "0xabc".to_string()
        }
    );
}

#[tokio::test]
async fn test_transfer_response_both_fields() {
    let outcome = canonical_transfer(json!({
        "type": "transfer_response",
        "transactionHash": "0xabc",
        "payload": "0xdef"
    }))
    .await
    .unwrap();

    assert!(matches!(outcome, SubstrateOutcome::BroadcastAndReturn { .. }));
}

#[tokio::test]
async fn test_transfer_response_payload_only_is_return() {
    let outcome = canonical_transfer(json!({ "type": "transfer_response", "payload": "0xdef" }))
        .await
        .unwrap();

    assert_eq!(outcome.payload(), Some("0xdef"));
    assert_eq!(outcome.transaction_hash(), None);
}

#[tokio::test]
async fn test_transfer_response_without_fields_is_invalid() {
    let err = canonical_transfer(json!({ "type": "transfer_response" }))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidMessage(_)));
}

// ============================================================================
// Canonicalization
// ============================================================================

#[tokio::test]
async fn test_request_enriched_with_stored_app_metadata() {
    let storage = paired_storage().await;
    let raw = json!({
        "type": "sign_payload_request",
        "version": "2",
        "id": "sign-1",
        "senderId": DAPP_ID,
        "signingType": "micheline",
        "payload": "05",
        "sourceAddress": "tz1source"
    });

    let message = VersionedMessage::decode(&raw.to_string(), None).unwrap();
    let canonical = message
        .to_canonical(
            beacon_core::Origin::p2p("dapp-hash"),
            &storage,
            &ChainRegistry::with_defaults(),
        )
        .await
        .unwrap();

    let BeaconMessage::Request(BeaconRequest::Blockchain(request)) = canonical else {
        panic!("expected blockchain request");
    };
    assert_eq!(request.app_metadata, Some(app_metadata()));
    assert!(matches!(
        request.content,
        ChainBlockchainRequest::Tezos(TezosBlockchainRequest::SignPayload(ref content))
            if content.signing_type == SigningType::Micheline
    ));
}

#[tokio::test]
async fn test_request_without_stored_metadata_still_decodes() {
    let storage = StorageManager::in_memory();
    let raw = json!({
        "type": "broadcast_request",
        "version": "2",
        "id": "b-1",
        "senderId": "unknown-dapp",
        "network": { "type": "ghostnet" },
        "signedTransaction": "abcd"
    });

    let message = VersionedMessage::decode(&raw.to_string(), None).unwrap();
    let canonical = message
        .to_canonical(
            beacon_core::Origin::p2p("dapp-hash"),
            &storage,
            &ChainRegistry::with_defaults(),
        )
        .await
        .unwrap();

    let BeaconMessage::Request(request) = canonical else {
        panic!("expected request");
    };
    assert!(request.app_metadata().is_none());
}

#[tokio::test]
async fn test_unregistered_chain_rejected() {
    let storage = paired_storage().await;
    let raw = json!({
        "id": "1",
        "version": "3",
        "senderId": DAPP_ID,
        "message": {
            "type": "permission_request",
            "blockchainIdentifier": "ethereum",
            "blockchainData": {}
        }
    });

    let message = VersionedMessage::decode(&raw.to_string(), None).unwrap();
    let VersionedMessage::V3(v3) = &message else {
        panic!("expected V3");
    };
    assert_eq!(v3.message.blockchain_identifier(), Some("ethereum"));
    assert!(matches!(v3.message, V3Content::PermissionRequest { .. }));

    let err = message
        .to_canonical(wallet_origin(), &storage, &ChainRegistry::with_defaults())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedChain(chain) if chain == "ethereum"));
}
