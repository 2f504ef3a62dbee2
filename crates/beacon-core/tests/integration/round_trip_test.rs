//! Canonical round trip through every protocol version
//!
//! canonical -> wire -> JSON -> wire -> canonical must give back the original
//! message for every message a version can represent.

use crate::common::{
    DAPP_ID, paired_storage, tezos_permission_request, tezos_sign_request, wallet_origin,
};
use beacon_core::chain::tezos::{
    SigningType, TezosBlockchainResponse, TezosNetwork, TezosOperationResponse,
    TezosPermissionResponse, TezosScope, TezosSignPayloadResponse,
};
use beacon_core::chain::{ChainBlockchainResponse, ChainPermissionResponse};
use beacon_core::{
    AcknowledgeResponse, BeaconMessage, BeaconRequest, BeaconResponse, BlockchainResponse,
    ChainRegistry, DisconnectMessage, Error, ErrorResponse, ErrorType, Origin, PermissionResponse,
    ProtocolVersion, VersionedMessage,
};

async fn round_trip(message: &BeaconMessage, version: ProtocolVersion) -> BeaconMessage {
    let registry = ChainRegistry::with_defaults();
    let storage = paired_storage().await;

    let wire = VersionedMessage::from_canonical(message, version, DAPP_ID, &registry).unwrap();
    let raw = wire.to_json().unwrap();

    let decoded = VersionedMessage::decode(&raw, None).unwrap();
    assert_eq!(decoded, wire);

    decoded
        .to_canonical(message.origin().clone(), &storage, &registry)
        .await
        .unwrap()
}

fn permission_response(version: &str) -> BeaconMessage {
    let BeaconRequest::Permission(request) = tezos_permission_request(version) else {
        unreachable!()
    };
    let mut response = PermissionResponse::from_request(
        &request,
        ChainPermissionResponse::Tezos(TezosPermissionResponse {
            public_key: "edpk-wallet".to_string(),
            network: TezosNetwork::mainnet(),
            scopes: vec![TezosScope::OperationRequest],
        }),
    );
    response.origin = wallet_origin();
    BeaconMessage::Response(BeaconResponse::Permission(response))
}

fn sign_response(version: &str, signing_type: SigningType) -> BeaconMessage {
    let request = tezos_sign_request(version, signing_type);
    let mut response = BlockchainResponse::from_request(
        &request,
        ChainBlockchainResponse::Tezos(TezosBlockchainResponse::SignPayload(
            TezosSignPayloadResponse {
                signing_type,
                signature: "edsig-test".to_string(),
            },
        )),
    );
    response.origin = wallet_origin();
    BeaconMessage::Response(BeaconResponse::Blockchain(response))
}

fn error_response(version: &str, description: Option<&str>) -> BeaconMessage {
    let request = tezos_permission_request(version);
    let mut response = ErrorResponse::from_request(&request, ErrorType::NotGranted);
    response.origin = wallet_origin();
    response.description = description.map(str::to_string);
    BeaconMessage::Response(BeaconResponse::Error(response))
}

fn disconnect(version: &str) -> BeaconMessage {
    BeaconMessage::Disconnect(DisconnectMessage {
        id: "disconnect-1".to_string(),
        version: version.to_string(),
        sender_id: DAPP_ID.to_string(),
        origin: Origin::p2p("dapp-hash"),
    })
}

// ============================================================================
// V1
// ============================================================================

#[tokio::test]
async fn test_v1_round_trip() {
    let messages = vec![
        BeaconMessage::Request(tezos_permission_request("1")),
        BeaconMessage::Request(BeaconRequest::Blockchain(tezos_sign_request(
            "1",
            SigningType::Raw,
        ))),
        permission_response("1"),
        sign_response("1", SigningType::Raw),
        error_response("1", None),
        disconnect("1"),
    ];

    for message in messages {
        assert_eq!(round_trip(&message, ProtocolVersion::V1).await, message);
    }
}

#[test]
fn test_v1_rejects_non_raw_signing() {
    let message = BeaconMessage::Request(BeaconRequest::Blockchain(tezos_sign_request(
        "1",
        SigningType::Micheline,
    )));

    let err = VersionedMessage::from_canonical(
        &message,
        ProtocolVersion::V1,
        DAPP_ID,
        &ChainRegistry::with_defaults(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedForVersion { .. }));
}

// ============================================================================
// V2
// ============================================================================

#[tokio::test]
async fn test_v2_round_trip() {
    let request = tezos_permission_request("2");
    let mut ack = AcknowledgeResponse::from_request(&request);
    ack.origin = wallet_origin();

    let messages = vec![
        BeaconMessage::Request(request),
        BeaconMessage::Request(BeaconRequest::Blockchain(tezos_sign_request(
            "2",
            SigningType::Micheline,
        ))),
        permission_response("2"),
        sign_response("2", SigningType::Operation),
        BeaconMessage::Response(BeaconResponse::Acknowledge(ack)),
        error_response("2", None),
        disconnect("2"),
    ];

    for message in messages {
        assert_eq!(round_trip(&message, ProtocolVersion::V2).await, message);
    }
}

#[test]
fn test_v2_keeps_minor_version() {
    let message = disconnect("2.1.0");
    let wire = VersionedMessage::from_canonical(
        &message,
        ProtocolVersion::V2,
        DAPP_ID,
        &ChainRegistry::with_defaults(),
    )
    .unwrap();
    assert_eq!(wire.version(), "2.1.0");

    let downgraded = VersionedMessage::from_canonical(
        &message,
        ProtocolVersion::V1,
        DAPP_ID,
        &ChainRegistry::with_defaults(),
    )
    .unwrap();
    assert_eq!(downgraded.version(), "1");
}

// ============================================================================
// V3
// ============================================================================

#[tokio::test]
async fn test_v3_round_trip() {
    let request = tezos_permission_request("3");
    let mut ack = AcknowledgeResponse::from_request(&request);
    ack.origin = wallet_origin();

    let mut sign_request = tezos_sign_request("3", SigningType::Operation);
    sign_request.account_id = Some("account-1".to_string());

    let operation = {
        let mut response = BlockchainResponse::from_request(
            &sign_request,
            ChainBlockchainResponse::Tezos(TezosBlockchainResponse::Operation(
                TezosOperationResponse {
                    transaction_hash: "oo-hash".to_string(),
                },
            )),
        );
        response.origin = wallet_origin();
        BeaconMessage::Response(BeaconResponse::Blockchain(response))
    };

    let messages = vec![
        BeaconMessage::Request(request),
        BeaconMessage::Request(BeaconRequest::Blockchain(sign_request)),
        permission_response("3"),
        sign_response("3", SigningType::Raw),
        operation,
        BeaconMessage::Response(BeaconResponse::Acknowledge(ack)),
        error_response("3", Some("user declined")),
        disconnect("3"),
    ];

    for message in messages {
        assert_eq!(round_trip(&message, ProtocolVersion::V3).await, message);
    }
}

#[test]
fn test_v3_wire_shape() {
    let message = BeaconMessage::Request(tezos_permission_request("3"));
    let wire = VersionedMessage::from_canonical(
        &message,
        ProtocolVersion::V3,
        DAPP_ID,
        &ChainRegistry::with_defaults(),
    )
    .unwrap();

    let json = wire.to_value().unwrap();
    assert_eq!(json["senderId"], DAPP_ID);
    assert_eq!(json["message"]["type"], "permission_request");
    assert_eq!(json["message"]["blockchainIdentifier"], "tezos");
    assert_eq!(
        json["message"]["blockchainData"]["appMetadata"]["senderId"],
        DAPP_ID
    );
}
