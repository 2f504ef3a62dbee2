//! Invariant tests for message handling
//!
//! - Every response constructor copies the request id
//! - Responses are only canonicalized when they come from a paired peer
//! - Encoding never silently drops content a version cannot carry

use crate::common::{DAPP_ID, paired_storage, tezos_permission_request, tezos_sign_request};
use beacon_core::chain::tezos::{SigningType, TezosBlockchainResponse, TezosBroadcastResponse};
use beacon_core::chain::ChainBlockchainResponse;
use beacon_core::{
    AcknowledgeResponse, BeaconMessage, BeaconRequest, BeaconResponse, BlockchainResponse,
    ChainRegistry, Error, ErrorResponse, ErrorType, Origin, ProtocolVersion, VersionedMessage,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn responses_echo_request_id(id in "[A-Za-z0-9-]{1,36}", version in prop_oneof![Just("1"), Just("2"), Just("3")]) {
        let mut request = tezos_permission_request(version);
        if let BeaconRequest::Permission(ref mut permission) = request {
            permission.id = id.clone();
        }

        prop_assert_eq!(AcknowledgeResponse::from_request(&request).id, id.clone());
        prop_assert_eq!(ErrorResponse::from_request(&request, ErrorType::Unknown).id, id.clone());

        let mut blockchain = tezos_sign_request(version, SigningType::Raw);
        blockchain.id = id.clone();
        let response = BlockchainResponse::from_request(
            &blockchain,
            ChainBlockchainResponse::Tezos(TezosBlockchainResponse::Broadcast(
                TezosBroadcastResponse { transaction_hash: "oo".to_string() },
            )),
        );
        prop_assert_eq!(response.id, id);
        prop_assert_eq!(response.version, version);
    }
}

#[tokio::test]
async fn test_response_from_unknown_peer_rejected() {
    let registry = ChainRegistry::with_defaults();
    let storage = paired_storage().await;

    let request = tezos_permission_request("2");
    let ack = AcknowledgeResponse::from_request(&request);
    let message = BeaconMessage::Response(BeaconResponse::Acknowledge(ack));

    for version in [ProtocolVersion::V2, ProtocolVersion::V3] {
        let wire = VersionedMessage::from_canonical(&message, version, "wallet", &registry).unwrap();
        let err = wire
            .to_canonical(Origin::p2p("ffff"), &storage, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OriginMismatch(_)), "{version}: {err:?}");
    }
}

#[tokio::test]
async fn test_requests_need_no_paired_peer() {
    let registry = ChainRegistry::with_defaults();
    let storage = beacon_core::StorageManager::in_memory();

    let message = BeaconMessage::Request(tezos_permission_request("2"));
    let wire = VersionedMessage::from_canonical(&message, ProtocolVersion::V2, DAPP_ID, &registry)
        .unwrap();

    let canonical = wire
        .to_canonical(Origin::p2p("dapp-hash"), &storage, &registry)
        .await
        .unwrap();
    assert_eq!(canonical, message);
}

#[test]
fn test_acknowledge_never_encoded_as_v1() {
    let request = tezos_permission_request("1");
    let message = BeaconMessage::Response(BeaconResponse::Acknowledge(
        AcknowledgeResponse::from_request(&request),
    ));

    let result = VersionedMessage::from_canonical(
        &message,
        ProtocolVersion::V1,
        "wallet",
        &ChainRegistry::with_defaults(),
    );
    assert!(matches!(result, Err(Error::UnsupportedForVersion { .. })));
}
