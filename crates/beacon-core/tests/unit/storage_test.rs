//! Unit tests for the storage manager

use beacon_core::chain::substrate::{SubstratePermission, SubstrateScope};
use beacon_core::chain::tezos::{TezosNetwork, TezosPermission, TezosScope};
use beacon_core::{AppMetadata, MemoryStorage, Storage, StorageKey, StorageManager};
use std::sync::Arc;

fn tezos_permission(account: &str, sender: &str) -> TezosPermission {
    TezosPermission {
        account_id: account.to_string(),
        sender_id: sender.to_string(),
        connected_at: 1_700_000_000_000,
        address: "tz1address".to_string(),
        public_key: "edpk".to_string(),
        network: TezosNetwork::mainnet(),
        scopes: vec![TezosScope::OperationRequest],
        app_metadata: AppMetadata::new(sender, "dApp"),
    }
}

#[tokio::test]
async fn test_permissions_round_trip_per_chain() {
    let storage = StorageManager::in_memory();
    storage
        .set_permissions(&[tezos_permission("acc-1", "dapp")])
        .await
        .unwrap();

    let permissions: Vec<TezosPermission> = storage.get_permissions().await.unwrap();
    assert_eq!(permissions, vec![tezos_permission("acc-1", "dapp")]);
}

#[tokio::test]
async fn test_remove_permissions_by_sender() {
    let storage = StorageManager::in_memory();
    storage
        .set_permissions(&[
            tezos_permission("acc-1", "dapp-a"),
            tezos_permission("acc-2", "dapp-b"),
            tezos_permission("acc-3", "dapp-a"),
        ])
        .await
        .unwrap();

    let removed = storage
        .remove_permissions(|p: &TezosPermission| p.sender_id == "dapp-a")
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let remaining: Vec<TezosPermission> = storage.get_permissions().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].account_id, "acc-2");
}

#[tokio::test]
async fn test_corrupted_collection_reports_storage_error() {
    let backend = Arc::new(MemoryStorage::new());
    backend
        .set(StorageKey::Permissions.as_str(), serde_json::json!({ "not": "a list" }))
        .await
        .unwrap();

    let storage = StorageManager::new(backend);
    let result = storage.get_permissions::<SubstratePermission>().await;
    assert!(matches!(result, Err(beacon_core::Error::Storage(_))));
}

#[tokio::test]
async fn test_legacy_permissions_use_versioned_key() {
    let backend = Arc::new(MemoryStorage::new());
    let storage = StorageManager::new(backend.clone());

    let legacy = beacon_core::chain::tezos::LegacyTezosPermission {
        account_identifier: "acc".to_string(),
        address: "tz1".to_string(),
        network: TezosNetwork::mainnet(),
        scopes: vec![TezosScope::Sign],
        sender_id: "dapp".to_string(),
        app_metadata: AppMetadata::new("dapp", "dApp"),
        public_key: "edpk".to_string(),
        connected_at: 0,
    };
    storage.set_legacy_permissions(&[legacy]).await.unwrap();

    assert!(backend.get("permissions_2.0.0").await.unwrap().is_some());
    assert!(backend.get("permissions").await.unwrap().is_none());
}

#[test]
fn test_substrate_scope_wire_names() {
    let json = serde_json::to_string(&SubstrateScope::SignPayloadJson).unwrap();
    assert_eq!(json, "\"sign_payload_json\"");
}
