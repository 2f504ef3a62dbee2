//! Storage collaborator interface
//!
//! Peers, app metadata, permissions and bookkeeping values are persisted by an
//! external key-value store. This module defines:
//!
//! - **Storage**: the object-safe backend trait (raw JSON values by key)
//! - **MemoryStorage**: in-memory backend (testing, embedding)
//! - **StorageManager**: typed collection access on top of any backend
//!
//! "Not found" is never an error: missing keys read as empty collections, and
//! writing an empty collection removes its key.
//!
//! ## Example
//!
//! ```rust,ignore
//! use beacon_core::storage::{MemoryStorage, StorageManager};
//!
//! let storage = StorageManager::new(Arc::new(MemoryStorage::new()));
//! storage.set_peers(&[peer]).await?;
//! let peers = storage.get_peers().await?;
//! ```

use crate::types::{AppMetadataRecord, LegacyPermission, Peer, PermissionRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Well-known storage keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Peers,
    AppMetadata,
    Permissions,
    SdkVersion,
    Migrations,
}

impl StorageKey {
    /// Raw key name
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Peers => "peers",
            StorageKey::AppMetadata => "appMetadata",
            StorageKey::Permissions => "permissions",
            StorageKey::SdkVersion => "sdkVersion",
            StorageKey::Migrations => "migrations",
        }
    }

    /// Key name, suffixed with a schema version tag for legacy records
    pub fn versioned(&self, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}_{}", self.as_str(), version),
            None => self.as_str().to_string(),
        }
    }
}

/// Trait for key-value storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Check if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Typed access to the collections persisted by a [`Storage`] backend
#[derive(Clone)]
pub struct StorageManager {
    storage: Arc<dyn Storage>,
}

impl StorageManager {
    /// Wrap a storage backend
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Manager over a fresh [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    // ========================================================================
    // Peers
    // ========================================================================

    pub async fn get_peers(&self) -> Result<Vec<Peer>> {
        self.get_collection(StorageKey::Peers.as_str()).await
    }

    pub async fn set_peers(&self, peers: &[Peer]) -> Result<()> {
        self.set_collection(StorageKey::Peers.as_str(), peers).await
    }

    /// Insert peers, replacing stored ones with the same id
    pub async fn add_peers(&self, peers: &[Peer]) -> Result<()> {
        let mut stored = self.get_peers().await?;
        stored.retain(|existing| !peers.iter().any(|p| p.id == existing.id));
        stored.extend_from_slice(peers);
        self.set_peers(&stored).await
    }

    pub async fn find_peer<F>(&self, predicate: F) -> Result<Option<Peer>>
    where
        F: Fn(&Peer) -> bool + Send,
    {
        Ok(self.get_peers().await?.into_iter().find(|p| predicate(p)))
    }

    // ========================================================================
    // App Metadata
    // ========================================================================

    pub async fn get_app_metadata<T: AppMetadataRecord>(&self) -> Result<Vec<T>> {
        self.get_collection(StorageKey::AppMetadata.as_str()).await
    }

    pub async fn set_app_metadata<T: AppMetadataRecord>(&self, app_metadata: &[T]) -> Result<()> {
        self.set_collection(StorageKey::AppMetadata.as_str(), app_metadata)
            .await
    }

    /// Insert app metadata, replacing a stored entry with the same sender id
    pub async fn add_app_metadata<T: AppMetadataRecord + Clone>(&self, app_metadata: T) -> Result<()> {
        let mut stored: Vec<T> = self.get_app_metadata().await?;
        stored.retain(|existing| existing.sender_id() != app_metadata.sender_id());
        stored.push(app_metadata);
        self.set_app_metadata(&stored).await
    }

    pub async fn find_app_metadata<T, F>(&self, predicate: F) -> Result<Option<T>>
    where
        T: AppMetadataRecord,
        F: Fn(&T) -> bool + Send,
    {
        let stored: Vec<T> = self.get_app_metadata().await?;
        Ok(stored.into_iter().find(|m| predicate(m)))
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    pub async fn get_permissions<T: PermissionRecord>(&self) -> Result<Vec<T>> {
        self.get_collection(StorageKey::Permissions.as_str()).await
    }

    pub async fn set_permissions<T: PermissionRecord>(&self, permissions: &[T]) -> Result<()> {
        self.set_collection(StorageKey::Permissions.as_str(), permissions)
            .await
    }

    /// Remove every permission matching `predicate`, returning how many were removed
    pub async fn remove_permissions<T, F>(&self, predicate: F) -> Result<usize>
    where
        T: PermissionRecord,
        F: Fn(&T) -> bool + Send,
    {
        let stored: Vec<T> = self.get_permissions().await?;
        let before = stored.len();
        let kept: Vec<T> = stored.into_iter().filter(|p| !predicate(p)).collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.set_permissions(&kept).await?;
        }

        Ok(removed)
    }

    /// Remove the permissions of one app across every chain.
    ///
    /// Works on the raw records, so permissions of chains the caller has no
    /// type for are removed too.
    pub async fn remove_app_permissions(&self, sender_id: &str) -> Result<usize> {
        let key = StorageKey::Permissions.as_str();
        let stored: Vec<Value> = self.get_collection(key).await?;
        let before = stored.len();
        let kept: Vec<Value> = stored
            .into_iter()
            .filter(|record| record.get("senderId").and_then(Value::as_str) != Some(sender_id))
            .collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.set_collection(key, &kept).await?;
        }

        Ok(removed)
    }

    /// Read permission records persisted under an older schema
    pub async fn get_legacy_permissions<T: LegacyPermission>(&self) -> Result<Vec<T>> {
        let key = StorageKey::Permissions.versioned(Some(T::FROM_VERSION));
        self.get_collection(&key).await
    }

    pub async fn set_legacy_permissions<T: LegacyPermission>(&self, permissions: &[T]) -> Result<()> {
        let key = StorageKey::Permissions.versioned(Some(T::FROM_VERSION));
        self.set_collection(&key, permissions).await
    }

    // ========================================================================
    // SDK
    // ========================================================================

    pub async fn get_sdk_version(&self) -> Result<Option<String>> {
        match self.storage.get(StorageKey::SdkVersion.as_str()).await? {
            Some(Value::String(version)) => Ok(Some(version)),
            Some(other) => Err(Error::Storage(format!(
                "sdk version is not a string: {other}"
            ))),
            None => Ok(None),
        }
    }

    pub async fn set_sdk_version(&self, version: &str) -> Result<()> {
        self.storage
            .set(StorageKey::SdkVersion.as_str(), Value::String(version.to_string()))
            .await
    }

    pub async fn get_migrations(&self) -> Result<HashSet<String>> {
        let migrations: Vec<String> = self.get_collection(StorageKey::Migrations.as_str()).await?;
        Ok(migrations.into_iter().collect())
    }

    pub async fn set_migrations(&self, migrations: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<&String> = migrations.iter().collect();
        sorted.sort();
        self.set_collection(StorageKey::Migrations.as_str(), &sorted)
            .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn get_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.storage.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Storage(format!("corrupted '{key}' collection: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    async fn set_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        if items.is_empty() {
            self.storage.remove(key).await
        } else {
            self.storage.set(key, serde_json::to_value(items)?).await
        }
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager").finish_non_exhaustive()
    }
}
