//! Storage migrations
//!
//! Migrations run once per store: the identifiers of applied migrations are
//! recorded under the `migrations` key and skipped on later runs. After a run
//! the stored SDK version is bumped to the running one.

use crate::chain::tezos::LegacyTezosPermission;
use crate::storage::StorageManager;
use crate::types::{LegacyPermission, PermissionRecord};
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// A one-shot storage upgrade
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique identifier recorded once the migration has run
    fn identifier(&self) -> String;

    async fn apply(&self, storage: &StorageManager) -> Result<()>;
}

/// Runs registered migrations that have not been applied yet
pub struct Migrator {
    storage: StorageManager,
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    pub fn new(storage: StorageManager) -> Self {
        Self {
            storage,
            migrations: Vec::new(),
        }
    }

    /// Migrator with every migration shipped by this crate
    pub fn with_defaults(storage: StorageManager) -> Self {
        Self::new(storage).with_migration(LegacyPermissionMigration::<LegacyTezosPermission>::new())
    }

    pub fn with_migration(mut self, migration: impl Migration + 'static) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    /// Apply pending migrations in registration order.
    ///
    /// Returns the identifiers of the migrations applied by this call. A
    /// failing migration aborts the run; migrations applied before it stay
    /// recorded.
    pub async fn migrate(&self, sdk_version: &str) -> Result<Vec<String>> {
        let mut applied = self.storage.get_migrations().await?;
        let mut ran = Vec::new();

        for migration in &self.migrations {
            let identifier = migration.identifier();
            if applied.contains(&identifier) {
                debug!(migration = %identifier, "Migration already applied");
                continue;
            }

            migration.apply(&self.storage).await?;
            info!(migration = %identifier, "Applied storage migration");

            applied.insert(identifier.clone());
            self.storage.set_migrations(&applied).await?;
            ran.push(identifier);
        }

        self.storage.set_sdk_version(sdk_version).await?;
        Ok(ran)
    }
}

/// Moves permission records of an older schema into the current collection
pub struct LegacyPermissionMigration<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> LegacyPermissionMigration<T> {
    pub fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Default for LegacyPermissionMigration<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Migration of Tezos permissions persisted before 3.0
pub type LegacyTezosPermissionMigration = LegacyPermissionMigration<LegacyTezosPermission>;

#[async_trait]
impl<T> Migration for LegacyPermissionMigration<T>
where
    T: LegacyPermission + 'static,
{
    fn identifier(&self) -> String {
        format!("permissions_from_{}", T::FROM_VERSION)
    }

    async fn apply(&self, storage: &StorageManager) -> Result<()> {
        let legacy: Vec<T> = storage.get_legacy_permissions().await?;
        if legacy.is_empty() {
            return Ok(());
        }

        let mut current: Vec<T::Current> = storage.get_permissions().await?;
        let count = legacy.len();
        for permission in legacy {
            let migrated = permission.migrate()?;
            current.retain(|existing| {
                existing.account_id() != migrated.account_id()
                    || existing.sender_id() != migrated.sender_id()
            });
            current.push(migrated);
        }

        storage.set_permissions(&current).await?;
        storage.set_legacy_permissions::<T>(&[]).await?;

        info!(count, from_version = T::FROM_VERSION, "Migrated legacy permissions");
        Ok(())
    }
}
