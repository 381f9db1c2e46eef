//! Tenant manager
//!
//! Maps tenant names to their database files and caches one open
//! [`Database`] per tenant. The file on disk is the source of truth; the
//! cache only records which tenants this manager has opened.
//!
//! Lock order: `lifecycle` before `tenants`. Lookups of an already cached
//! tenant only take the `tenants` read lock. `lifecycle` also holds the names
//! currently being provisioned; it is never held while migrations run.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use strata_core::errors::StrataError;
use strata_core::registry::EventDeserializer;
use strata_core::{log_op_end, log_op_error, log_op_start};

use super::atomic;
use crate::config::StoreConfig;
use crate::db::Database;
use crate::errors::{invalid_input, io_error, Result};
use crate::event_store::EventStore;
use crate::migrations::MigrationRunner;
use crate::snapshot_store::SnapshotStore;

/// Event and snapshot stores bound to one tenant's database
pub struct TenantStore<E> {
    tenant: String,
    events: EventStore<E>,
    snapshots: SnapshotStore,
}

impl<E> Clone for TenantStore<E> {
    fn clone(&self) -> Self {
        Self {
            tenant: self.tenant.clone(),
            events: self.events.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<E> std::fmt::Debug for TenantStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantStore")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl<E> TenantStore<E> {
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn events(&self) -> &EventStore<E> {
        &self.events
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

/// Creates, opens and deletes tenant databases
pub struct TenantManager<E> {
    config: StoreConfig,
    deserializer: Arc<dyn EventDeserializer<E>>,
    runner: MigrationRunner,
    tenants: RwLock<HashMap<String, Arc<Database>>>,
    lifecycle: Mutex<HashSet<String>>,
}

/// Claim on a tenant name while its staging file is built; released on drop
struct Provisioning<'a> {
    lifecycle: &'a Mutex<HashSet<String>>,
    tenant: String,
}

impl Drop for Provisioning<'_> {
    fn drop(&mut self) {
        let mut pending = match self.lifecycle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.remove(&self.tenant);
    }
}

impl<E> TenantManager<E> {
    /// Validate `config` and make sure the data directory exists
    ///
    /// New tenants are migrated with the embedded migrations unless
    /// [`with_migrations`](Self::with_migrations) supplies another set.
    pub fn new(config: StoreConfig, deserializer: Arc<dyn EventDeserializer<E>>) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_path).map_err(|e| io_error("create_data_dir", e))?;

        Ok(Self {
            config,
            deserializer,
            runner: MigrationRunner::embedded(),
            tenants: RwLock::new(HashMap::new()),
            lifecycle: Mutex::new(HashSet::new()),
        })
    }

    pub fn with_migrations(mut self, runner: MigrationRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Canonical file path for `tenant`
    pub fn tenant_path(&self, tenant: &str) -> Result<PathBuf> {
        validate_tenant_name(tenant)?;
        Ok(self
            .config
            .data_path
            .join(format!("{}.{}", tenant, self.config.file_extension)))
    }

    /// True if the tenant's file exists, whether or not it is cached here
    pub fn exists(&self, tenant: &str) -> Result<bool> {
        Ok(self.tenant_path(tenant)?.exists())
    }

    /// Provision a new tenant and open it
    ///
    /// Fails with `TenantAlreadyExists` if the tenant file is present or the
    /// same name is already being created. The schema is built in a staging
    /// file that is only renamed into place once every migration has been
    /// applied; on failure the staging file is removed and no tenant file
    /// appears. Other tenants can be created and opened meanwhile.
    pub fn create(&self, tenant: &str) -> Result<TenantStore<E>> {
        log_op_start!("create_tenant", tenant = tenant);
        let start = Instant::now();

        let store = self.create_impl(tenant).map_err(|e| {
            log_op_error!(
                "create_tenant",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                tenant = tenant
            );
            e
        })?;

        log_op_end!(
            "create_tenant",
            duration_ms = start.elapsed().as_millis() as u64,
            tenant = tenant
        );
        Ok(store)
    }

    fn create_impl(&self, tenant: &str) -> Result<TenantStore<E>> {
        let path = self.tenant_path(tenant)?;
        let _provisioning = self.reserve(tenant, &path)?;

        let staging = atomic::staging_path(&path);
        atomic::discard(&staging)?;
        if let Err(e) = self.provision(&staging, &path) {
            if let Err(cleanup) = atomic::discard(&staging) {
                tracing::warn!(tenant, error = %cleanup, "failed to remove staging file");
            }
            return Err(e);
        }

        let db = self.open_cached(tenant, &path, "create_tenant")?;
        Ok(self.store_for(tenant, db))
    }

    fn reserve(&self, tenant: &str, path: &Path) -> Result<Provisioning<'_>> {
        let mut pending = self.lock_lifecycle("create_tenant")?;
        if pending.contains(tenant)
            || path.exists()
            || self.read_tenants("create_tenant")?.contains_key(tenant)
        {
            return Err(StrataError::TenantAlreadyExists {
                tenant: tenant.to_string(),
            });
        }
        pending.insert(tenant.to_string());

        Ok(Provisioning {
            lifecycle: &self.lifecycle,
            tenant: tenant.to_string(),
        })
    }

    fn provision(&self, staging: &Path, path: &Path) -> Result<()> {
        let db = Database::open(staging, &self.config)?;
        let report = db.with_conn("provision_tenant", |conn| self.runner.apply_all(conn));
        // Close before rename so the WAL is checkpointed into the main file.
        db.close()?;
        let report = report?;
        tracing::debug!(
            staging = %staging.display(),
            applied = report.applied.len(),
            "staging file migrated"
        );
        atomic::publish(staging, path)
    }

    /// Stores for an existing tenant, opening its file on first use
    ///
    /// Never creates a tenant: a missing file is `TenantNotFound`.
    pub fn get_store(&self, tenant: &str) -> Result<TenantStore<E>> {
        log_op_start!("get_store", tenant = tenant);
        let start = Instant::now();

        let store = self.get_store_impl(tenant).map_err(|e| {
            log_op_error!(
                "get_store",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                tenant = tenant
            );
            e
        })?;

        log_op_end!(
            "get_store",
            duration_ms = start.elapsed().as_millis() as u64,
            tenant = tenant
        );
        Ok(store)
    }

    fn get_store_impl(&self, tenant: &str) -> Result<TenantStore<E>> {
        let path = self.tenant_path(tenant)?;
        if let Some(db) = self.read_tenants("get_store")?.get(tenant) {
            return Ok(self.store_for(tenant, db.clone()));
        }

        let db = self.open_cached(tenant, &path, "get_store")?;
        Ok(self.store_for(tenant, db))
    }

    /// Cached database for `tenant`, opening and caching `path` on a miss
    fn open_cached(&self, tenant: &str, path: &Path, op: &str) -> Result<Arc<Database>> {
        let _lifecycle = self.lock_lifecycle(op)?;
        // Another caller may have opened it while we waited.
        if let Some(db) = self.read_tenants(op)?.get(tenant) {
            return Ok(db.clone());
        }
        if !path.exists() {
            return Err(StrataError::TenantNotFound {
                tenant: tenant.to_string(),
            });
        }

        let db = Arc::new(Database::open(path, &self.config)?);
        tracing::debug!(tenant, path = %path.display(), "opened tenant database");
        self.write_tenants(op)?
            .insert(tenant.to_string(), db.clone());
        Ok(db)
    }

    /// Close a tenant's connection and remove its files
    ///
    /// Only tenants opened by this manager can be deleted; anything else is
    /// `TenantNotFound`. Stores handed out earlier fail from then on. If
    /// closing or removing fails the tenant stays cached and the delete can
    /// be retried.
    pub fn delete(&self, tenant: &str) -> Result<()> {
        log_op_start!("delete_tenant", tenant = tenant);
        let start = Instant::now();

        self.delete_impl(tenant).map_err(|e| {
            log_op_error!(
                "delete_tenant",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                tenant = tenant
            );
            e
        })?;

        log_op_end!(
            "delete_tenant",
            duration_ms = start.elapsed().as_millis() as u64,
            tenant = tenant
        );
        Ok(())
    }

    fn delete_impl(&self, tenant: &str) -> Result<()> {
        let path = self.tenant_path(tenant)?;
        let _lifecycle = self.lock_lifecycle("delete_tenant")?;

        let db = self
            .read_tenants("delete_tenant")?
            .get(tenant)
            .cloned()
            .ok_or_else(|| StrataError::TenantNotFound {
                tenant: tenant.to_string(),
            })?;

        db.close()?;
        atomic::discard(&path)?;
        self.write_tenants("delete_tenant")?.remove(tenant);
        Ok(())
    }

    /// Close every cached connection; tenants can be reopened afterwards
    ///
    /// All connections are closed even if one fails; the first error is
    /// returned.
    pub fn close(&self) -> Result<()> {
        let _lifecycle = self.lock_lifecycle("close")?;
        let drained: Vec<(String, Arc<Database>)> =
            self.write_tenants("close")?.drain().collect();

        let mut first_error = None;
        for (tenant, db) in drained {
            if let Err(e) = db.close() {
                tracing::warn!(tenant = %tenant, error = %e, "failed to close tenant database");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Names of the tenants currently open in this manager, sorted
    pub fn open_tenants(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read_tenants("open_tenants")?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn store_for(&self, tenant: &str, db: Arc<Database>) -> TenantStore<E> {
        TenantStore {
            tenant: tenant.to_string(),
            events: EventStore::new(db.clone(), self.deserializer.clone()),
            snapshots: SnapshotStore::new(db),
        }
    }

    fn lock_lifecycle(&self, op: &str) -> Result<MutexGuard<'_, HashSet<String>>> {
        self.lifecycle.lock().map_err(|_| poisoned(op))
    }

    fn read_tenants(&self, op: &str) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<Database>>>> {
        self.tenants.read().map_err(|_| poisoned(op))
    }

    fn write_tenants(
        &self,
        op: &str,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<Database>>>> {
        self.tenants.write().map_err(|_| poisoned(op))
    }
}

fn poisoned(op: &str) -> StrataError {
    StrataError::Storage {
        op: op.to_string(),
        message: "tenant registry lock poisoned".to_string(),
    }
}

/// Reject names that are empty or could escape the data directory
pub fn validate_tenant_name(tenant: &str) -> Result<()> {
    if tenant.is_empty() {
        return Err(invalid_input("tenant name must not be empty"));
    }
    if tenant.contains('\0') || tenant.contains(std::path::is_separator) {
        return Err(invalid_input(format!(
            "tenant name '{}' contains a path separator or NUL",
            tenant.escape_default()
        )));
    }
    let mut components = Path::new(tenant).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(invalid_input(format!("tenant name '{}' is not a plain file name", tenant)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::registry::EventRegistry;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> TenantManager<()> {
        TenantManager::new(
            StoreConfig::new(dir.path()),
            Arc::new(EventRegistry::<()>::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_name_being_provisioned_is_reserved() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = manager.tenant_path("a").unwrap();

        let provisioning = manager.reserve("a", &path).unwrap();

        assert_eq!(manager.create("a").unwrap_err().code(), "ERR_ALREADY_EXISTS");
        assert_eq!(manager.get_store("a").unwrap_err().code(), "ERR_NOT_FOUND");

        drop(provisioning);
        manager.create("a").unwrap();
    }

    #[test]
    fn test_pending_tenant_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = manager.tenant_path("slow").unwrap();
        let _provisioning = manager.reserve("slow", &path).unwrap();

        // Would deadlock if the reservation held the lifecycle lock.
        manager.create("other").unwrap();
        manager.close().unwrap();
        manager.get_store("other").unwrap();
        manager.delete("other").unwrap();
    }

    #[test]
    fn test_plain_names_accepted() {
        for name in ["t1", "acme-corp", "tenant.eu", "Tenant_42"] {
            validate_tenant_name(name).unwrap();
        }
    }

    #[test]
    fn test_escaping_names_rejected() {
        for name in ["", ".", "..", "a/b", "../t1", "t\0"] {
            let err = validate_tenant_name(name).unwrap_err();
            assert_eq!(err.code(), "ERR_INVALID_INPUT", "name {:?}", name);
        }
    }
}
