//! File-backed object store
//!
//! Objects live as TOML files under the state directory:
//!
//! ```text
//! resources/<kind>/<name>.toml
//! providerconfigs/<name>.toml
//! secrets/<namespace>/<name>.toml
//! databases/<name>.toml
//! usages/<providerconfig>/<kind>.<name>
//! ```
//!
//! Every write bumps `metadata.resourceVersion`. Status writes are
//! conditional on it, so a status computed from a stale read is rejected.

use anyhow::{Context, Result, bail};
use reconcile::validation::{validate_create, validate_name, validate_update};
use reconcile::{
    AnyResource, ConfigStore, ConnectionDetails, Database, DatabaseCatalog, ManagedResource,
    ObjectMeta, ProviderConfig, ProviderConfigUsage, ReconcileContext, ResourceKey, ResourceKind,
    SecretStore, StatusWriter, StoreError, UsageTracker,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::objects::{Object, Secret};

/// What an apply did to the stored copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Created,
    Configured,
    Unchanged,
}

impl ApplyResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Objects that carry store-managed metadata
trait Versioned {
    fn meta_mut(&mut self) -> &mut ObjectMeta;
}

impl Versioned for ProviderConfig {
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl Versioned for Database {
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    fn kind_dir(&self, kind: ResourceKind) -> PathBuf {
        self.root.join("resources").join(kind.as_str())
    }

    fn resource_path(&self, key: &ResourceKey) -> Option<PathBuf> {
        object_file(&self.kind_dir(key.kind), &key.name)
    }

    fn provider_config_path(&self, name: &str) -> Option<PathBuf> {
        object_file(&self.root.join("providerconfigs"), name)
    }

    fn secret_path(&self, namespace: &str, name: &str) -> Option<PathBuf> {
        validate_name(namespace).ok()?;
        object_file(&self.root.join("secrets").join(namespace), name)
    }

    fn database_path(&self, name: &str) -> Option<PathBuf> {
        object_file(&self.root.join("databases"), name)
    }

    fn usage_dir(&self) -> PathBuf {
        self.root.join("usages")
    }

    // ------------------------------------------------------------------
    // Apply
    // ------------------------------------------------------------------

    /// Store one applied object
    pub fn apply(&self, object: Object) -> Result<ApplyResult> {
        match object {
            Object::Resource(resource) => self.put_resource(resource),
            Object::ProviderConfig(pc) => {
                let path = self
                    .provider_config_path(pc.name())
                    .with_context(|| invalid_name(pc.name()))?;
                self.put_versioned(&path, pc)
            }
            Object::Database(db) => {
                let path = self
                    .database_path(&db.metadata.name)
                    .with_context(|| invalid_name(&db.metadata.name))?;
                self.put_versioned(&path, db)
            }
            Object::Secret(secret) => self.put_secret(secret),
        }
    }

    /// Store a resource declaration
    ///
    /// Status and deletion state in the declaration are ignored; an update
    /// keeps the stored ones.
    pub fn put_resource(&self, mut incoming: AnyResource) -> Result<ApplyResult> {
        let key = incoming.key();
        let path = self
            .resource_path(&key)
            .with_context(|| invalid_name(&key.name))?;

        let _guard = self.lock();
        let stored: Option<AnyResource> = read_toml(&path)?;

        let result = match stored {
            None => {
                validate_create(&incoming)?;
                *incoming.status_mut() = reconcile::Status::default();
                let meta = incoming.meta_mut();
                meta.deletion_requested = false;
                meta.resource_version = 1;
                ApplyResult::Created
            }
            Some(stored) => {
                validate_update(&stored, &incoming)?;
                *incoming.status_mut() = stored.status().clone();
                let version = stored.meta().resource_version;
                let meta = incoming.meta_mut();
                meta.deletion_requested = stored.meta().deletion_requested;
                meta.resource_version = version;
                if incoming == stored {
                    return Ok(ApplyResult::Unchanged);
                }
                incoming.meta_mut().resource_version = version + 1;
                ApplyResult::Configured
            }
        };

        write_toml(&path, &incoming)?;
        log::debug!("{key}: {}", result.as_str());
        Ok(result)
    }

    fn put_versioned<T>(&self, path: &Path, mut incoming: T) -> Result<ApplyResult>
    where
        T: Versioned + Serialize + DeserializeOwned + PartialEq,
    {
        let _guard = self.lock();
        let result = match read_toml::<T>(path)? {
            None => {
                incoming.meta_mut().resource_version = 1;
                ApplyResult::Created
            }
            Some(mut stored) => {
                let version = stored.meta_mut().resource_version;
                incoming.meta_mut().resource_version = version;
                if incoming == stored {
                    return Ok(ApplyResult::Unchanged);
                }
                incoming.meta_mut().resource_version = version + 1;
                ApplyResult::Configured
            }
        };
        write_toml(path, &incoming)?;
        Ok(result)
    }

    fn put_secret(&self, secret: Secret) -> Result<ApplyResult> {
        let meta = &secret.metadata;
        let path = self
            .secret_path(&meta.namespace, &meta.name)
            .with_context(|| invalid_name(&format!("{}/{}", meta.namespace, meta.name)))?;

        let _guard = self.lock();
        let result = match read_toml::<Secret>(&path)? {
            None => ApplyResult::Created,
            Some(stored) if stored == secret => return Ok(ApplyResult::Unchanged),
            Some(_) => ApplyResult::Configured,
        };
        write_toml(&path, &secret)?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// All stored resources, optionally of one kind, ordered by kind then name
    pub fn list_resources(&self, kind: Option<ResourceKind>) -> Result<Vec<AnyResource>> {
        let mut resources = Vec::new();
        for k in ResourceKind::ALL {
            if kind.is_some_and(|wanted| wanted != k) {
                continue;
            }
            for path in toml_files(&self.kind_dir(k))? {
                let resource: AnyResource = read_toml(&path)?
                    .with_context(|| format!("{} disappeared while listing", path.display()))?;
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    pub fn get_resource(&self, key: &ResourceKey) -> Result<Option<AnyResource>> {
        match self.resource_path(key) {
            Some(path) => Ok(read_toml(&path)?),
            None => Ok(None),
        }
    }

    /// Mark a resource for deletion; returns false when it does not exist
    pub fn request_deletion(&self, key: &ResourceKey) -> Result<bool> {
        let Some(path) = self.resource_path(key) else {
            return Ok(false);
        };

        let _guard = self.lock();
        let Some(mut resource) = read_toml::<AnyResource>(&path)? else {
            return Ok(false);
        };
        let meta = resource.meta_mut();
        if !meta.deletion_requested {
            meta.deletion_requested = true;
            meta.resource_version += 1;
            write_toml(&path, &resource)?;
        }
        Ok(true)
    }

    /// Release a resource record and its usage record
    pub fn remove_resource(&self, key: &ResourceKey) -> Result<()> {
        let _guard = self.lock();

        if let Some(path) = self.resource_path(key) {
            remove_if_exists(&path)?;
        }

        let marker = usage_marker(key);
        for dir in subdirs(&self.usage_dir())? {
            remove_if_exists(&dir.join(&marker))?;
        }
        log::debug!("{key}: released");
        Ok(())
    }

    // ------------------------------------------------------------------
    // ProviderConfigs
    // ------------------------------------------------------------------

    /// Resources recorded as using a ProviderConfig
    pub fn usages(&self, provider_config: &str) -> Result<Vec<String>> {
        let dir = self.usage_dir().join(provider_config);
        if validate_name(provider_config).is_err() || !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut users = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Could not read {}", dir.display()))? {
            users.push(entry?.file_name().to_string_lossy().into_owned());
        }
        users.sort();
        Ok(users)
    }

    /// Delete a ProviderConfig; refused while any resource uses it
    pub fn delete_provider_config(&self, name: &str) -> Result<bool> {
        let users = self.usages(name)?;
        if !users.is_empty() {
            bail!(
                "ProviderConfig {name} is in use by {} resource(s): {}",
                users.len(),
                users.join(", ")
            );
        }

        let Some(path) = self.provider_config_path(name) else {
            return Ok(false);
        };
        let _guard = self.lock();
        Ok(remove_if_exists(&path)?)
    }
}

impl ConfigStore for FileStore {
    fn get_provider_config(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<ProviderConfig>, StoreError> {
        ctx.check()?;
        match self.provider_config_path(name) {
            Some(path) => read_toml(&path),
            None => Ok(None),
        }
    }
}

impl SecretStore for FileStore {
    fn get_secret(
        &self,
        ctx: &ReconcileContext,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConnectionDetails>, StoreError> {
        ctx.check()?;
        let Some(path) = self.secret_path(namespace, name) else {
            return Ok(None);
        };
        Ok(read_toml::<Secret>(&path)?.map(|s| s.connection_details()))
    }
}

impl UsageTracker for FileStore {
    fn track(&self, ctx: &ReconcileContext, usage: &ProviderConfigUsage) -> Result<(), StoreError> {
        ctx.check()?;
        validate_name(&usage.provider_config)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let path = self
            .usage_dir()
            .join(&usage.provider_config)
            .join(usage_marker(&usage.resource));
        let _guard = self.lock();
        if path.exists() {
            return Ok(());
        }
        write_toml(&path, usage)
    }
}

impl StatusWriter for FileStore {
    fn update_status(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        let key = resource.key();
        let path = self.resource_path(&key).ok_or_else(|| StoreError::NotFound {
            kind: "resource",
            name: key.to_string(),
        })?;

        let _guard = self.lock();
        let mut stored: AnyResource = read_toml(&path)?.ok_or_else(|| StoreError::NotFound {
            kind: "resource",
            name: key.to_string(),
        })?;

        let expected = resource.meta().resource_version;
        let current = stored.meta().resource_version;
        if current != expected {
            return Err(StoreError::Conflict {
                name: key.to_string(),
                message: format!(
                    "the object has been modified (version {current}, expected {expected})"
                ),
            });
        }

        *stored.status_mut() = resource.status().clone();
        stored.meta_mut().resource_version = current + 1;
        write_toml(&path, &stored)?;

        resource.meta_mut().resource_version = current + 1;
        Ok(())
    }
}

impl DatabaseCatalog for FileStore {
    fn get_database(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<Database>, StoreError> {
        ctx.check()?;
        match self.database_path(name) {
            Some(path) => read_toml(&path),
            None => Ok(None),
        }
    }

    fn list_databases(&self, ctx: &ReconcileContext) -> Result<Vec<Database>, StoreError> {
        ctx.check()?;
        let dir = self.root.join("databases");
        let files = toml_files(&dir).map_err(|e| StoreError::Backend(format!("{e:#}")))?;

        let mut databases = Vec::with_capacity(files.len());
        for path in files {
            if let Some(db) = read_toml(&path)? {
                databases.push(db);
            }
        }
        Ok(databases)
    }
}

// ----------------------------------------------------------------------
// File helpers
// ----------------------------------------------------------------------

fn invalid_name(name: &str) -> String {
    format!("Invalid object name '{name}'")
}

/// `<dir>/<name>.toml`, or None when the name cannot be stored
fn object_file(dir: &Path, name: &str) -> Option<PathBuf> {
    validate_name(name).ok()?;
    Some(dir.join(format!("{name}.toml")))
}

fn usage_marker(key: &ResourceKey) -> String {
    format!("{}.{}", key.kind.as_str(), key.name)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Backend(format!("{}: {e}", path.display())))
}

/// Write through a temporary file so readers never see a partial document
fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = toml::to_string(value)
        .map_err(|e| StoreError::Backend(format!("{}: {e}", path.display())))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// `*.toml` files in a directory, sorted by name
fn toml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Could not read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Could not read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{DatabaseTarget, Row, SecretReference};
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        (tmp, store)
    }

    fn query(name: &str, sql: &str) -> AnyResource {
        AnyResource::new(ResourceKind::Query, name, DatabaseTarget::named("app"), sql)
    }

    fn ctx() -> ReconcileContext {
        ReconcileContext::background()
    }

    #[test]
    fn test_put_and_get_resource() {
        let (_tmp, store) = store();
        let resource = query("count", "SELECT 1");

        assert_eq!(store.put_resource(resource.clone()).unwrap(), ApplyResult::Created);
        assert_eq!(store.put_resource(resource.clone()).unwrap(), ApplyResult::Unchanged);

        let stored = store.get_resource(&resource.key()).unwrap().unwrap();
        assert_eq!(stored.meta().resource_version, 1);
        assert_eq!(stored.statement(), "SELECT 1");
        assert!(store.root().join("resources/query/count.toml").exists());
    }

    #[test]
    fn test_apply_ignores_declared_status() {
        let (_tmp, store) = store();
        let mut resource = query("count", "SELECT 1");
        resource.status_mut().synced = true;

        store.put_resource(resource.clone()).unwrap();
        let stored = store.get_resource(&resource.key()).unwrap().unwrap();
        assert!(!stored.status().synced);
    }

    #[test]
    fn test_update_rejects_statement_change() {
        let (_tmp, store) = store();
        store.put_resource(query("count", "SELECT 1")).unwrap();

        let err = store.put_resource(query("count", "SELECT 2")).unwrap_err();
        assert!(err.to_string().contains("Field 'forProvider.query' is immutable"));
    }

    #[test]
    fn test_update_keeps_stored_status() {
        let (_tmp, store) = store();
        let resource = query("count", "SELECT 1");
        store.put_resource(resource.clone()).unwrap();

        let mut stored = store.get_resource(&resource.key()).unwrap().unwrap();
        stored.status_mut().synced = true;
        stored.status_mut().at_provider.message = "done".to_string();
        store.update_status(&ctx(), &mut stored).unwrap();

        let AnyResource::Query(mut relabelled) = resource else {
            unreachable!()
        };
        relabelled
            .metadata
            .labels
            .insert("team".to_string(), "data".to_string());
        assert_eq!(
            store.put_resource(relabelled.into()).unwrap(),
            ApplyResult::Configured
        );

        let after = store.get_resource(&stored.key()).unwrap().unwrap();
        assert!(after.status().synced);
        assert_eq!(after.status().at_provider.message, "done");
        assert_eq!(after.meta().resource_version, 3);
    }

    #[test]
    fn test_stored_results_keep_column_order() {
        let (_tmp, store) = store();
        let resource = query("count", "SELECT zeta, alpha, COUNT(*), '' FROM t");
        store.put_resource(resource.clone()).unwrap();

        let row: Row = [("zeta", "1"), ("alpha", "2"), ("COUNT(*)", "3"), ("", "")]
            .into_iter()
            .collect();
        let mut stored = store.get_resource(&resource.key()).unwrap().unwrap();
        stored.status_mut().synced = true;
        stored.status_mut().at_provider.results = vec![row];
        store.update_status(&ctx(), &mut stored).unwrap();

        let after = store.get_resource(&resource.key()).unwrap().unwrap();
        let columns: Vec<&str> = after.status().at_provider.results[0].columns().collect();
        assert_eq!(columns, ["zeta", "alpha", "COUNT(*)", ""]);
    }

    #[test]
    fn test_rejects_invalid_names() {
        let (_tmp, store) = store();
        let err = store.put_resource(query("../escape", "SELECT 1")).unwrap_err();
        assert!(err.to_string().contains("Invalid object name"));
    }

    #[test]
    fn test_status_write_is_conditional() {
        let (_tmp, store) = store();
        let resource = query("count", "SELECT 1");
        store.put_resource(resource.clone()).unwrap();

        let mut first = store.get_resource(&resource.key()).unwrap().unwrap();
        let mut stale = first.clone();

        first.status_mut().synced = true;
        store.update_status(&ctx(), &mut first).unwrap();
        assert_eq!(first.meta().resource_version, 2);

        stale.status_mut().synced = true;
        let err = store.update_status(&ctx(), &mut stale).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn test_status_write_for_missing_resource() {
        let (_tmp, store) = store();
        let mut resource = query("ghost", "SELECT 1");
        let err = store.update_status(&ctx(), &mut resource).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_cancelled_context_is_rejected() {
        let (_tmp, store) = store();
        let ctx = ctx();
        ctx.cancel();
        let err = store.get_provider_config(&ctx, "default").unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[test]
    fn test_provider_config_and_secret_lookup() {
        let (_tmp, store) = store();
        store
            .apply(Object::ProviderConfig(ProviderConfig::new(
                "default",
                SecretReference::new("default", "db-conn"),
            )))
            .unwrap();
        let object = Object::parse(
            "kind = \"Secret\"\n[metadata]\nname = \"db-conn\"\n[data]\nendpoint = \":memory:\"\n",
        )
        .unwrap();
        assert_eq!(store.apply(object.clone()).unwrap(), ApplyResult::Created);
        assert_eq!(store.apply(object).unwrap(), ApplyResult::Unchanged);

        let pc = store.get_provider_config(&ctx(), "default").unwrap().unwrap();
        assert_eq!(pc.metadata.resource_version, 1);
        let secret = pc.secret_ref().unwrap();

        let creds = store
            .get_secret(&ctx(), &secret.namespace, &secret.name)
            .unwrap()
            .unwrap();
        assert_eq!(creds.get("endpoint"), Some(&b":memory:".to_vec()));

        assert!(store.get_provider_config(&ctx(), "other").unwrap().is_none());
        assert!(store.get_secret(&ctx(), "default", "nope").unwrap().is_none());
    }

    #[test]
    fn test_usage_blocks_provider_config_deletion() {
        let (_tmp, store) = store();
        store
            .apply(Object::ProviderConfig(ProviderConfig::new(
                "default",
                SecretReference::new("default", "db-conn"),
            )))
            .unwrap();

        let resource = query("count", "SELECT 1");
        store.put_resource(resource.clone()).unwrap();
        let usage = ProviderConfigUsage::for_resource(&resource);
        store.track(&ctx(), &usage).unwrap();
        store.track(&ctx(), &usage).unwrap();
        assert_eq!(store.usages("default").unwrap(), ["query.count"]);

        let err = store.delete_provider_config("default").unwrap_err();
        assert!(err.to_string().contains("in use by 1 resource(s): query.count"));

        store.remove_resource(&resource.key()).unwrap();
        assert!(store.get_resource(&resource.key()).unwrap().is_none());
        assert!(store.usages("default").unwrap().is_empty());
        assert!(store.delete_provider_config("default").unwrap());
    }

    #[test]
    fn test_request_deletion() {
        let (_tmp, store) = store();
        let resource = query("count", "SELECT 1");
        store.put_resource(resource.clone()).unwrap();

        assert!(store.request_deletion(&resource.key()).unwrap());
        assert!(store.request_deletion(&resource.key()).unwrap());
        let stored = store.get_resource(&resource.key()).unwrap().unwrap();
        assert!(stored.meta().deletion_requested);
        assert_eq!(stored.meta().resource_version, 2);

        let missing = ResourceKey::new(ResourceKind::Exec, "nope");
        assert!(!store.request_deletion(&missing).unwrap());
    }

    #[test]
    fn test_list_resources_by_kind() {
        let (_tmp, store) = store();
        store.put_resource(query("b", "SELECT 2")).unwrap();
        store.put_resource(query("a", "SELECT 1")).unwrap();
        store
            .put_resource(AnyResource::new(
                ResourceKind::Exec,
                "drop",
                DatabaseTarget::default(),
                "DROP TABLE t",
            ))
            .unwrap();

        let all = store.list_resources(None).unwrap();
        let names: Vec<String> = all.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(names, ["query/a", "query/b", "exec/drop"]);

        let execs = store.list_resources(Some(ResourceKind::Exec)).unwrap();
        assert_eq!(execs.len(), 1);
    }

    #[test]
    fn test_database_catalog() {
        let (_tmp, store) = store();
        store
            .apply(Object::Database(Database::new("orders").with_label("env", "prod")))
            .unwrap();
        store
            .apply(Object::Database(
                Database::new("analytics").with_external_name("warehouse"),
            ))
            .unwrap();

        let db = store.get_database(&ctx(), "analytics").unwrap().unwrap();
        assert_eq!(db.database_name(), "warehouse");

        let names: Vec<String> = store
            .list_databases(&ctx())
            .unwrap()
            .into_iter()
            .map(|d| d.metadata.name)
            .collect();
        assert_eq!(names, ["analytics", "orders"]);
    }
}
