//! In-memory collaborators for tests

use crate::context::{
    ClientFactory, ConfigStore, DatabaseCatalog, ExecutionClient, ReconcileContext, SecretStore,
    StatusWriter, UsageTracker,
};
use crate::controller::Collaborators;
use crate::error::{ClientError, StoreError};
use crate::events::{Event, EventRecorder};
use crate::provider::{
    ConnectionDetails, Database, ProviderConfig, ProviderConfigUsage, SecretReference,
};
use crate::resource::{DatabaseTarget, Exec, Execute, ManagedResource, Query};
use crate::rows::{ResultSet, Row};
use crate::status::Status;
use crate::types::ResourceKey;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn query(name: &str, sql: &str) -> Query {
    Query::new(name, DatabaseTarget::default(), sql)
}

pub fn execute(name: &str, sql: &str) -> Execute {
    Execute::new(name, DatabaseTarget::default(), sql)
}

pub fn exec(name: &str, sql: &str) -> Exec {
    Exec::new(name, DatabaseTarget::default(), sql)
}

#[derive(Default)]
pub struct MemoryConfigStore {
    configs: Mutex<BTreeMap<String, ProviderConfig>>,
    lookups: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn insert(&self, config: ProviderConfig) {
        self.configs
            .lock()
            .unwrap()
            .insert(config.name().to_string(), config);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_provider_config(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<ProviderConfig>, StoreError> {
        ctx.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.configs.lock().unwrap().get(name).cloned())
    }
}

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), ConnectionDetails>>,
    lookups: AtomicUsize,
}

impl MemorySecretStore {
    pub fn insert(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let details = data
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), details);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(
        &self,
        ctx: &ReconcileContext,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConnectionDetails>, StoreError> {
        ctx.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryUsageTracker {
    tracked: Mutex<Vec<ProviderConfigUsage>>,
    failure: Option<String>,
}

impl MemoryUsageTracker {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn tracked(&self) -> Vec<ProviderConfigUsage> {
        self.tracked.lock().unwrap().clone()
    }
}

impl UsageTracker for MemoryUsageTracker {
    fn track(&self, ctx: &ReconcileContext, usage: &ProviderConfigUsage) -> Result<(), StoreError> {
        ctx.check()?;
        if let Some(message) = &self.failure {
            return Err(StoreError::Backend(message.clone()));
        }
        let mut tracked = self.tracked.lock().unwrap();
        if !tracked.contains(usage) {
            tracked.push(usage.clone());
        }
        Ok(())
    }
}

/// Records every persisted status and bumps the resource version
#[derive(Default)]
pub struct MemoryStatusWriter {
    history: Mutex<Vec<Status>>,
    failure: Option<String>,
}

impl MemoryStatusWriter {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    pub fn history(&self) -> Vec<Status> {
        self.history.lock().unwrap().clone()
    }
}

impl StatusWriter for MemoryStatusWriter {
    fn update_status(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        if let Some(message) = &self.failure {
            return Err(StoreError::Backend(message.clone()));
        }
        self.history.lock().unwrap().push(resource.status().clone());
        resource.meta_mut().resource_version += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    databases: Mutex<BTreeMap<String, Database>>,
}

impl MemoryCatalog {
    pub fn insert(&self, database: Database) {
        self.databases
            .lock()
            .unwrap()
            .insert(database.metadata.name.clone(), database);
    }
}

impl DatabaseCatalog for MemoryCatalog {
    fn get_database(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<Database>, StoreError> {
        ctx.check()?;
        Ok(self.databases.lock().unwrap().get(name).cloned())
    }

    fn list_databases(&self, ctx: &ReconcileContext) -> Result<Vec<Database>, StoreError> {
        ctx.check()?;
        Ok(self.databases.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<(ResourceKey, Event)>>,
}

impl MemoryRecorder {
    pub fn reasons(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.reason)
            .collect()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, key: &ResourceKey, event: Event) {
        self.events.lock().unwrap().push((key.clone(), event));
    }
}

#[derive(Debug, Clone)]
enum Script {
    Rows(ResultSet),
    Fail(String),
    Cancel,
}

struct FakeDriver {
    script: Mutex<Script>,
    executions: AtomicUsize,
    opened: Mutex<Vec<String>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted execution client factory
pub struct FakeClientFactory {
    driver: Arc<FakeDriver>,
}

impl Default for FakeClientFactory {
    fn default() -> Self {
        Self {
            driver: Arc::new(FakeDriver {
                script: Mutex::new(Script::Rows(ResultSet::empty())),
                executions: AtomicUsize::new(0),
                opened: Mutex::new(Vec::new()),
                latency: Mutex::new(Duration::ZERO),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }
}

impl FakeClientFactory {
    /// Every statement returns these rows
    pub fn returning(&self, rows: Vec<Row>) {
        let columns = rows
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default();
        *self.driver.script.lock().unwrap() = Script::Rows(ResultSet::new(columns, rows));
    }

    /// Every statement fails with this text
    pub fn failing_with(&self, message: &str) {
        *self.driver.script.lock().unwrap() = Script::Fail(message.to_string());
    }

    /// Every statement is interrupted by cancelling the caller's context
    pub fn cancelling(&self) {
        *self.driver.script.lock().unwrap() = Script::Cancel;
    }

    /// Every statement takes this long
    pub fn with_latency(&self, latency: Duration) {
        *self.driver.latency.lock().unwrap() = latency;
    }

    pub fn executions(&self) -> usize {
        self.driver.executions.load(Ordering::SeqCst)
    }

    /// Most statements that were ever running at the same time
    pub fn max_concurrent(&self) -> usize {
        self.driver.max_in_flight.load(Ordering::SeqCst)
    }

    /// Database names sessions were opened for
    pub fn opened(&self) -> Vec<String> {
        self.driver.opened.lock().unwrap().clone()
    }
}

impl ClientFactory for FakeClientFactory {
    fn new_client(
        &self,
        _credentials: &ConnectionDetails,
        database: &str,
    ) -> Result<Box<dyn ExecutionClient>, ClientError> {
        self.driver.opened.lock().unwrap().push(database.to_string());
        Ok(Box::new(FakeSession {
            driver: Arc::clone(&self.driver),
        }))
    }
}

struct FakeSession {
    driver: Arc<FakeDriver>,
}

impl ExecutionClient for FakeSession {
    fn execute(
        &mut self,
        ctx: &ReconcileContext,
        _statement: &str,
    ) -> Result<ResultSet, ClientError> {
        ctx.check()?;
        self.driver.executions.fetch_add(1, Ordering::SeqCst);
        let running = self.driver.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.driver.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let latency = *self.driver.latency.lock().unwrap();
        std::thread::sleep(latency);
        self.driver.in_flight.fetch_sub(1, Ordering::SeqCst);

        let script = self.driver.script.lock().unwrap().clone();
        match script {
            Script::Rows(result) => Ok(result),
            Script::Fail(message) => Err(ClientError::Statement(message)),
            Script::Cancel => {
                ctx.cancel();
                Err(ClientError::Cancelled)
            }
        }
    }
}

/// A full set of in-memory collaborators
///
/// The `default` ProviderConfig points at `default/db-conn`, which exists.
pub struct World {
    pub configs: Arc<MemoryConfigStore>,
    pub secrets: Arc<MemorySecretStore>,
    pub usage: Arc<MemoryUsageTracker>,
    pub status: Arc<MemoryStatusWriter>,
    pub catalog: Arc<MemoryCatalog>,
    pub events: Arc<MemoryRecorder>,
    pub clients: Arc<FakeClientFactory>,
}

impl World {
    pub fn new() -> Self {
        Self::with_status_writer(MemoryStatusWriter::default())
    }

    pub fn with_status_writer(status: MemoryStatusWriter) -> Self {
        let configs = MemoryConfigStore::default();
        configs.insert(ProviderConfig::new(
            "default",
            SecretReference::new("default", "db-conn"),
        ));
        let secrets = MemorySecretStore::default();
        secrets.insert("default", "db-conn", &[("endpoint", ":memory:")]);

        Self {
            configs: Arc::new(configs),
            secrets: Arc::new(secrets),
            usage: Arc::new(MemoryUsageTracker::default()),
            status: Arc::new(status),
            catalog: Arc::new(MemoryCatalog::default()),
            events: Arc::new(MemoryRecorder::default()),
            clients: Arc::new(FakeClientFactory::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            configs: self.configs.clone(),
            secrets: self.secrets.clone(),
            usage: self.usage.clone(),
            status: self.status.clone(),
            catalog: self.catalog.clone(),
            events: self.events.clone(),
            clients: self.clients.clone(),
        }
    }
}
