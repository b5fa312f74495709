//! Reconcile context and collaborator traits
//!
//! The controller reaches the outside world only through these traits, so
//! the stores, the SQL driver and the progress UI are injected at
//! construction and can be replaced by fakes in tests.

use crate::error::{Cancelled, ClientError, StoreError};
use crate::provider::{ConnectionDetails, Database, ProviderConfig, ProviderConfigUsage};
use crate::resource::ManagedResource;
use crate::rows::ResultSet;
use crate::types::{ResourceKey, ResourceKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cancellation and deadline carried through every collaborator call
///
/// Clones share the cancel flag; cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ReconcileContext {
    /// A context that is never cancelled on its own
    pub fn background() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Derive a context that also expires after `timeout`
    ///
    /// The derived context keeps the parent's cancel flag and never extends
    /// the parent's deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail if the context is cancelled or past its deadline
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for ReconcileContext {
    fn default() -> Self {
        Self::background()
    }
}

/// Lookup of ProviderConfigs by name
pub trait ConfigStore: Send + Sync {
    /// Returns `Ok(None)` when no ProviderConfig has that name
    fn get_provider_config(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<ProviderConfig>, StoreError>;
}

/// Lookup of credential secrets by namespace and name
pub trait SecretStore: Send + Sync {
    /// Returns `Ok(None)` when the secret does not exist
    fn get_secret(
        &self,
        ctx: &ReconcileContext,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConnectionDetails>, StoreError>;
}

/// Registers which resources use which ProviderConfig
///
/// A ProviderConfig with usage records must not be deleted.
pub trait UsageTracker: Send + Sync {
    fn track(&self, ctx: &ReconcileContext, usage: &ProviderConfigUsage) -> Result<(), StoreError>;
}

/// Persists a resource's full status
///
/// Implementations perform a conditional write against
/// `metadata.resourceVersion` and update it on success.
pub trait StatusWriter: Send + Sync {
    fn update_status(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<(), StoreError>;
}

/// Lookup of Database objects for reference resolution
pub trait DatabaseCatalog: Send + Sync {
    fn get_database(
        &self,
        ctx: &ReconcileContext,
        name: &str,
    ) -> Result<Option<Database>, StoreError>;

    fn list_databases(&self, ctx: &ReconcileContext) -> Result<Vec<Database>, StoreError>;
}

/// An open database session
pub trait ExecutionClient: Send {
    /// Run one statement and return its rows
    ///
    /// Statements without result columns return an empty [`ResultSet`].
    fn execute(&mut self, ctx: &ReconcileContext, statement: &str)
    -> Result<ResultSet, ClientError>;
}

/// Opens sessions from raw credentials, scoped to a database name
pub trait ClientFactory: Send + Sync {
    fn new_client(
        &self,
        credentials: &ConnectionDetails,
        database: &str,
    ) -> Result<Box<dyn ExecutionClient>, ClientError>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ConnectionDetails, &str) -> Result<Box<dyn ExecutionClient>, ClientError> + Send + Sync,
{
    fn new_client(
        &self,
        credentials: &ConnectionDetails,
        database: &str,
    ) -> Result<Box<dyn ExecutionClient>, ClientError> {
        self(credentials, database)
    }
}

/// Progress callback for scheduler passes
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a batch of resources of one kind
    fn on_batch_start(&mut self, kind: ResourceKind, count: usize);

    /// Called when a resource's pass completes
    fn on_resource_complete(&mut self, key: &ResourceKey, result: &crate::executor::PassReport);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _kind: ResourceKind, _count: usize) {}
    fn on_resource_complete(&mut self, _key: &ResourceKey, _result: &crate::executor::PassReport) {}
    fn on_batch_complete(&mut self) {}
}
