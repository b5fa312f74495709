//! # Reconcile
//!
//! Controllers for one-shot SQL statement resources.
//!
//! A `Query`, `Execute` or `Exec` resource declares a single statement to
//! run against a database. This crate resolves the resource's credentials,
//! runs the statement exactly once, records the outcome into the resource's
//! status, and treats every later pass as a no-op.
//!
//! ## Core Concepts
//!
//! - **ManagedResource**: the capability set the controller needs from a resource
//! - **Status**: `synced` plus the recorded error, message and rows
//! - **ExternalConnecter / ExternalClient**: the Connect → Observe →
//!   Create/Update/Delete protocol
//! - **Reconciler**: one full pass for one resource, with events
//! - **Executor**: bounded-parallel passes over many resources, with backoff
//!
//! Collaborators (ProviderConfigs, secrets, usage tracking, status
//! persistence, SQL sessions) are traits in [`context`] injected at
//! construction.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{
//!     AnyResource, Collaborators, Executor, NoProgress, ReconcileContext,
//!     ReconcileOptions, Reconciler, ResourceKind, StatementConnector,
//! };
//!
//! let mut executor = Executor::new(ReconcileOptions::default())?;
//! for kind in ResourceKind::ALL {
//!     let connector = StatementConnector::new(kind, collaborators.clone());
//!     executor.register(Reconciler::for_statements(connector));
//! }
//!
//! let report = executor.execute(&ReconcileContext::background(), &mut resources, &mut NoProgress);
//! println!("{} executed, {} failed", report.summary.total_executed(), report.summary.failed);
//! ```

pub mod backoff;
pub mod context;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod events;
pub mod executor;
pub mod provider;
pub mod reconciler;
pub mod references;
pub mod resource;
pub mod rows;
pub mod status;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types at crate root
pub use backoff::{BackoffTracker, RetryPolicy};
pub use context::{
    ClientFactory, ConfigStore, DatabaseCatalog, ExecutionClient, NoProgress,
    ProgressCallback, ReconcileContext, SecretStore, StatusWriter, UsageTracker,
};
pub use controller::{
    Collaborators, ExternalClient, ExternalConnecter, StatementClient, StatementConnector,
};
pub use credentials::CredentialResolver;
pub use error::{
    Cancelled, ClientError, ConnectError, Error, ErrorCategory, ReferenceError, Result, StoreError,
};
pub use events::{Event, EventRecorder, EventType, LogRecorder};
pub use executor::{ExecutionReport, Executor, PassReport};
pub use provider::{ConnectionDetails, Database, ProviderConfig, ProviderConfigUsage, SecretReference};
pub use reconciler::Reconciler;
pub use resource::{AnyResource, DatabaseTarget, Exec, Execute, ManagedResource, ObjectMeta, Query};
pub use rows::{ResultSet, Row};
pub use status::{Outcome, Status, StatusProjector, SyncState};
pub use types::{
    AttemptPolicy, PassOutcome, ReconcileOptions, ReconcileSummary, ResourceKey, ResourceKind,
};
pub use validation::ValidationError;
