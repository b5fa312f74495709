//! The external resource controller
//!
//! One controller per kind. [`ExternalConnecter::connect`] turns a resource
//! into an [`ExternalClient`] holding an open session; the client then
//! answers the Observe / Create / Update / Delete protocol. For statement
//! resources the external "resource" is the fact that the statement ran, so
//! existence is read straight from `status.synced` and Create executes the
//! statement exactly once.

use crate::context::{
    ClientFactory, ConfigStore, DatabaseCatalog, ExecutionClient, ReconcileContext, SecretStore,
    StatusWriter, UsageTracker,
};
use crate::credentials::CredentialResolver;
use crate::error::{ClientError, ConnectError, Error, Result};
use crate::events::EventRecorder;
use crate::resource::ManagedResource;
use crate::status::{Outcome, StatusProjector, UNRECORDED_ATTEMPT_ERROR};
use crate::types::{
    AttemptPolicy, ExternalCreation, ExternalObservation, ExternalUpdate, ResourceKind,
};
use std::sync::Arc;

/// Produces connected clients for resources of one kind
pub trait ExternalConnecter: Send + Sync {
    /// The kind this connecter accepts
    fn kind(&self) -> ResourceKind;

    /// Resolve credentials and open a session for `resource`
    fn connect(
        &self,
        ctx: &ReconcileContext,
        resource: &dyn ManagedResource,
    ) -> Result<Box<dyn ExternalClient>>;
}

/// A connected client answering the lifecycle protocol
pub trait ExternalClient: Send {
    fn observe(
        &mut self,
        ctx: &ReconcileContext,
        resource: &dyn ManagedResource,
    ) -> Result<ExternalObservation>;

    fn create(
        &mut self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<ExternalCreation>;

    fn update(
        &mut self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<ExternalUpdate>;

    fn delete(&mut self, ctx: &ReconcileContext, resource: &mut dyn ManagedResource)
    -> Result<()>;
}

/// Everything a controller talks to, injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub configs: Arc<dyn ConfigStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub usage: Arc<dyn UsageTracker>,
    pub status: Arc<dyn StatusWriter>,
    pub catalog: Arc<dyn DatabaseCatalog>,
    pub events: Arc<dyn EventRecorder>,
    pub clients: Arc<dyn ClientFactory>,
}

fn check_kind(expected: ResourceKind, resource: &dyn ManagedResource) -> Result<()> {
    let found = resource.kind();
    if found == expected {
        Ok(())
    } else {
        Err(Error::WrongKind { expected, found })
    }
}

/// Connecter for one statement kind
pub struct StatementConnector {
    kind: ResourceKind,
    collaborators: Collaborators,
    policy: AttemptPolicy,
}

impl StatementConnector {
    pub fn new(kind: ResourceKind, collaborators: Collaborators) -> Self {
        Self {
            kind,
            collaborators,
            policy: AttemptPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AttemptPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}

impl ExternalConnecter for StatementConnector {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn connect(
        &self,
        ctx: &ReconcileContext,
        resource: &dyn ManagedResource,
    ) -> Result<Box<dyn ExternalClient>> {
        check_kind(self.kind, resource)?;

        let c = &self.collaborators;
        let credentials =
            CredentialResolver::new(c.configs.as_ref(), c.secrets.as_ref(), c.usage.as_ref())
                .resolve(ctx, resource)?;

        let session = c
            .clients
            .new_client(&credentials, resource.database_name())
            .map_err(|e| match e {
                ClientError::Cancelled => Error::Cancelled,
                other => Error::Connect(ConnectError::Session(other)),
            })?;

        log::debug!(
            "{}: session open (database {:?})",
            resource.key(),
            resource.database_name()
        );

        Ok(Box::new(StatementClient {
            kind: self.kind,
            session,
            status: Arc::clone(&c.status),
            policy: self.policy,
        }))
    }
}

/// A session bound to one statement resource
pub struct StatementClient {
    kind: ResourceKind,
    session: Box<dyn ExecutionClient>,
    status: Arc<dyn StatusWriter>,
    policy: AttemptPolicy,
}

impl StatementClient {
    /// Run the statement once and turn the driver's answer into an outcome
    ///
    /// Cancellation is the only driver failure that is not an outcome.
    fn run(&mut self, ctx: &ReconcileContext, resource: &dyn ManagedResource) -> Result<Outcome> {
        log::info!("{}: executing statement", resource.key());
        match self.session.execute(ctx, resource.statement()) {
            Ok(result) => Ok(Outcome::succeeded(
                self.kind.success_message(),
                result.into_rows(),
            )),
            Err(ClientError::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                log::warn!("{}: statement failed: {e}", resource.key());
                Ok(Outcome::failed(e.to_string()))
            }
        }
    }
}

impl ExternalClient for StatementClient {
    fn observe(
        &mut self,
        _ctx: &ReconcileContext,
        resource: &dyn ManagedResource,
    ) -> Result<ExternalObservation> {
        check_kind(self.kind, resource)?;

        let synced = resource.status().synced;
        Ok(ExternalObservation {
            resource_exists: synced,
            resource_up_to_date: synced,
        })
    }

    fn create(
        &mut self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<ExternalCreation> {
        check_kind(self.kind, resource)?;

        if resource.status().synced {
            log::debug!("{}: already synced, not executing", resource.key());
            return Ok(ExternalCreation::default());
        }
        ctx.check()?;

        let status = Arc::clone(&self.status);
        let projector = StatusProjector::new(status.as_ref());

        if self.policy == AttemptPolicy::AtMostOnce {
            if resource.status().attempt_started_at.is_some() {
                log::warn!(
                    "{}: found an attempt without an outcome; not executing again",
                    resource.key()
                );
                projector.record(ctx, resource, Outcome::failed(UNRECORDED_ATTEMPT_ERROR))?;
                return Ok(ExternalCreation {
                    executed: false,
                    statement_failed: true,
                });
            }
            projector.mark_attempt(ctx, resource)?;
        }

        let outcome = self.run(ctx, resource)?;
        let statement_failed = outcome.is_failure();
        projector.record(ctx, resource, outcome)?;

        Ok(ExternalCreation {
            executed: true,
            statement_failed,
        })
    }

    fn update(
        &mut self,
        _ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<ExternalUpdate> {
        check_kind(self.kind, resource)?;
        Ok(ExternalUpdate)
    }

    fn delete(
        &mut self,
        _ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<()> {
        check_kind(self.kind, resource)
    }
}
