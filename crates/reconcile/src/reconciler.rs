//! One reconciliation pass for one resource
//!
//! Resolve references, connect, observe, then at most one of
//! delete / create / update. Failures are reported as events and returned;
//! statement failures are not failures of the pass.

use crate::controller::{ExternalConnecter, StatementConnector};
use crate::context::{DatabaseCatalog, ReconcileContext};
use crate::error::Result;
use crate::events::{Event, EventRecorder, reason};
use crate::references::resolve_database;
use crate::resource::ManagedResource;
use crate::types::{PassOutcome, ResourceKind};
use std::sync::Arc;

/// Drives passes for resources of one kind
pub struct Reconciler {
    connecter: Box<dyn ExternalConnecter>,
    catalog: Arc<dyn DatabaseCatalog>,
    events: Arc<dyn EventRecorder>,
}

impl Reconciler {
    pub fn new(
        connecter: Box<dyn ExternalConnecter>,
        catalog: Arc<dyn DatabaseCatalog>,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            connecter,
            catalog,
            events,
        }
    }

    /// Build from a statement connector, sharing its catalog and recorder
    pub fn for_statements(connector: StatementConnector) -> Self {
        let catalog = Arc::clone(&connector.collaborators().catalog);
        let events = Arc::clone(&connector.collaborators().events);
        Self::new(Box::new(connector), catalog, events)
    }

    pub fn kind(&self) -> ResourceKind {
        self.connecter.kind()
    }

    /// Run one pass
    pub fn reconcile(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<PassOutcome> {
        self.pass(ctx, resource).inspect_err(|e| {
            self.events
                .record(&resource.key(), Event::warning(e.reason(), e.to_string()));
        })
    }

    fn pass(&self, ctx: &ReconcileContext, resource: &mut dyn ManagedResource) -> Result<PassOutcome> {
        let key = resource.key();
        let deleting = resource.meta().deletion_requested;
        log::debug!("{key}: reconciling");

        if !deleting {
            resolve_database(ctx, self.catalog.as_ref(), resource)?;
        }

        let mut client = self.connecter.connect(ctx, resource)?;
        let observation = client.observe(ctx, resource)?;

        if deleting {
            if observation.resource_exists {
                client.delete(ctx, resource)?;
            }
            self.events.record(
                &key,
                Event::normal(reason::DELETED, "Released declarative record"),
            );
            return Ok(PassOutcome::Deleted);
        }

        if !observation.resource_exists {
            let creation = client.create(ctx, resource)?;
            if creation.statement_failed {
                let error = resource.status().at_provider.error.clone();
                self.events
                    .record(&key, Event::warning(reason::STATEMENT_FAILED, error));
            } else if creation.executed {
                self.events.record(
                    &key,
                    Event::normal(reason::CREATED, resource.status().at_provider.message.clone()),
                );
            }
            return Ok(PassOutcome::Created {
                statement_failed: creation.statement_failed,
            });
        }

        if !observation.resource_up_to_date {
            client.update(ctx, resource)?;
            return Ok(PassOutcome::Updated);
        }

        log::debug!("{key}: up to date");
        Ok(PassOutcome::UpToDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::provider::Database;
    use crate::resource::{DatabaseTarget, Query, Reference};
    use crate::rows::Row;
    use crate::testing::{World, exec, query};

    fn reconciler(world: &World, kind: ResourceKind) -> Reconciler {
        Reconciler::for_statements(StatementConnector::new(kind, world.collaborators()))
    }

    #[test]
    fn test_two_passes_execute_once() {
        let world = World::new();
        let row: Row = [("x", "1")].into_iter().collect();
        world.clients.returning(vec![row]);
        let ctx = ReconcileContext::background();
        let mut resource = query("q", "SELECT 1 AS x");
        let r = reconciler(&world, ResourceKind::Query);

        let first = r.reconcile(&ctx, &mut resource).unwrap();
        let second = r.reconcile(&ctx, &mut resource).unwrap();

        assert_eq!(
            first,
            PassOutcome::Created {
                statement_failed: false
            }
        );
        assert_eq!(second, PassOutcome::UpToDate);
        assert_eq!(world.clients.executions(), 1);
        assert_eq!(world.events.reasons(), vec![reason::CREATED]);
    }

    #[test]
    fn test_statement_failure_is_a_successful_pass() {
        let world = World::new();
        world.clients.failing_with("login does not exist");
        let ctx = ReconcileContext::background();
        let mut resource = exec("drop-bob", "DROP LOGIN bob");

        let outcome = reconciler(&world, ResourceKind::Exec)
            .reconcile(&ctx, &mut resource)
            .unwrap();

        assert_eq!(
            outcome,
            PassOutcome::Created {
                statement_failed: true
            }
        );
        assert_eq!(world.events.reasons(), vec![reason::STATEMENT_FAILED]);
    }

    #[test]
    fn test_connect_failure_emits_event() {
        let world = World::new();
        let ctx = ReconcileContext::background();
        let mut resource = query("q", "SELECT 1").with_provider_config("missing");

        let err = reconciler(&world, ResourceKind::Query)
            .reconcile(&ctx, &mut resource)
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(!resource.status.synced);
        assert_eq!(world.events.reasons(), vec![reason::CANNOT_CONNECT]);
    }

    #[test]
    fn test_reference_resolved_before_connect() {
        let world = World::new();
        world
            .catalog
            .insert(Database::new("orders").with_external_name("orders_prod"));
        let ctx = ReconcileContext::background();
        let mut resource = Query::new(
            "q",
            DatabaseTarget {
                database_ref: Some(Reference::new("orders")),
                ..Default::default()
            },
            "SELECT 1",
        );

        reconciler(&world, ResourceKind::Query)
            .reconcile(&ctx, &mut resource)
            .unwrap();

        assert_eq!(world.clients.opened(), vec!["orders_prod".to_string()]);
    }

    #[test]
    fn test_unresolvable_reference_skips_connect() {
        let world = World::new();
        let ctx = ReconcileContext::background();
        let mut resource = Query::new(
            "q",
            DatabaseTarget {
                database_ref: Some(Reference::new("gone")),
                ..Default::default()
            },
            "SELECT 1",
        );

        let err = reconciler(&world, ResourceKind::Query)
            .reconcile(&ctx, &mut resource)
            .unwrap_err();

        assert!(matches!(err, Error::References(_)));
        assert!(world.usage.tracked().is_empty());
        assert_eq!(world.events.reasons(), vec![reason::CANNOT_RESOLVE_REFERENCES]);
    }

    #[test]
    fn test_deletion_never_executes() {
        let world = World::new();
        let ctx = ReconcileContext::background();
        let mut resource = query("q", "SELECT 1");
        resource.metadata.deletion_requested = true;

        let outcome = reconciler(&world, ResourceKind::Query)
            .reconcile(&ctx, &mut resource)
            .unwrap();

        assert_eq!(outcome, PassOutcome::Deleted);
        assert_eq!(world.clients.executions(), 0);
        assert!(!resource.status.synced);
    }
}
