//! Controller bootstrap: wires the file store, the SQLite client and the
//! event log into one executor per process.

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{
    Collaborators, ExecutionReport, Executor, LogRecorder, ProgressCallback,
    ReconcileContext, ReconcileSummary, Reconciler, ResourceKind, StatementConnector,
};
use sqlclient::SqliteClientFactory;
use std::sync::Arc;

use crate::config::Settings;
use crate::store::FileStore;

pub struct Manager {
    store: Arc<FileStore>,
    executor: Executor,
    settings: Settings,
}

impl Manager {
    pub fn new(store: Arc<FileStore>, settings: Settings) -> Result<Self> {
        let collaborators = Collaborators {
            configs: store.clone(),
            secrets: store.clone(),
            usage: store.clone(),
            status: store.clone(),
            catalog: store.clone(),
            events: Arc::new(LogRecorder),
            clients: Arc::new(SqliteClientFactory),
        };

        let mut executor = Executor::new(settings.reconcile_options())
            .context("Could not start worker pool")?
            .with_retry_policy(settings.retry.policy());

        for kind in ResourceKind::ALL {
            let connector = StatementConnector::new(kind, collaborators.clone())
                .with_policy(settings.attempt_policy);
            executor.register(Reconciler::for_statements(connector));
        }

        Ok(Self {
            store,
            executor,
            settings,
        })
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Run one pass over stored resources, optionally of one kind
    ///
    /// Resources whose deletion completed are released from the store.
    pub fn pass<P: ProgressCallback>(
        &mut self,
        ctx: &ReconcileContext,
        kind: Option<ResourceKind>,
        progress: &mut P,
    ) -> Result<ExecutionReport> {
        let mut resources = self.store.list_resources(kind)?;
        log::debug!("Reconciling {} resources", resources.len());

        let report = self.executor.execute(ctx, &mut resources, progress);

        for key in report.deleted() {
            self.store
                .remove_resource(key)
                .with_context(|| format!("Could not release {key}"))?;
        }

        Ok(report)
    }

    /// Poll until `max_passes` passes ran or the context is cancelled
    pub fn run<P, F>(
        &mut self,
        ctx: &ReconcileContext,
        max_passes: Option<usize>,
        progress: &mut P,
        mut on_pass: F,
    ) -> Result<ReconcileSummary>
    where
        P: ProgressCallback,
        F: FnMut(usize, &ExecutionReport),
    {
        let interval = self.settings.poll_interval();
        let mut total = ReconcileSummary::default();
        let mut passes = 0;

        loop {
            let report = self.pass(ctx, None, progress)?;
            passes += 1;
            total.merge(&report.summary);
            on_pass(passes, &report);

            if max_passes.is_some_and(|max| passes >= max) || ctx.is_cancelled() {
                break;
            }
            log::debug!("Sleeping {}s before next pass", interval.as_secs());
            std::thread::sleep(interval);
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Object;
    use reconcile::{AnyResource, DatabaseTarget, ManagedResource, NoProgress, ResourceKey};
    use tempfile::TempDir;

    fn setup(endpoint: &str) -> (TempDir, Manager) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(tmp.path().join("state")));

        store
            .apply(
                Object::parse(
                    r#"
kind = "ProviderConfig"
[metadata]
name = "default"
[spec.credentials.connectionSecretRef]
name = "db-conn"
"#,
                )
                .unwrap(),
            )
            .unwrap();
        store
            .apply(
                Object::parse(&format!(
                    "kind = \"Secret\"\n[metadata]\nname = \"db-conn\"\n[data]\nendpoint = '{endpoint}'\n"
                ))
                .unwrap(),
            )
            .unwrap();

        let manager = Manager::new(store, Settings::default()).unwrap();
        (tmp, manager)
    }

    fn resource(kind: ResourceKind, name: &str, sql: &str) -> AnyResource {
        AnyResource::new(kind, name, DatabaseTarget::named("app"), sql)
    }

    #[test]
    fn test_statements_run_once_across_passes() {
        let tmp = TempDir::new().unwrap();
        let dbs = tmp.path().join("dbs");
        let (_state, mut manager) = setup(&dbs.to_string_lossy());
        let ctx = ReconcileContext::background();

        manager
            .store()
            .put_resource(resource(
                ResourceKind::Exec,
                "create-t",
                "CREATE TABLE t (n INTEGER)",
            ))
            .unwrap();

        let first = manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(first.summary.created, 1);

        let second = manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(second.summary.created, 0);
        assert_eq!(second.summary.up_to_date, 1);

        let stored = manager
            .store()
            .get_resource(&ResourceKey::new(ResourceKind::Exec, "create-t"))
            .unwrap()
            .unwrap();
        assert!(stored.status().synced);
        assert_eq!(
            stored.status().at_provider.message,
            "SQL exec statement executed successfully"
        );
        assert!(dbs.join("app.db").exists());
    }

    #[test]
    fn test_query_results_and_failures_recorded() {
        let (_tmp, mut manager) = setup(":memory:");
        let ctx = ReconcileContext::background();
        let store = manager.store();
        store
            .put_resource(resource(ResourceKind::Query, "one", "SELECT 1 AS x"))
            .unwrap();
        store
            .put_resource(resource(ResourceKind::Execute, "bad", "SELECT * FROM missing"))
            .unwrap();

        let report = manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.statement_failed, 1);

        let one = manager
            .store()
            .get_resource(&ResourceKey::new(ResourceKind::Query, "one"))
            .unwrap()
            .unwrap();
        assert_eq!(one.status().at_provider.results[0].get("x"), Some("1"));

        let bad = manager
            .store()
            .get_resource(&ResourceKey::new(ResourceKind::Execute, "bad"))
            .unwrap()
            .unwrap();
        assert!(bad.status().failed());
        assert!(bad.status().at_provider.error.contains("no such table"));
    }

    #[test]
    fn test_deletion_releases_record() {
        let (_tmp, mut manager) = setup(":memory:");
        let ctx = ReconcileContext::background();
        let key = ResourceKey::new(ResourceKind::Query, "one");
        manager
            .store()
            .put_resource(resource(ResourceKind::Query, "one", "SELECT 1"))
            .unwrap();
        manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(manager.store().usages("default").unwrap(), ["query.one"]);

        manager.store().request_deletion(&key).unwrap();
        let report = manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(report.summary.deleted, 1);
        assert!(manager.store().get_resource(&key).unwrap().is_none());
        assert!(manager.store().usages("default").unwrap().is_empty());
    }

    #[test]
    fn test_missing_provider_config_fails_pass() {
        let (_tmp, mut manager) = setup(":memory:");
        let ctx = ReconcileContext::background();
        let AnyResource::Query(query) = resource(ResourceKind::Query, "one", "SELECT 1") else {
            unreachable!()
        };
        manager
            .store()
            .put_resource(query.with_provider_config("missing").into())
            .unwrap();

        let report = manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(report.summary.failed, 1);

        // held back by backoff on the immediate next pass
        let again = manager.pass(&ctx, None, &mut NoProgress).unwrap();
        assert_eq!(again.summary.skipped, 1);
    }

    #[test]
    fn test_run_stops_after_max_passes() {
        let (_tmp, mut manager) = setup(":memory:");
        let ctx = ReconcileContext::background();
        let mut seen = Vec::new();

        let total = manager
            .run(&ctx, Some(1), &mut NoProgress, |n, _| seen.push(n))
            .unwrap();
        assert_eq!(seen, [1]);
        assert_eq!(total.total(), 0);
    }
}
