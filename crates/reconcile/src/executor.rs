//! Execution engine - runs reconciliation passes with bounded parallelism

use crate::backoff::{BackoffTracker, RetryPolicy};
use crate::context::{ProgressCallback, ReconcileContext};
use crate::error::Error;
use crate::reconciler::Reconciler;
use crate::resource::{AnyResource, ManagedResource};
use crate::types::{PassOutcome, ReconcileOptions, ReconcileSummary, ResourceKey, ResourceKind};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

/// Result of one resource's pass
#[derive(Debug)]
pub struct PassReport {
    pub key: ResourceKey,
    /// Version the pass started from
    pub resource_version: u64,
    pub outcome: Result<PassOutcome, Error>,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Everything one scheduler pass did
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub summary: ReconcileSummary,
    pub reports: Vec<PassReport>,
}

impl ExecutionReport {
    /// Reports of passes that returned an error
    pub fn failures(&self) -> impl Iterator<Item = &PassReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }

    /// Keys of resources whose deletion completed
    pub fn deleted(&self) -> impl Iterator<Item = &ResourceKey> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, Ok(PassOutcome::Deleted)))
            .map(|r| &r.key)
    }
}

/// Bounded-concurrency scheduler over registered per-kind reconcilers
pub struct Executor {
    reconcilers: BTreeMap<ResourceKind, Reconciler>,
    backoff: BackoffTracker,
    options: ReconcileOptions,
    pool: rayon::ThreadPool,
}

impl Executor {
    /// Create an executor with a worker pool of `options.jobs` threads
    pub fn new(options: ReconcileOptions) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .thread_name(|i| format!("reconcile-{i}"))
            .build()?;

        Ok(Self {
            reconcilers: BTreeMap::new(),
            backoff: BackoffTracker::default(),
            options,
            pool,
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.backoff = BackoffTracker::new(policy);
        self
    }

    /// Register the reconciler driving one kind
    pub fn register(&mut self, reconciler: Reconciler) {
        self.reconcilers.insert(reconciler.kind(), reconciler);
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn backoff(&self) -> &BackoffTracker {
        &self.backoff
    }

    /// Run one pass over `resources`
    ///
    /// Resources are batched by kind; within a batch at most `jobs` passes
    /// run at once and each resource is handled by exactly one worker.
    /// Resources held back by backoff are counted as skipped.
    pub fn execute<P: ProgressCallback>(
        &mut self,
        ctx: &ReconcileContext,
        resources: &mut [AnyResource],
        progress: &mut P,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let started = Instant::now();

        for kind in ResourceKind::ALL {
            if ctx.is_cancelled() {
                break;
            }

            let Some(reconciler) = self.reconcilers.get(&kind) else {
                let unhandled = resources.iter().filter(|r| r.kind() == kind).count();
                if unhandled > 0 {
                    log::warn!("No controller registered for {kind}; skipping {unhandled} resources");
                    report.summary.skipped += unhandled;
                }
                continue;
            };

            let mut batch = Vec::new();
            for resource in resources.iter_mut().filter(|r| r.kind() == kind) {
                if self
                    .backoff
                    .is_ready(&resource.key(), resource.meta().resource_version, started)
                {
                    batch.push(resource);
                } else {
                    log::debug!("{}: backing off", resource.key());
                    report.summary.skipped += 1;
                }
            }
            if batch.is_empty() {
                continue;
            }

            progress.on_batch_start(kind, batch.len());
            let results = self.run_batch(ctx, reconciler, batch);
            for result in results {
                progress.on_resource_complete(&result.key, &result);
                match &result.outcome {
                    Ok(outcome) => {
                        report.summary.add_outcome(outcome);
                        self.backoff.record_success(&result.key);
                    }
                    Err(e) => {
                        log::warn!("{}: {e}", result.key);
                        report.summary.failed += 1;
                        self.backoff.record_failure(
                            &result.key,
                            result.resource_version,
                            e.category(),
                            Instant::now(),
                        );
                    }
                }
                report.reports.push(result);
            }
            progress.on_batch_complete();
        }

        report
    }

    fn run_batch(
        &self,
        ctx: &ReconcileContext,
        reconciler: &Reconciler,
        batch: Vec<&mut AnyResource>,
    ) -> Vec<PassReport> {
        let timeout = self.options.timeout;

        self.pool.install(|| {
            batch
                .into_par_iter()
                .map(|resource| {
                    let pass_ctx = match timeout {
                        Some(t) => ctx.with_timeout(t),
                        None => ctx.clone(),
                    };
                    let resource_version = resource.meta().resource_version;
                    let outcome = reconciler.reconcile(&pass_ctx, resource.as_managed_mut());
                    PassReport {
                        key: resource.key(),
                        resource_version,
                        outcome,
                    }
                })
                .collect()
        })
    }
}
