//! `stmtctl reconcile` - a single pass

use anyhow::{Result, bail};
use reconcile::{ReconcileContext, ResourceKind};

use crate::Context;
use crate::manager::Manager;
use crate::progress::PassProgress;
use crate::ui;

pub fn run(
    ctx: &Context,
    kind: Option<ResourceKind>,
    jobs: Option<usize>,
    timeout: Option<u64>,
) -> Result<()> {
    let (settings, store) = super::open(ctx)?;
    let settings = settings.with_overrides(jobs, timeout);
    let mut manager = Manager::new(store, settings)?;

    if !ctx.quiet {
        ui::header(&match kind {
            Some(kind) => format!("Reconciling {kind} resources"),
            None => "Reconciling".to_string(),
        });
    }

    let mut progress = PassProgress::new(ctx.verbose > 0);
    let report = manager.pass(&ReconcileContext::background(), kind, &mut progress)?;

    if report.summary.total() == 0 {
        ui::info("No resources stored");
        return Ok(());
    }

    super::print_summary(&report.summary);
    if !report.summary.is_success() {
        bail!("{} resource(s) could not be reconciled", report.summary.failed);
    }
    Ok(())
}
