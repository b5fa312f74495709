pub mod apply;
pub mod config;
pub mod delete;
pub mod pass;
pub mod run;
pub mod status;

use anyhow::Result;
use reconcile::ReconcileSummary;
use std::sync::Arc;

use crate::Context;
use crate::config::Settings;
use crate::store::FileStore;
use crate::ui;

/// Load settings and open the store they point at
pub(crate) fn open(ctx: &Context) -> Result<(Settings, Arc<FileStore>)> {
    let settings = Settings::load()?;
    let store = FileStore::new(settings.state_dir(ctx.state_dir.as_deref())?);
    log::debug!("State directory: {}", store.root().display());
    Ok((settings, Arc::new(store)))
}

/// Print the one-line outcome of a pass
pub(crate) fn print_summary(summary: &ReconcileSummary) {
    let line = format!(
        "{} executed, {} statement failures, {} up to date, {} deleted, {} errors, {} backing off",
        summary.created,
        summary.statement_failed,
        summary.up_to_date,
        summary.deleted,
        summary.failed,
        summary.skipped
    );
    if summary.is_success() {
        ui::success(&line);
    } else {
        ui::warn(&line);
    }
}
