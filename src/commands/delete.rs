use anyhow::{Result, anyhow, bail};
use dialoguer::Confirm;
use reconcile::{ManagedResource, PassOutcome, ReconcileContext, ResourceKey};

use crate::Context;
use crate::cli::DeleteTarget;
use crate::manager::Manager;
use crate::progress::PassProgress;
use crate::store::FileStore;
use crate::ui;

pub fn run(ctx: &Context, target: &str, yes: bool) -> Result<()> {
    let target: DeleteTarget = target.parse().map_err(|e: String| anyhow!(e))?;

    if !yes && !confirm(&format!("Delete {}?", describe(&target)))? {
        ui::info("Aborted");
        return Ok(());
    }

    let (settings, store) = super::open(ctx)?;
    match target {
        DeleteTarget::ProviderConfig(name) => delete_provider_config(&store, &name),
        DeleteTarget::Resource(key) => {
            if !store.request_deletion(&key)? {
                bail!("{key} not found");
            }
            let mut manager = Manager::new(store, settings)?;
            release(ctx, &mut manager, &key)
        }
    }
}

fn describe(target: &DeleteTarget) -> String {
    match target {
        DeleteTarget::Resource(key) => key.to_string(),
        DeleteTarget::ProviderConfig(name) => format!("providerconfig/{name}"),
    }
}

fn delete_provider_config(store: &FileStore, name: &str) -> Result<()> {
    if store.delete_provider_config(name)? {
        ui::success(&format!("Deleted providerconfig/{name}"));
        Ok(())
    } else {
        bail!("providerconfig/{name} not found")
    }
}

/// Run the pass that observes the deletion request and releases the record
fn release(ctx: &Context, manager: &mut Manager, key: &ResourceKey) -> Result<()> {
    let mut progress = PassProgress::new(ctx.verbose > 0);
    let report = manager.pass(&ReconcileContext::background(), Some(key.kind), &mut progress)?;

    match report.reports.iter().find(|r| &r.key == key).map(|r| &r.outcome) {
        Some(Ok(PassOutcome::Deleted)) => {
            ui::success(&format!("Deleted {key}"));
            Ok(())
        }
        Some(Err(e)) => {
            ui::warn(&format!("Deletion of {key} is pending: {e}"));
            ui::dim("It will be released by a later pass.");
            Ok(())
        }
        _ => {
            let still_there = manager
                .store()
                .get_resource(key)?
                .is_some_and(|r| r.meta().deletion_requested);
            if still_there {
                ui::warn(&format!("Deletion of {key} is pending (backing off)"));
            }
            Ok(())
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(confirmed)
}
