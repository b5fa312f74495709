use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Local, Utc};
use colored::{Color, Colorize};
use reconcile::{AnyResource, ManagedResource, ResourceKey, ResourceKind, Status, SyncState};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>, json: bool) -> Result<()> {
    let (_settings, store) = super::open(ctx)?;

    let resources = match target {
        Some(t) if t.contains('/') => {
            let key: ResourceKey = t.parse().map_err(|e: String| anyhow!(e))?;
            match store.get_resource(&key)? {
                Some(resource) => vec![resource],
                None => bail!("{key} not found"),
            }
        }
        Some(t) => {
            let kind: ResourceKind = t.parse().map_err(|e: String| anyhow!(e))?;
            store.list_resources(Some(kind))?
        }
        None => store.list_resources(None)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&resources)?);
        return Ok(());
    }

    match resources.as_slice() {
        [] => ui::info("No resources stored"),
        [single] if target.is_some_and(|t| t.contains('/')) => show_detail(single),
        all => show_table(all),
    }
    Ok(())
}

fn outcome(status: &Status) -> (&'static str, Color) {
    match status.state() {
        SyncState::Unsynced if status.attempt_started_at.is_some() => ("attempting", Color::Yellow),
        SyncState::Unsynced => ("pending", Color::BrightBlack),
        SyncState::Synced if status.failed() => ("failed", Color::Red),
        SyncState::Synced => ("succeeded", Color::Green),
    }
}

fn show_table(resources: &[AnyResource]) {
    ui::header("Statement Resources");
    println!();
    println!(
        "  {:<8} {:<32} {:<10} {}",
        "KIND".bold(),
        "NAME".bold(),
        "OUTCOME".bold(),
        "STATEMENT".bold()
    );

    for resource in resources {
        let mut name = ui::truncate(resource.name(), 32);
        if resource.meta().deletion_requested {
            name.push('*');
        }
        let (label, color) = outcome(resource.status());
        println!(
            "  {:<8} {:<32} {} {}",
            resource.kind().as_str(),
            name,
            format!("{label:<10}").color(color),
            ui::truncate(resource.statement(), 48).dimmed()
        );
    }

    if resources.iter().any(|r| r.meta().deletion_requested) {
        println!();
        ui::dim("* deletion requested");
    }
}

fn show_detail(resource: &AnyResource) {
    let status = resource.status();
    ui::header(&resource.key().to_string());

    ui::kv("Statement", resource.statement());
    let target = resource.target();
    if let Some(db) = &target.database {
        ui::kv("Database", db);
    } else if let Some(r) = &target.database_ref {
        ui::kv("Database ref", &r.name);
    } else if let Some(selector) = &target.database_selector {
        ui::kv("Database selector", &selector.to_string());
    }
    ui::kv("ProviderConfig", resource.provider_config_name());
    ui::kv("Version", &resource.meta().resource_version.to_string());
    ui::kv("Synced", &status.synced.to_string());
    let (label, color) = outcome(status);
    ui::kv("Outcome", &label.color(color).to_string());
    if let Some(at) = status.attempt_started_at {
        ui::kv("Attempt started", &format_time(at));
    }
    if resource.meta().deletion_requested {
        ui::kv("Deletion", &"requested".yellow().to_string());
    }

    let observed = &status.at_provider;
    if !observed.message.is_empty() {
        ui::kv("Message", &observed.message);
    }
    if !observed.error.is_empty() {
        ui::kv("Error", &observed.error.red().to_string());
    }

    if !observed.results.is_empty() {
        ui::section(&format!("Results ({} rows)", observed.results.len()));
        for row in &observed.results {
            let cells: Vec<String> = row.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("  {}", cells.join("  "));
        }
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}
