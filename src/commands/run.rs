//! `stmtctl run` - poll until stopped

use anyhow::Result;
use colored::Colorize;
use reconcile::ReconcileContext;

use crate::Context;
use crate::cli::RunArgs;
use crate::manager::Manager;
use crate::progress::PassProgress;
use crate::ui;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let (mut settings, store) = super::open(ctx)?;
    if let Some(interval) = args.interval {
        settings.poll_interval_secs = interval.max(1);
    }
    let settings = settings.with_overrides(args.jobs, args.timeout);

    if !ctx.quiet {
        ui::header("Reconciling continuously");
        ui::kv("Interval", &format!("{}s", settings.poll_interval_secs));
        ui::kv("Concurrency", &settings.max_concurrency.to_string());
        if let Some(max) = args.max_passes {
            ui::kv("Passes", &max.to_string());
        }
        println!();
    }

    let mut manager = Manager::new(store, settings)?;
    let mut progress = PassProgress::new(ctx.verbose > 0);
    let quiet = ctx.quiet;

    let total = manager.run(
        &ReconcileContext::background(),
        args.max_passes,
        &mut progress,
        |n, report| {
            if quiet || report.summary.total() == 0 {
                return;
            }
            println!("{}", format!("pass {n}").dimmed());
            super::print_summary(&report.summary);
        },
    )?;

    if !ctx.quiet {
        ui::section("Total");
        super::print_summary(&total);
    }
    Ok(())
}
