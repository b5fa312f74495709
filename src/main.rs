mod cli;
mod commands;
mod config;
mod manager;
mod objects;
mod paths;
mod progress;
mod store;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub state_dir: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        state_dir: cli.state_dir,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, &args.files),
        Command::Reconcile(args) => commands::pass::run(&ctx, args.kind, args.jobs, args.timeout),
        Command::Run(args) => commands::run::run(&ctx, args),
        Command::Status(args) => commands::status::run(&ctx, args.target.as_deref(), args.json),
        Command::Delete(args) => commands::delete::run(&ctx, &args.target, args.yes),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "stmtctl", &mut io::stdout());
            Ok(())
        }
    }
}
