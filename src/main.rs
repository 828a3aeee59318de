mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod progress;
mod resource;
mod snapshot;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config_dir: Option<PathBuf>,
    pub org: Option<String>,
}

fn main() -> ExitCode {
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
        config_dir: cli.config_dir,
        org: cli.org,
    };

    match dispatch(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        // the report already listed every failure
        Err(e) if e.downcast_ref::<commands::RunFailed>().is_some() => ExitCode::FAILURE,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Diff(args) => commands::diff::run(ctx, args),
        Command::Apply(args) => commands::apply::run(ctx, args),
        Command::Snapshot(cmd) => commands::snapshot::run(ctx, cmd),
        Command::Restore(args) => commands::restore::run(ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "orgsync", &mut io::stdout());
            Ok(())
        }
    }
}
