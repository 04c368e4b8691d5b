mod cli;
mod commands;
mod kinds;
mod manifest;
mod paths;
mod plan;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
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
    };

    let conn = &cli.connection;
    match &cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, conn, args),
        Command::Apply(args) => commands::apply::run(&ctx, conn, args),
        Command::Import(args) => commands::import::run(&ctx, conn, args),
        Command::Read(args) => commands::read::run(&ctx, conn, args),
        Command::Destroy(args) => commands::destroy::run(&ctx, conn, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "sentryctl", &mut io::stdout());
            Ok(())
        }
    }
}
