//! QuoteSync command-line entry point.
//!
//! # Responsibility
//! - Load configuration, start file logging and dispatch one subcommand.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use quotesync_core::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config();

    // Logging is best-effort; a read-only log dir must not block the CLI.
    if let Err(err) = init_logging(&config.logging.level, &config.logging.dir) {
        eprintln!("Logging disabled: {err}");
    }

    cli::run(cli.command, &config)
}
