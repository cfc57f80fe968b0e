mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::{run_reconcile, run_report, run_search};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile(args) => {
            run_reconcile(args)?;
        }
        Commands::Report(args) => {
            run_report(args)?;
        }
        Commands::Search(args) => {
            run_search(args)?;
        }
    }

    Ok(())
}
