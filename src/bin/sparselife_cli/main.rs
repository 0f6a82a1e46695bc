mod run;
mod stats;
mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};
use run::{run_run, RunArgs};
use stats::{run_stats, StatsArgs};
use update::{run_update, UpdateArgs};

#[derive(Parser, Debug)]
#[command(version, about)]
struct CLIParser {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Watch the simulation live in the terminal with keyboard control
    Run(RunArgs),
    /// Advance a pattern by many generations without a display and save the result
    Update(UpdateArgs),
    /// Print a pattern's population, bounding box and hash
    Stats(StatsArgs),
}

fn main() -> Result<()> {
    let args = CLIParser::parse();

    match args.action {
        Action::Run(args) => run_run(args),
        Action::Update(args) => run_update(args),
        Action::Stats(args) => run_stats(args),
    }
}
