mod run_eval;
mod run_fit;

use crate::run_eval::*;
use crate::run_fit::*;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit the Capsule model to dated documents of entities
    Fit(FitArgs),

    /// Rank held-out terms with a saved snapshot of factors
    Eval(EvalArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Fit(args) => {
            run_capsule_fit(args.clone())?;
        }
        Commands::Eval(args) => {
            run_capsule_eval(args.clone())?;
        }
    }

    Ok(())
}
