#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use cmd::{describe, generate, score};
use human_panic::setup_panic;
use lazy_static::lazy_static;

use crate::logging::init_logging;
use crate::opts::OutputWriter;
use crate::progress_bar::PstProgressBar;

mod cli;
mod cmd;
mod csv_output;
mod logging;
mod opts;
mod progress_bar;
mod sequences;

lazy_static! {
    pub(crate) static ref PROGRESS_BAR: PstProgressBar = PstProgressBar::new();
}

fn main() -> anyhow::Result<()> {
    setup_panic!();

    let cli: Cli = Cli::parse();

    if !cli.no_progress {
        PROGRESS_BAR.show();
    }

    init_logging(cli.verbose.log_level_filter()).expect("Could not initialize logging");

    match &cli.command {
        Commands::Describe { learn, csv } => {
            describe::describe(learn, *csv).context("Failed to describe the model")?;
        }
        Commands::Score {
            learn,
            sequences,
            output,
            per_sample,
            csv,
        } => {
            let options = score::ScoreOptions {
                sequences,
                output: OutputWriter::from_path(output)?,
                per_sample: *per_sample,
                csv: *csv,
            };

            score::score(learn, options).context("Failed to score given sequences")?;
        }
        Commands::Generate {
            learn,
            output,
            length,
            count,
            seed,
        } => {
            let output = OutputWriter::from_path(output)?;

            generate::generate(learn, output, *length, *count, *seed)
                .context("Failed to generate sequences")?;
        }
    }

    PROGRESS_BAR.finish();
    Ok(())
}
