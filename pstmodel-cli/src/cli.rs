use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::opts::{input_file, input_stream, InputFile, InputStream};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Don't display a progress bar/spinner
    #[clap(long, global = true, value_parser)]
    pub no_progress: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Options controlling how the model is learned from the training sequences.
#[derive(Args, Debug, Clone)]
pub struct LearnArgs {
    /// Training sequences, one per line; `-` is the standard input
    #[clap(value_parser = input_stream)]
    pub train: InputStream,

    /// JSON file with the learning thresholds; the options below override
    /// its values
    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,

    /// Minimum probability of a context to consider it at all
    #[clap(long, value_parser)]
    pub branch_absolute_min: Option<f64>,

    /// Minimum conditional probability of some symbol after a context to
    /// retain it
    #[clap(long, value_parser)]
    pub branch_conditional_min: Option<f64>,

    /// Minimum ratio between the conditional probabilities given a context
    /// and given its shorter suffix to retain it
    #[clap(long, value_parser)]
    pub p_ratio_min_max: Option<f64>,

    /// Maximum context length
    #[clap(long, value_parser)]
    pub max_depth: Option<usize>,

    /// Keep the model as a plain tree instead of converting it to an
    /// automaton
    #[clap(long, value_parser)]
    pub no_automaton: bool,

    /// Interpolate every distribution with its backoff with given factor.
    /// Requires an automaton
    #[clap(long, value_parser, value_name = "FACTOR", conflicts_with = "no_automaton")]
    pub backoff_smoothing: Option<f64>,

    /// Make sure no symbol has probability lower than given value
    #[clap(long, value_parser, value_name = "PROBABILITY")]
    pub floor: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Learn a model and print statistics about it
    Describe {
        #[clap(flatten)]
        learn: LearnArgs,

        /// Output the statistics as a CSV file to the standard output
        #[clap(long, value_parser)]
        csv: bool,
    },

    /// Learn a model and score every sequence of another file with it
    Score {
        #[clap(flatten)]
        learn: LearnArgs,

        /// Sequences to score, one per line
        #[clap(value_parser = input_file)]
        sequences: InputFile,

        /// Output file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        /// Output the mean log probability per symbol instead of the total
        #[clap(long, value_parser)]
        per_sample: bool,

        /// Output the scores as a CSV file
        #[clap(long, value_parser)]
        csv: bool,
    },

    /// Learn a model and generate random sequences with it
    Generate {
        #[clap(flatten)]
        learn: LearnArgs,

        /// Output file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        /// Length of each generated sequence
        #[clap(default_value_t = 100, short, long, value_parser)]
        length: usize,

        /// Number of sequences to generate
        #[clap(default_value_t = 1, short = 'n', long, value_parser)]
        count: usize,

        /// Seed of the random number generator
        #[clap(default_value_t = 0, long, value_parser)]
        seed: u64,
    },
}
