use crate::runtime::{DEFAULT_MAX_DEPTH, MAX_DEPTH_CEILING};
use clap::{builder::RangedU64ValueParser, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "A small Lisp inside a simulated file system")]
pub struct Args {
    /// Maximum evaluation depth before a script is aborted
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_DEPTH,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_DEPTH_CEILING as u64)
    )]
    pub max_depth: usize,

    /// Host directory to copy into the simulated file system at startup
    #[arg(long)]
    pub seed: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every form in a host source file
    Run {
        /// Path to the source file
        file: PathBuf,
    },

    /// Parse a source file and print its forms without evaluating them
    Check {
        /// Path to the source file to check
        file: PathBuf,
    },

    /// Start an interactive session
    Repl,
}
