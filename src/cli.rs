//! Command-line interface for the instruction selector.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "isel")]
#[command(about = "Tree pattern instruction selection", long_about = None)]
pub struct Cli {
    /// Log compiler and matcher decisions (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse a pattern and print its canonical form
    Parse {
        /// Pattern text, e.g. "(Mul (Add a b) Const=c)"
        pattern: String,
    },

    /// Compile a rule table and list the ranked rules per root kind
    Check {
        /// JSON rule table
        rules: PathBuf,
    },

    /// Run instruction selection over every block of a textual graph
    Select {
        /// JSON rule table
        rules: PathBuf,

        /// Graph in `^block:` / `%v = Kind %a, %b` text form
        graph: PathBuf,

        /// Emit conflicting roots standalone instead of trying lower-ranked rules
        #[arg(long)]
        no_retry: bool,
    },
}
