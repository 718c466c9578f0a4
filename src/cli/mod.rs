//! Command-line surface (§6), grounded in the teacher's `Cli`/`Command`
//! shape.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "year-reconciler", about = "Reconciles album release years across a music library")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the year-reconciliation pipeline once.
    Run {
        /// Apply updates even when the cached/dominant year already matches.
        #[arg(long)]
        force: bool,

        /// Record intended library mutations without performing them.
        #[arg(long)]
        dry_run: bool,

        /// Restrict processing to a single artist (useful for smoke-testing
        /// a config change against one library slice).
        #[arg(long)]
        test_artist: Option<String>,
    },

    /// Print albums awaiting manual verification.
    Pending,
}
