//! macsy-worker: detect co-occurring gene modules ("macromolecular systems")
//! from HMM-profile hits against prokaryotic protein datasets.

pub mod cli;
pub mod cluster;
pub mod combination;
pub mod common;
pub mod err;
pub mod hit;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod replicon;
pub mod solution;
pub mod system;

use clap::{Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Detect macromolecular systems from HMM hits",
    long_about = "This tool clusters HMM-profile hits along replicons, assembles \
                  candidate systems that satisfy a model's quorum, and selects the \
                  best non-conflicting set of systems."
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect macromolecular systems for a set of models against precomputed hits.
    Detect(cli::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Detect(args) => {
                cli::run(&cli.common, args)?;
            }
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
