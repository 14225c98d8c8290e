//! Main entry point for the monoactor CLI.
//!
//! # Usage
//! Run the CLI with `run` or `validate` subcommands, providing an actor TOML
//! file or a directory of them.
//!
//! ```sh
//! monoactor -v run ./profiles
//! monoactor validate ./profiles/burst.toml
//! ```

use clap::{Parser, Subcommand};
use logging::setup_logging;
use tracing::{error, info};

use crate::collect_toml::collect_toml_paths;
use crate::errors::CLIError;

mod collect_toml;
mod errors;
mod load;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// monoactor - drive load through a single serial actor
#[derive(Parser, Debug)]
#[command(version = VERSION, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an actor per file, push its load through and print the stats
    Run {
        /// Path to an actor TOML file or directory containing multiple TOML files
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Parse and check actor files without starting anything
    Validate {
        /// Path to an actor TOML file or directory containing multiple TOML files
        #[arg(value_name = "PATH")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match &cli.command {
        Commands::Run { path } => {
            info!("Running actor file(s): {path}");
            for path in collect_toml_paths(path)? {
                info!("Executing: {}", path.display());
                let report = load::run_file(&path).await?;
                println!("# {}", path.display());
                println!("{}", load::render(&report)?);
            }
        }
        Commands::Validate { path } => {
            info!("Validating actor file(s): {path}");
            let mut invalid = 0;
            for path in collect_toml_paths(path)? {
                match load::read_file(&path).await {
                    Ok((config, profile)) => info!(
                        actor = %config.name,
                        messages = profile.total(),
                        "Valid: {}",
                        path.display()
                    ),
                    Err(report) => {
                        error!("Invalid: {}\n{report:?}", path.display());
                        invalid += 1;
                    }
                }
            }
            if invalid > 0 {
                Err(error_stack::Report::new(CLIError::Invalid(invalid)))?
            }
        }
    };

    Ok(())
}
