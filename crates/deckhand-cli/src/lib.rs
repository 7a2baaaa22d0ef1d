//! Deckhand CLI library

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// Deckhand - resolve workload variables into a canonical workload spec
#[derive(Parser, Debug)]
#[command(name = "deckhand")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a variables file and print the workload spec
    Resolve(commands::resolve::ResolveArgs),
    /// Resolve a variables file and print a one-line summary
    Validate(commands::validate::ValidateArgs),
    /// Print the JSON Schema of the resolved workload spec
    Schema,
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Resolve(args) => commands::resolve::run(args),
            Commands::Validate(args) => commands::validate::run(args),
            Commands::Schema => commands::schema::run(),
        }
    }
}
