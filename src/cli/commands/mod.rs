//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

pub mod check;
pub mod config;
pub mod reset;
pub mod serve;
pub mod stats;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Serve(args) => serve::run(ctx, args),
        Commands::Stats(args) => stats::run(ctx, args),
        Commands::Reset(args) => reset::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
        Commands::Check(args) => check::run(ctx, args),
    }
}
