//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

pub use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "dpe", version, about = "Dice pattern-scoring engine")]
pub struct Cli {
    /// Machine-readable JSON output and JSON logs
    #[arg(long, global = true, env = "DPE_ROBOT")]
    pub robot: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable logging entirely
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Explicit config file (skips global and project layers)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        if self.robot {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume a round feed and emit predictions
    Serve(commands::serve::ServeArgs),

    /// Show learned pattern statistics
    Stats(commands::stats::StatsArgs),

    /// Delete all learned statistics
    Reset(commands::reset::ResetArgs),

    /// Print the effective configuration
    Config(commands::config::ConfigArgs),

    /// Verify the store is reachable
    Check(commands::check::CheckArgs),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dpe", "stats", "--robot", "-vv"]).unwrap();
        assert!(cli.robot);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output_format(), OutputFormat::Json);
    }
}
