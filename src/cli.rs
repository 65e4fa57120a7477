use clap::{ArgAction, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

pub mod commands;

use crate::output::OutputMode;

/// Read one line from stdin after flushing any pending prompt.
pub(crate) fn read_line_from_stdin() -> io::Result<String> {
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input)
}

#[derive(Parser)]
#[command(name = "ccooler")]
#[command(version)]
#[command(about = "Scan, select and clean disk-cleanup categories through one elevated session")]
#[command(
    long_about = "ccooler drives the cleanup engine of a Windows disk-cleanup app. \
    Without a real system backend it replays scripted fixtures so the whole \
    scan → select → elevated clean flow can be exercised from a terminal.\n\n\
    Examples:\n  \
    ccooler simulate fixture.toml           # scan, then ask before cleaning\n  \
    ccooler simulate fixture.toml --yes     # confirm the elevation prompt up front\n  \
    ccooler simulate fixture.toml --only 1,3 --json\n  \
    ccooler categories                      # list the cleanup categories"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run scan, selection and clean against a scripted fixture
    #[command(visible_alias = "sim")]
    Simulate {
        /// Fixture describing scan results and executor behavior
        fixture: PathBuf,

        /// Confirm the elevation prompt without asking
        #[arg(short = 'y', long)]
        yes: bool,

        /// Clean only these category ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,

        /// Print the final engine snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the cleanup categories
    Categories,

    /// Show or reset the configuration file
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Print the configuration file location
        #[arg(long, conflicts_with = "show")]
        path: bool,

        /// Overwrite the configuration file with defaults
        #[arg(long, conflicts_with_all = ["show", "path"])]
        reset: bool,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let mode = OutputMode::from_flags(self.verbose, self.quiet);
        match self.command {
            Commands::Simulate {
                fixture,
                yes,
                only,
                json,
            } => commands::simulate_command::handle_simulate(&fixture, yes, only, json, mode),
            Commands::Categories => commands::categories_command::handle_categories(),
            Commands::Config { path, reset, .. } => {
                commands::config_command::handle_config(path, reset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_simulate_parses_only_list() {
        let cli = Cli::parse_from(["ccooler", "simulate", "f.toml", "--only", "1,3", "-y"]);
        match cli.command {
            Commands::Simulate { only, yes, json, .. } => {
                assert_eq!(only, Some(vec!["1".to_string(), "3".to_string()]));
                assert!(yes);
                assert!(!json);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["ccooler", "-q", "-v", "categories"]).is_err());
    }
}
