//! Command-line argument parsing for cyclekeeper
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cyclekeeper - adaptive pacing and self-healing for a repeated risky operation
#[derive(Parser, Debug)]
#[command(name = "cyclekeeper")]
#[command(version)]
#[command(about = "Pace a repeated operation and recover it when it fails", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run a shell command as the paced operation until interrupted
    Run {
        /// Shell command executed once per cycle (exit code 0 = success)
        #[arg(long, value_name = "COMMAND")]
        command: String,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Do not start the periodic health monitor
        #[arg(long)]
        no_health_monitor: bool,

        /// Seed for reproducible waits
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a full health check and print the report
    Doctor {
        /// Only run the fast subset (memory, network, one service)
        #[arg(long)]
        quick: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the wait sequence the controller would produce
    Simulate {
        /// Number of simulated cycles
        #[arg(long, default_value_t = 20)]
        cycles: u32,

        /// Probability that a simulated cycle fails
        #[arg(long, default_value_t = 0.1)]
        failure_rate: f64,

        /// Local hour the simulation starts at (0-23)
        #[arg(long)]
        start_hour: Option<u32>,

        /// Seed for the wait and failure draws
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Display the effective configuration
    Config {
        /// Write the effective configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Check argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Commands::Run { command, .. } if command.trim().is_empty() => {
                Err("Run command cannot be empty.".to_string())
            }
            Commands::Simulate { failure_rate, .. } if !(0.0..=1.0).contains(failure_rate) => {
                Err("--failure-rate must be between 0 and 1.".to_string())
            }
            Commands::Simulate {
                start_hour: Some(hour),
                ..
            } if *hour > 23 => Err("--start-hour must be between 0 and 23.".to_string()),
            _ => Ok(()),
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default log directive for this crate
    pub fn log_level(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }

    /// Check if should show per-cycle output
    pub fn show_events(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["cyclekeeper", "-q", "doctor"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["cyclekeeper", "doctor"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["cyclekeeper", "-v", "doctor"]).verbosity(), Verbosity::Verbose);
        assert_eq!(
            parse(&["cyclekeeper", "doctor", "-vv"]).verbosity(),
            Verbosity::VeryVerbose
        );
    }

    #[test]
    fn test_run_command() {
        let args = parse(&["cyclekeeper", "run", "--command", "./job.sh --fast", "--cycles", "3"]);
        match args.command {
            Commands::Run {
                command, cycles, ..
            } => {
                assert_eq!(command, "./job.sh --fast");
                assert_eq!(cycles, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(parse(&["cyclekeeper", "run", "--command", "true"]).validate().is_ok());
    }

    #[test]
    fn test_simulate_defaults() {
        let args = parse(&["cyclekeeper", "simulate"]);
        assert_eq!(
            args.command,
            Commands::Simulate {
                cycles: 20,
                failure_rate: 0.1,
                start_hour: None,
                seed: None,
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(parse(&["cyclekeeper", "run", "--command", " "]).validate().is_err());
        assert!(parse(&["cyclekeeper", "simulate", "--failure-rate", "1.5"])
            .validate()
            .is_err());
        assert!(parse(&["cyclekeeper", "simulate", "--start-hour", "24"])
            .validate()
            .is_err());
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["cyclekeeper"]).is_err());
    }

    #[test]
    fn test_verbosity_methods() {
        assert_eq!(Verbosity::Quiet.log_level(), "error");
        assert_eq!(Verbosity::Verbose.log_level(), "debug");
        assert!(!Verbosity::Quiet.show_events());
        assert!(Verbosity::Normal.show_events());
    }
}
