//! Command-line interface for shiftgate.
//!
//! This module provides the CLI structure and argument parsing for the
//! `shiftgate` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    into_fields, parse_field, BatchesCommand, ConfigCommand, LoginCommand, MassBalancesCommand,
    PersonnelCommand, ProcessesCommand, ShiftsCommand, StatusCommand, TeamCommand, ViewCommand,
    WatchCommand,
};

/// shiftgate - Shift data for pyrolysis plant operators
///
/// Reads and writes production-shift records in the plant's Airtable base
/// and computes live shift metrics: yield, elapsed time, efficiency and
/// temperature alerts.
#[derive(Debug, Parser)]
#[command(name = "shiftgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show labelled sample data when no backend is configured
    #[arg(long, global = true)]
    pub sample: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show backend connection status
    Status(StatusCommand),

    /// Read and write shifts
    #[command(subcommand)]
    Shifts(ShiftsCommand),

    /// List active staff
    Personnel(PersonnelCommand),

    /// List production lots
    Processes(ProcessesCommand),

    /// List recent mass-balance readings
    MassBalances(MassBalancesCommand),

    /// List recent pyrolysis batches
    Batches(BatchesCommand),

    /// List the team roster
    Team(TeamCommand),

    /// Show the current shift with metrics
    View(ViewCommand),

    /// Refresh the current shift view until interrupted
    Watch(WatchCommand),

    /// Check a team member's identity code
    Login(LoginCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Logging level chosen by `-q` and `-v`.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
