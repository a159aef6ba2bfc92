//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::entities::{ProcessStatus, Role};
use crate::record::Fields;

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Shift commands.
#[derive(Debug, Subcommand)]
pub enum ShiftsCommand {
    /// List shifts
    List {
        /// Only shifts that started on this date (YYYY-MM-DD)
        #[arg(short, long, conflicts_with = "active")]
        date: Option<NaiveDate>,

        /// Only shifts that started with the plant running
        #[arg(short, long)]
        active: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show one shift
    Get {
        /// Record id
        id: String,

        /// Print raw fields with legacy column aliases filled in
        #[arg(long)]
        legacy_fields: bool,
    },

    /// Show the shift in progress
    Current {
        /// Prefer this record id if it exists
        #[arg(long)]
        id: Option<String>,
    },

    /// Create a shift
    Create {
        /// Field value as NAME=VALUE; VALUE is parsed as JSON when possible
        #[arg(short, long = "field", value_name = "NAME=VALUE", value_parser = parse_field, required = true)]
        fields: Vec<(String, Value)>,
    },

    /// Update fields of a shift
    Update {
        /// Record id
        id: String,

        /// Field value as NAME=VALUE; VALUE is parsed as JSON when possible
        #[arg(short, long = "field", value_name = "NAME=VALUE", value_parser = parse_field, required = true)]
        fields: Vec<(String, Value)>,
    },

    /// Totals over a date range
    Stats {
        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Personnel command arguments.
#[derive(Debug, Args)]
pub struct PersonnelCommand {
    /// Only staff with this role (e.g. Operador, Supervisor)
    #[arg(short, long)]
    pub role: Option<Role>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Processes command arguments.
#[derive(Debug, Args)]
pub struct ProcessesCommand {
    /// Only lots with this status (En_Proceso, Completado, Suspendido)
    #[arg(short, long)]
    pub status: Option<ProcessStatus>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Mass-balance command arguments.
#[derive(Debug, Args)]
pub struct MassBalancesCommand {
    /// Maximum number of readings
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Only readings recorded by this operator
    #[arg(short, long)]
    pub operator: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Batch command arguments.
#[derive(Debug, Args)]
pub struct BatchesCommand {
    /// Maximum number of batches
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Team roster arguments.
#[derive(Debug, Args)]
pub struct TeamCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Shift view arguments.
#[derive(Debug, Args)]
pub struct ViewCommand {
    /// Prefer this shift record id if it exists
    #[arg(long)]
    pub id: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Prefer this shift record id if it exists
    #[arg(long)]
    pub id: Option<String>,

    /// Refresh interval in seconds (defaults to the configured interval)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

/// Login command arguments.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Identity code of the team member
    pub code: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Parse a `NAME=VALUE` pair.
///
/// `VALUE` is read as JSON if it parses (`12`, `true`, `["rec1"]`), otherwise
/// kept as a plain string.
///
/// # Errors
///
/// Returns a message if there is no `=` or the name is blank.
pub fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("field name is empty in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

/// Collect parsed pairs into record fields. Later pairs win.
#[must_use]
pub fn into_fields(pairs: Vec<(String, Value)>) -> Fields {
    pairs.into_iter().collect()
}
