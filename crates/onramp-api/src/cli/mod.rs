//! CLI argument definitions.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

pub mod employee;
pub mod status;

#[derive(Parser)]
#[command(
    name = "onramp",
    about = "Employee onboarding workflow service",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Export spans via OpenTelemetry (stdout exporter)
        #[arg(long)]
        otel: bool,
    },

    /// List resources
    List {
        #[command(subcommand)]
        resource: ListResource,
    },

    /// Show one employee's onboarding state
    Show {
        /// Employee id
        id: String,
    },

    /// Summary of onboarding progress across all employees
    Status,

    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
pub enum ListResource {
    /// All employees with their onboarding progress
    Employees,
}
