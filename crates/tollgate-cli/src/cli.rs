//! CLI argument definitions for Tollgate.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tollgate -- local account signup and login.
#[derive(Parser)]
#[command(
    name = "tollgate",
    version,
    about = "Tollgate -- local account signup and login",
    long_about = "Registers accounts and checks credentials against a local SQLite \
                  database, with an interactive login / signup / home flow."
)]
pub struct Cli {
    /// TOML configuration file (defaults to $TOLLGATE_CONFIG or ./tollgate.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured path.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log store activity at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new account.
    Signup {
        /// The username for the new account.
        username: String,
        /// Email address.
        #[arg(long, short)]
        email: String,
        /// Password. Prompted for without echo when omitted.
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Check a username and password.
    Login {
        /// The username to log in as.
        username: String,
        /// Password. Prompted for without echo when omitted.
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Walk through the login, signup, and home screens interactively.
    Run,

    /// Show where the database lives and how many accounts it holds.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}
