//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization and configuration resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tollgate_store::StoreConfig;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_ENV: &str = "TOLLGATE_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tollgate.toml";

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr so they never mix with command output.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Build the store configuration.
///
/// Precedence, lowest first: built-in defaults, the TOML file
/// (`--config`, then `$TOLLGATE_CONFIG`, then `./tollgate.toml` if
/// present), then `--db`.
pub fn load_config(config_file: Option<&Path>, db_override: Option<&Path>) -> Result<StoreConfig> {
    let file = config_file
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.exists().then_some(local)
        });

    let mut config = match file {
        Some(path) => {
            let config = StoreConfig::from_toml_file(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            info!(path = %path.display(), "configuration loaded");
            config
        }
        None => {
            debug!("no configuration file, using defaults");
            StoreConfig::default()
        }
    };

    if let Some(db) = db_override {
        config = config.with_path(db);
    }

    Ok(config)
}

// ---------------------------------------------------------------------------
// Password input
// ---------------------------------------------------------------------------

/// Use the password given on the command line, or prompt for one with
/// echo disabled.
pub fn password_or_prompt(given: Option<String>) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None => rpassword::prompt_password("Password: ").context("failed to read password"),
    }
}
