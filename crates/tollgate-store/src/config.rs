//! Store configuration.
//!
//! [`StoreConfig`] decides where the database lives and how usernames and
//! passwords are compared. Defaults come from the [`Default`] impl; a
//! builder-style API and a TOML loader cover the rest.
//!
//! ## Default path resolution
//!
//! 1. `TOLLGATE_DATA_DIR` environment variable
//! 2. the platform data directory from [`dirs::data_dir`] plus `tollgate`
//!    (`$XDG_DATA_HOME`, `~/Library/Application Support`, `%APPDATA%`)
//! 3. `./data`
//!
//! The database file is `users.db3` inside that directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// File name of the account database inside the data directory.
pub const DB_FILE_NAME: &str = "users.db3";

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "TOLLGATE_DATA_DIR";

/// How usernames are compared for uniqueness and login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsernameCollation {
    /// Exact byte match: `Alice` and `alice` are different accounts.
    #[default]
    Binary,
    /// ASCII case-insensitive: `Alice` and `alice` collide.
    NoCase,
}

impl UsernameCollation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::NoCase => "nocase",
        }
    }
}

impl std::fmt::Display for UsernameCollation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How new passwords are written to the `password` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStorage {
    /// PBKDF2-HMAC-SHA256 with a random salt.
    #[default]
    Pbkdf2,
    /// The password verbatim. Only for databases shared with older clients
    /// that compare plaintext.
    Plaintext,
}

impl PasswordStorage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pbkdf2 => "pbkdf2",
            Self::Plaintext => "plaintext",
        }
    }
}

/// Account store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file.
    pub path: PathBuf,

    /// Username comparison policy.
    ///
    /// Default: **binary**.
    pub username_collation: UsernameCollation,

    /// Password storage format for new accounts.
    ///
    /// Default: **pbkdf2**.
    pub password_storage: PasswordStorage,

    /// PBKDF2 iteration count for new hashes.
    ///
    /// Default: **600 000**.
    pub pbkdf2_iterations: u32,

    /// How long a connection waits on a locked database, in milliseconds.
    ///
    /// Default: **5 000**.
    pub busy_timeout_ms: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join(DB_FILE_NAME),
            username_collation: UsernameCollation::default(),
            password_storage: PasswordStorage::default(),
            pbkdf2_iterations: 600_000,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML file. Missing keys fall back to their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Parse TOML text. Missing keys fall back to their defaults.
    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| StoreError::Config(format!("invalid toml: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Set the database file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the username comparison policy.
    pub fn with_username_collation(mut self, collation: UsernameCollation) -> Self {
        self.username_collation = collation;
        self
    }

    /// Set the password storage format.
    pub fn with_password_storage(mut self, storage: PasswordStorage) -> Self {
        self.password_storage = storage;
        self
    }

    /// Set the PBKDF2 iteration count.
    pub fn with_pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.pbkdf2_iterations = iterations;
        self
    }

    /// Set the busy timeout (in milliseconds).
    pub fn with_busy_timeout_ms(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Reject settings no store can run with.
    pub(crate) fn check(&self) -> StoreResult<()> {
        if self.pbkdf2_iterations == 0 {
            return Err(StoreError::Config(
                "pbkdf2_iterations must be greater than zero".into(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::Config("path must not be empty".into()));
        }
        Ok(())
    }
}

/// Resolve the per-installation data directory.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var(DATA_DIR_ENV).ok().filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|base| base.join("tollgate"))
        .unwrap_or_else(|| PathBuf::from("data"))
}
