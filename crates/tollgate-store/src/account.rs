//! Account persistence: registration and credential checks.
//!
//! One [`AccountStore`] is opened at startup with
//! [`AccountStore::initialize`] and cloned into every caller; clones share
//! a single connection.
//!
//! Username uniqueness is enforced by SQLite itself (a `UNIQUE` column,
//! plus a `COLLATE NOCASE` unique index in case-insensitive mode), so two
//! racing registrations for the same name can never both succeed, even
//! across processes.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{PasswordStorage, StoreConfig, UsernameCollation};
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::password;
use crate::validate;

/// Surrogate key of an account. Assigned by the store, never reused.
pub type AccountId = i64;

/// A registered user. The stored password is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    /// Unix timestamp of registration.
    pub created_at: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  AccountStore
// ═══════════════════════════════════════════════════════════════════════

/// Durable, uniqueness-enforcing storage of [`Account`]s.
#[derive(Clone)]
pub struct AccountStore {
    db: Database,
    config: StoreConfig,
}

impl AccountStore {
    /// Open or create the database at `config.path` and bring its schema up
    /// to date. Safe to call repeatedly; existing accounts are kept.
    #[instrument(skip(config), fields(path = %config.path.display()))]
    pub async fn initialize(config: &StoreConfig) -> StoreResult<Self> {
        check_config(config)?;
        let db = Database::open_and_migrate(
            config.path.clone(),
            Duration::from_millis(u64::from(config.busy_timeout_ms)),
            config.username_collation,
        )
        .await?;
        debug!("account store ready");
        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    /// A store on a private in-memory database. `config.path` is ignored.
    pub async fn in_memory(config: &StoreConfig) -> StoreResult<Self> {
        check_config(config)?;
        let db = Database::open_in_memory()?;
        db.prepare_schema(config.username_collation).await?;
        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.db.path()
    }

    /// Register a new account and return its id.
    ///
    /// Input is validated before the database is touched. The insert is a
    /// single statement: it either adds the row or fails with
    /// [`StoreError::DuplicateUsername`] leaving the table unchanged.
    #[instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> StoreResult<AccountId> {
        validate::registration(username, email, password)?;

        let storage = self.config.password_storage;
        let iterations = self.config.pbkdf2_iterations;
        let password = password.to_string();
        let stored_password =
            tokio::task::spawn_blocking(move || password::encode(&password, storage, iterations))
                .await??;

        let username = username.to_string();
        let email = email.to_string();
        let now = Utc::now().timestamp();

        let id = self
            .db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO accounts (username, email, password, password_format, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![username, email, stored_password, storage, now],
                )
                .map_err(|e| classify_insert_error(e, &username))?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(account_id = id, "account registered");
        Ok(id)
    }

    /// Return the account whose username and password both match.
    ///
    /// An unknown username and a wrong password both yield
    /// [`StoreError::NotFound`], and take comparable time.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> StoreResult<Account> {
        let sql = match self.config.username_collation {
            UsernameCollation::Binary => {
                "SELECT id, username, email, created_at, password, password_format \
                 FROM accounts WHERE username = ?1 LIMIT 1"
            }
            UsernameCollation::NoCase => {
                "SELECT id, username, email, created_at, password, password_format \
                 FROM accounts WHERE username = ?1 COLLATE NOCASE LIMIT 1"
            }
        };
        let storage = self.config.password_storage;
        let iterations = self.config.pbkdf2_iterations;
        let username = username.to_string();
        let password = password.to_string();

        let matched = self
            .db
            .execute(move |conn| {
                let row = conn
                    .query_row(sql, rusqlite::params![username], |row| {
                        Ok((
                            Account {
                                id: row.get(0)?,
                                username: row.get(1)?,
                                email: row.get(2)?,
                                created_at: row.get(3)?,
                            },
                            row.get::<_, String>(4)?,
                            row.get::<_, PasswordStorage>(5)?,
                        ))
                    })
                    .optional()?;

                // Verified here, on the blocking pool, since PBKDF2 is slow.
                Ok(match row {
                    Some((account, stored, format)) => {
                        password::verify(&password, &stored, format).then_some(account)
                    }
                    None => {
                        password::verify_absent(&password, storage, iterations);
                        None
                    }
                })
            })
            .await?;

        match matched {
            Some(account) => {
                debug!(account_id = account.id, "credentials accepted");
                Ok(account)
            }
            None => {
                debug!("credentials rejected");
                Err(StoreError::NotFound)
            }
        }
    }

    /// Fetch an account by id, returning `None` if absent.
    #[instrument(skip(self))]
    pub async fn get(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.db
            .execute(move |conn| {
                let account = conn
                    .query_row(
                        "SELECT id, username, email, created_at FROM accounts WHERE id = ?1",
                        rusqlite::params![id],
                        |row| {
                            Ok(Account {
                                id: row.get(0)?,
                                username: row.get(1)?,
                                email: row.get(2)?,
                                created_at: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(account)
            })
            .await
    }

    /// Return the total number of accounts.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

/// Reject an unusable config before anything touches the disk.
fn check_config(config: &StoreConfig) -> StoreResult<()> {
    config
        .check()
        .map_err(|e| StoreError::StorageUnavailable {
            path: config.path.clone(),
            reason: e.to_string(),
        })
}

/// Map an insert failure to [`StoreError::DuplicateUsername`] when SQLite
/// reports a unique-constraint violation, otherwise keep the SQLite error.
fn classify_insert_error(err: rusqlite::Error, username: &str) -> StoreError {
    let unique_violation = matches!(
        &err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    );
    if unique_violation {
        StoreError::DuplicateUsername {
            username: username.to_string(),
        }
    } else {
        StoreError::Sqlite(err)
    }
}

// ── tests ────────────────────────────────────────────────────────────
