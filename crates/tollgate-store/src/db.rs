//! SQLite database setup with WAL mode and locking pragmas.
//!
//! The [`Database`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>` and exposes async methods that use
//! `tokio::task::spawn_blocking` to avoid blocking the async runtime.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::UsernameCollation;
use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Thread-safe handle to a SQLite database.
///
/// All read/write operations go through [`Database::execute`] which
/// dispatches onto the blocking thread pool via `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database at `path` and apply connection pragmas.
    ///
    /// Creates missing parent directories. Every failure here is reported
    /// as [`StoreError::StorageUnavailable`].
    ///
    /// This call blocks briefly (file I/O), so call it during startup before
    /// entering the main async loop, or wrap it in `spawn_blocking` yourself.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let unavailable = |reason: String| StoreError::StorageUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                unavailable(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| unavailable(e.to_string()))?;
        Self::apply_pragmas(&conn, busy_timeout).map_err(|e| unavailable(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, Duration::from_secs(5))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Open the database and run all pending migrations.
    ///
    /// Migration failures are reported as
    /// [`StoreError::StorageUnavailable`] since the file is unusable.
    pub async fn open_and_migrate(
        path: impl AsRef<Path> + Send + 'static,
        busy_timeout: Duration,
        collation: UsernameCollation,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let open_path = path.clone();
        let db = tokio::task::spawn_blocking(move || Self::open(&open_path, busy_timeout)).await??;
        db.prepare_schema(collation)
            .await
            .map_err(|e| match e {
                StoreError::StorageUnavailable { .. } => e,
                other => StoreError::StorageUnavailable {
                    path,
                    reason: other.to_string(),
                },
            })?;
        Ok(db)
    }

    /// Run all pending schema migrations and reconcile the username
    /// collation index.
    pub async fn prepare_schema(&self, collation: UsernameCollation) -> StoreResult<()> {
        self.execute(move |conn| {
            migration::run_all(conn)?;
            migration::reconcile_username_collation(conn, collation)
        })
        .await
    }

    /// The file backing this database, or `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Execute an arbitrary closure against the connection on the blocking pool.
    ///
    /// This is the primary way to interact with the database from async code.
    /// The closure receives a `&Connection` and must return a `StoreResult<T>`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let count = conn.query_row("SELECT count(*) FROM accounts", [], |row| row.get(0))?;
    ///     Ok(count)
    /// }).await?;
    /// ```
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    /// Apply locking and durability pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: concurrent readers, non-blocking writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe with WAL — we only lose the last transaction
        // on a power failure, not corruption.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Other connections to the same file wait instead of failing with
        // SQLITE_BUSY.
        conn.busy_timeout(busy_timeout)?;

        info!(
            busy_timeout_ms = busy_timeout.as_millis() as u64,
            "database pragmas applied (WAL)"
        );
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
