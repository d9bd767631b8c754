//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version is tracked in a `_migrations` table so migrations
//! are idempotent and only run once.
//!
//! The case-insensitive username index is not a migration: it follows the
//! configured [`UsernameCollation`] and is reconciled on every open.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::UsernameCollation;
use crate::error::{StoreError, StoreResult};

/// Name of the unique index backing [`UsernameCollation::NoCase`].
pub(crate) const NOCASE_INDEX: &str = "idx_accounts_username_nocase";

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema — accounts",
        sql: r#"
            CREATE TABLE accounts (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                username   TEXT NOT NULL UNIQUE,
                email      TEXT NOT NULL,
                password   TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
        "#,
    },
    // Rows from v1 that carry this crate's hash prefix were hashed; the
    // rest are plaintext.
    Migration {
        version: 2,
        description: "accounts — explicit password format",
        sql: r#"
            ALTER TABLE accounts
                ADD COLUMN password_format TEXT NOT NULL DEFAULT 'plaintext';
            UPDATE accounts SET password_format = 'pbkdf2'
                WHERE substr(password, 1, 14) = 'pbkdf2-sha256$';
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// This is a **synchronous** function — call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    info!(
        new_version = MIGRATIONS.last().map(|m| m.version).unwrap_or(0),
        "all migrations applied"
    );
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

/// Create or drop the case-insensitive username index so the schema
/// matches `collation`.
///
/// Fails if switching to [`UsernameCollation::NoCase`] while two stored
/// usernames differ only by case.
pub fn reconcile_username_collation(
    conn: &Connection,
    collation: UsernameCollation,
) -> StoreResult<()> {
    let sql = match collation {
        UsernameCollation::NoCase => format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {NOCASE_INDEX} ON accounts(username COLLATE NOCASE);"
        ),
        UsernameCollation::Binary => format!("DROP INDEX IF EXISTS {NOCASE_INDEX};"),
    };

    conn.execute_batch(&sql).map_err(|e| StoreError::Migration {
        version: current_version(conn).unwrap_or(0),
        message: format!("failed to apply {collation} username collation: {e}"),
    })?;

    debug!(%collation, "username collation reconciled");
    Ok(())
}

// ── internals ────────────────────────────────────────────────────────

/// Create the `_migrations` bookkeeping table if it does not exist.
fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // `conn.transaction()` needs `&mut Connection`, so the transaction is
    // driven by hand.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> StoreResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.version, migration.description, now],
        )
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to record migration: {e}"),
        })?;

        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
            info!(
                version = migration.version,
                "migration applied successfully"
            );
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            if let Err(rollback) = conn.execute_batch("ROLLBACK;") {
                warn!(version = migration.version, error = %rollback, "rollback failed");
            }
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn index_exists(conn: &Connection) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
            rusqlite::params![NOCASE_INDEX],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[1].version > window[0].version,
                "migration versions must be strictly increasing: {} >= {}",
                window[0].version,
                window[1].version,
            );
        }
    }

    /// The expected latest migration version (update when adding migrations).
    const LATEST_VERSION: u32 = 2;

    #[test]
    fn run_all_on_fresh_db() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, LATEST_VERSION);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        conn.execute(
            "INSERT INTO accounts (username, email, password, created_at) VALUES ('keep', 'k@e.p', 'pw', 0)",
            [],
        )
        .unwrap();
        run_all(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, LATEST_VERSION);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1, "re-running migrations must not touch existing rows");
    }

    #[test]
    fn accounts_username_is_unique() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO accounts (username, email, password, created_at) VALUES ('alice', 'a@x.io', 'pw', 0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO accounts (username, email, password, created_at) VALUES ('alice', 'b@x.io', 'pw', 0)",
            [],
        );
        match dup {
            Err(rusqlite::Error::SqliteFailure(err, _)) => {
                assert_eq!(err.extended_code, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
            }
            other => panic!("expected unique violation, got: {other:?}"),
        }
    }

    #[test]
    fn v1_rows_get_a_password_format() {
        let conn = setup_conn();
        ensure_migrations_table(&conn).unwrap();
        apply(&conn, &MIGRATIONS[0]).unwrap();
        conn.execute_batch(
            "INSERT INTO accounts (username, email, password, created_at)
                 VALUES ('old', 'o@x.io', 'letmein', 0);
             INSERT INTO accounts (username, email, password, created_at)
                 VALUES ('hashed', 'h@x.io', 'pbkdf2-sha256$1000$c2FsdA==$aGFzaA==', 0);",
        )
        .unwrap();

        run_all(&conn).unwrap();

        let format_of = |name: &str| -> String {
            conn.query_row(
                "SELECT password_format FROM accounts WHERE username = ?1",
                rusqlite::params![name],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(format_of("old"), "plaintext");
        assert_eq!(format_of("hashed"), "pbkdf2");
    }

    #[test]
    fn failed_migration_leaves_no_trace() {
        let conn = setup_conn();
        ensure_migrations_table(&conn).unwrap();
        let broken = Migration {
            version: 99,
            description: "broken",
            sql: "CREATE TABLE half (x INTEGER); THIS IS NOT SQL;",
        };

        let err = apply(&conn, &broken).unwrap_err();
        assert!(matches!(err, StoreError::Migration { version: 99, .. }), "got: {err}");
        assert_eq!(current_version(&conn).unwrap(), 0);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'half'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn nocase_index_is_created_and_dropped() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        reconcile_username_collation(&conn, UsernameCollation::NoCase).unwrap();
        assert!(index_exists(&conn));
        // Idempotent.
        reconcile_username_collation(&conn, UsernameCollation::NoCase).unwrap();
        assert!(index_exists(&conn));

        reconcile_username_collation(&conn, UsernameCollation::Binary).unwrap();
        assert!(!index_exists(&conn));
    }

    #[test]
    fn nocase_index_rejects_case_variants() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        reconcile_username_collation(&conn, UsernameCollation::NoCase).unwrap();

        conn.execute(
            "INSERT INTO accounts (username, email, password, created_at) VALUES ('Alice', 'a@x.io', 'pw', 0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO accounts (username, email, password, created_at) VALUES ('alice', 'b@x.io', 'pw', 0)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn nocase_fails_when_existing_rows_collide() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO accounts (username, email, password, created_at) VALUES ('Bob', 'a@x.io', 'pw', 0);
             INSERT INTO accounts (username, email, password, created_at) VALUES ('bob', 'b@x.io', 'pw', 0);",
        )
        .unwrap();

        let err = reconcile_username_collation(&conn, UsernameCollation::NoCase).unwrap_err();
        assert!(matches!(err, StoreError::Migration { .. }), "got: {err}");
        assert!(!index_exists(&conn));
    }
}
