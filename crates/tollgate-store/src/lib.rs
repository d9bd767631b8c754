//! # tollgate-store
//!
//! Account store for Tollgate.
//!
//! Persists user accounts in a single SQLite file, enforces username
//! uniqueness at the storage layer, and checks credentials.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  AccountStore  (register / authenticate)│
//! │    validate  ─ before any storage access│
//! │    password  ─ PBKDF2 or plaintext      │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, spawn_blocking)│
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use tollgate_store::{AccountStore, StoreConfig};
//!
//! let store = AccountStore::initialize(&StoreConfig::default()).await?;
//! let id = store.register("alice", "alice@example.com", "pw123").await?;
//! let account = store.authenticate("alice", "pw123").await?;
//! assert_eq!(account.id, id);
//! ```

pub mod account;
pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod password;
pub mod validate;

// ── re-exports ───────────────────────────────────────────────────────

pub use account::{Account, AccountId, AccountStore};
pub use config::{PasswordStorage, StoreConfig, UsernameCollation};
pub use db::Database;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use validate::{Field, ValidationError};
