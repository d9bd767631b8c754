//! Integration tests for the tollgate-store crate.
//!
//! These tests exercise the full store lifecycle against a real SQLite
//! database on disk (via tempfile), including reopening the file and
//! several handles racing on the same file.

use std::path::Path;

use tollgate_store::{
    AccountStore, ErrorKind, PasswordStorage, StoreConfig, StoreError, UsernameCollation,
};

fn config_at(path: &Path) -> StoreConfig {
    StoreConfig::new()
        .with_path(path)
        .with_pbkdf2_iterations(1_000)
}

// ═══════════════════════════════════════════════════════════════════════
//  Lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn initialize_creates_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("app").join("users.db3");

    let store = AccountStore::initialize(&config_at(&db_path)).await.unwrap();

    assert!(db_path.exists());
    assert_eq!(store.path(), Some(db_path.as_path()));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn initialize_is_idempotent_and_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_at(&dir.path().join("users.db3"));

    let first = AccountStore::initialize(&config).await.unwrap();
    let id = first
        .register("alice", "alice@example.com", "pw123")
        .await
        .unwrap();
    drop(first);

    let second = AccountStore::initialize(&config).await.unwrap();
    let third = AccountStore::initialize(&config).await.unwrap();

    let account = second.authenticate("alice", "pw123").await.unwrap();
    assert_eq!(account.id, id);
    assert_eq!(third.count().await.unwrap(), 1);
}

#[tokio::test]
async fn initialize_reports_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file-not-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let err = AccountStore::initialize(&config_at(&blocker.join("users.db3")))
        .await
        .err()
        .expect("initialize should fail");
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable, "got: {err}");
}

#[tokio::test]
async fn initialize_on_a_non_database_file_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db3");
    std::fs::write(&path, vec![0x42_u8; 4096]).unwrap();

    let err = AccountStore::initialize(&config_at(&path))
        .await
        .err()
        .expect("initialize should fail");
    assert!(
        matches!(err, StoreError::StorageUnavailable { .. }),
        "got: {err}"
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Register / authenticate
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn alice_and_bob_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = AccountStore::initialize(&config_at(&dir.path().join("users.db3")))
        .await
        .unwrap();

    let id = store
        .register("alice", "alice@example.com", "pw123")
        .await
        .unwrap();
    assert_eq!(id, 1);

    let dup = store
        .register("alice", "other@example.com", "pw999")
        .await
        .unwrap_err();
    assert_eq!(dup.kind(), ErrorKind::DuplicateUsername);

    let account = store.authenticate("alice", "pw123").await.unwrap();
    assert_eq!(account.id, 1);
    assert_eq!(account.username, "alice");
    assert_eq!(account.email, "alice@example.com");

    let wrong = store.authenticate("alice", "wrong").await.unwrap_err();
    assert_eq!(wrong.kind(), ErrorKind::NotFound);

    let unknown = store.authenticate("bob", "pw123").await.unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::NotFound);

    // Both failures are indistinguishable to the caller.
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn rejected_input_never_reaches_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = AccountStore::initialize(&config_at(&dir.path().join("users.db3")))
        .await
        .unwrap();

    for (username, email, password) in [
        ("", "a@x.io", "pw"),
        ("bob", "", "pw"),
        ("bob", "a@x.io", ""),
        ("bob", "not-an-email", "pw"),
        ("bob", "a@b", "pw"),
        ("bob", "a@b.com ", "pw"),
    ] {
        let err = store.register(username, email, password).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{email:?}: {err}");
    }
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn plaintext_rows_still_authenticate_after_switching_to_pbkdf2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db3");

    let legacy = AccountStore::initialize(
        &config_at(&path).with_password_storage(PasswordStorage::Plaintext),
    )
    .await
    .unwrap();
    legacy.register("old", "old@x.io", "legacy-pw").await.unwrap();
    drop(legacy);

    let store = AccountStore::initialize(&config_at(&path)).await.unwrap();
    store.register("new", "new@x.io", "fresh-pw").await.unwrap();

    assert!(store.authenticate("old", "legacy-pw").await.is_ok());
    assert!(store.authenticate("new", "fresh-pw").await.is_ok());
    assert!(store.authenticate("old", "fresh-pw").await.is_err());
}

#[tokio::test]
async fn plaintext_row_keeps_its_format_after_switching_to_pbkdf2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db3");
    let hash_shaped = "pbkdf2-sha256$1$AAAA$AAAA";

    let legacy = AccountStore::initialize(
        &config_at(&path).with_password_storage(PasswordStorage::Plaintext),
    )
    .await
    .unwrap();
    legacy.register("zed", "z@x.io", hash_shaped).await.unwrap();
    drop(legacy);

    let store = AccountStore::initialize(&config_at(&path)).await.unwrap();
    assert!(store.authenticate("zed", hash_shaped).await.is_ok());
}

#[tokio::test]
async fn initialize_rejects_zero_iterations_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db3");

    let err = AccountStore::initialize(&config_at(&path).with_pbkdf2_iterations(0))
        .await
        .err()
        .expect("initialize should fail");
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable, "got: {err}");
    assert!(!path.exists());
}

#[tokio::test]
async fn switching_collation_back_to_binary_allows_case_variants() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db3");

    let nocase = AccountStore::initialize(
        &config_at(&path).with_username_collation(UsernameCollation::NoCase),
    )
    .await
    .unwrap();
    nocase.register("Carol", "c@x.io", "pw").await.unwrap();
    assert!(nocase.register("carol", "c2@x.io", "pw").await.is_err());
    drop(nocase);

    let binary = AccountStore::initialize(&config_at(&path)).await.unwrap();
    binary.register("carol", "c2@x.io", "pw").await.unwrap();
    assert_eq!(binary.count().await.unwrap(), 2);

    // Re-enabling nocase now collides with existing data.
    let err = AccountStore::initialize(
        &config_at(&path).with_username_collation(UsernameCollation::NoCase),
    )
    .await
    .err()
    .expect("collation switch should fail");
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable, "got: {err}");
}

// ═══════════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_handles_race_for_one_username() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_at(&dir.path().join("users.db3"));

    // Each handle owns its own connection to the same file.
    let mut stores = Vec::new();
    for _ in 0..4 {
        stores.push(AccountStore::initialize(&config).await.unwrap());
    }

    let mut handles = Vec::new();
    for (i, store) in stores.iter().cycle().take(12).enumerate() {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .register("contested", &format!("c{i}@x.io"), "pw")
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::DuplicateUsername, "got: {err}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(stores[0].count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_registrations_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let store = AccountStore::initialize(&config_at(&dir.path().join("users.db3")))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .register(&format!("user{i}"), &format!("u{i}@x.io"), "pw")
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);
    assert_eq!(store.count().await.unwrap(), 20);
}
