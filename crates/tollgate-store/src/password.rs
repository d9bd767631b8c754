//! Password encoding and verification.
//!
//! Hashed values are stored as
//! `pbkdf2-sha256$<iterations>$base64(salt)$base64(hash)` so the iteration
//! count travels with each row. Which format a row uses is recorded in its
//! own `password_format` column, never inferred from the stored text.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use tracing::warn;

use crate::config::PasswordStorage;
use crate::error::{StoreError, StoreResult};

/// Prefix marking a PBKDF2-HMAC-SHA256 hash.
pub(crate) const SCHEME: &str = "pbkdf2-sha256";

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Produce the value written to the `password` column.
///
/// CPU-bound when hashing; call it from the blocking pool.
pub fn encode(password: &str, storage: PasswordStorage, iterations: u32) -> StoreResult<String> {
    match storage {
        PasswordStorage::Plaintext => Ok(password.to_string()),
        PasswordStorage::Pbkdf2 => hash(password, iterations),
    }
}

/// Check `password` against a stored column value written in `format`.
pub fn verify(password: &str, stored: &str, format: PasswordStorage) -> bool {
    match format {
        PasswordStorage::Plaintext => password == stored,
        PasswordStorage::Pbkdf2 => match parse_hash(stored) {
            Some(parsed) => pbkdf2::verify(
                PBKDF2_ALG,
                parsed.iterations,
                &parsed.salt,
                password.as_bytes(),
                &parsed.hash,
            )
            .is_ok(),
            None => {
                warn!("stored pbkdf2 value is malformed, rejecting");
                false
            }
        },
    }
}

/// Spend the same work as a failed [`verify`] when there is no stored row.
///
/// Keeps an unknown username as slow as a wrong password.
pub fn verify_absent(password: &str, storage: PasswordStorage, iterations: u32) {
    if storage == PasswordStorage::Plaintext {
        return;
    }
    let Some(iterations) = NonZeroU32::new(iterations) else {
        return;
    };
    let _ = pbkdf2::verify(
        PBKDF2_ALG,
        iterations,
        &[0u8; SALT_LEN],
        password.as_bytes(),
        &[0u8; KEY_LEN],
    );
}

fn hash(password: &str, iterations: u32) -> StoreResult<String> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| StoreError::Config("pbkdf2_iterations must be greater than zero".into()))?;

    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| StoreError::Crypto("failed to generate random salt".into()))?;

    let mut hash = [0u8; KEY_LEN];
    pbkdf2::derive(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        BASE64.encode(salt),
        BASE64.encode(hash)
    ))
}

struct ParsedHash {
    iterations: NonZeroU32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

fn parse_hash(stored: &str) -> Option<ParsedHash> {
    let mut parts = stored.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations = parts.next()?.parse::<u32>().ok().and_then(NonZeroU32::new)?;
    let salt = BASE64.decode(parts.next()?).ok()?;
    let hash = BASE64.decode(parts.next()?).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ParsedHash {
        iterations,
        salt,
        hash,
    })
}

// ── password_format column ───────────────────────────────────────────

impl ToSql for PasswordStorage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PasswordStorage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pbkdf2" => Ok(Self::Pbkdf2),
            "plaintext" => Ok(Self::Plaintext),
            other => Err(FromSqlError::Other(
                format!("unknown password format: {other}").into(),
            )),
        }
    }
}
