//! Input validation for account registration.
//!
//! Runs before any database access so malformed input never reaches
//! SQLite.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Local part, `@`, domain containing a dot, no whitespace anywhere.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

/// A registration form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Email,
    Password,
}

impl Field {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Password => "password",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why registration input was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The field is empty or whitespace only.
    #[error("{0} must not be empty")]
    Empty(Field),

    /// The email does not have the `local@domain.tld` shape.
    #[error("email is not a valid address")]
    MalformedEmail,
}

/// Check the three registration fields.
///
/// Emptiness is judged after trimming. The email is matched as given, so
/// surrounding whitespace makes it malformed.
pub fn registration(username: &str, email: &str, password: &str) -> Result<(), ValidationError> {
    for (field, value) in [
        (Field::Username, username),
        (Field::Email, email),
        (Field::Password, password),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::Empty(field));
        }
    }

    if !is_valid_email(email) {
        return Err(ValidationError::MalformedEmail);
    }

    Ok(())
}

/// Whether `email` has the basic `local@domain.tld` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}
