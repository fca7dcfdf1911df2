use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const BUILTIN_ADMIN: &str = "admin";

/// Staff roles, ordered so that `Admin > Staff > User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Lowercase hex SHA-256 of the plaintext password.
    pub password: String,
    pub role: Role,
    pub name: String,
}

/// username -> account, the shape of `users.json`.
pub type AccountBook = BTreeMap<String, Account>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access denied: {username} has role {actual}, {required} required")]
    PermissionDenied {
        username: String,
        actual: Role,
        required: Role,
    },
}

pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

pub fn builtin_accounts() -> AccountBook {
    let mut book = AccountBook::new();
    book.insert(
        BUILTIN_ADMIN.to_string(),
        Account {
            password: hash_password("admin123"),
            role: Role::Admin,
            name: "System Administrator".to_string(),
        },
    );
    book.insert(
        "staff".to_string(),
        Account {
            password: hash_password("staff123"),
            role: Role::Staff,
            name: "Municipal Staff".to_string(),
        },
    );
    book
}

pub fn authenticate(book: &AccountBook, username: &str, password: &str) -> Result<Session, AuthError> {
    let account = book.get(username).ok_or(AuthError::InvalidCredentials)?;
    if account.password != hash_password(password) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(Session {
        username: username.to_string(),
        role: account.role,
        name: account.name.clone(),
    })
}

/// Capability check run before every mutating entry point.
pub fn ensure_permission(session: &Session, required: Role) -> Result<(), AuthError> {
    if session.role >= required {
        return Ok(());
    }
    Err(AuthError::PermissionDenied {
        username: session.username.clone(),
        actual: session.role,
        required,
    })
}
