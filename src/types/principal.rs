//! Identity Types
//!
//! Principals, login credentials and stored user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Authenticated identity plus its role set
///
/// Roles live in an ordered set, so two principals compare equal regardless
/// of the order their roles were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, R>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a role is present
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Username/password pair presented at login
///
/// Lives only for the duration of one request. `Debug` never prints the password.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A user as held by the [`UserStore`](crate::store::UserStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub roles: BTreeSet<String>,
}

impl UserRecord {
    /// Principal carrying this user's name and stored roles
    pub fn principal(&self) -> Principal {
        Principal {
            username: self.username.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn bearer(access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_at,
        }
    }
}
