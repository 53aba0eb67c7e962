//! Auth Gateway
//!
//! Bridges the user store and the token codec: login, registration and
//! bearer-token authorization.

use super::jwt::{ROLE_DELIMITER, TokenCodec, extract_bearer};
use super::password::{hash_password, verify_password};
use crate::clock::{Clock, SystemClock};
use crate::store::UserStore;
use crate::types::{AuthError, AuthToken, Credentials, Principal, Result, UserRecord};
use std::collections::BTreeSet;

pub struct AuthGateway<S: UserStore, C: Clock = SystemClock> {
    store: S,
    codec: TokenCodec,
    clock: C,
}

impl<S: UserStore> AuthGateway<S> {
    /// Gateway reading wall-clock time
    pub fn with_system_clock(store: S, codec: TokenCodec) -> Self {
        Self::new(store, codec, SystemClock)
    }
}

impl<S: UserStore, C: Clock> AuthGateway<S, C> {
    pub fn new(store: S, codec: TokenCodec, clock: C) -> Self {
        Self {
            store,
            codec,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Check credentials and issue a token carrying the user's stored roles
    pub fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        let Some(user) = self.store.find_by_username(&credentials.username)? else {
            tracing::info!(username = %credentials.username, "login failed: unknown user");
            return Err(AuthError::UserNotFound);
        };

        if !verify_password(&credentials.password, &user.password_hash)? {
            tracing::info!(username = %user.username, "login failed: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        let issued = self.codec.expires_at(now).and_then(|expires_at| {
            let token = self.codec.issue(&user.principal(), now)?;
            Ok((token, expires_at))
        });
        let (token, expires_at) = issued.map_err(|e| {
            tracing::error!(username = %user.username, error = %e, "token issuance failed");
            AuthError::Internal(e.to_string())
        })?;

        tracing::info!(username = %user.username, roles = user.roles.len(), "login succeeded");
        Ok(AuthToken::bearer(token, expires_at))
    }

    /// Create a user with a freshly hashed password
    ///
    /// The store insert is the authority on uniqueness; the early existence
    /// check only skips hashing for names that are obviously taken.
    pub fn register<I, R>(&self, credentials: Credentials, roles: I) -> Result<UserRecord>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        if credentials.username.trim().is_empty() {
            return Err(AuthError::InvalidRequest("username must not be empty".into()));
        }
        if credentials.password.is_empty() {
            return Err(AuthError::InvalidRequest("password must not be empty".into()));
        }
        if self.store.exists_by_username(&credentials.username)? {
            tracing::info!(username = %credentials.username, "registration rejected: username taken");
            return Err(AuthError::UsernameTaken(credentials.username));
        }

        let roles: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        if let Some(bad) = roles
            .iter()
            .find(|r| r.is_empty() || r.contains(ROLE_DELIMITER))
        {
            return Err(AuthError::InvalidRequest(format!(
                "invalid role name {:?}",
                bad
            )));
        }

        let record = UserRecord {
            password_hash: hash_password(&credentials.password)?,
            username: credentials.username,
            roles,
        };
        if let Err(e) = self.store.insert_new(record.clone()) {
            if matches!(e, AuthError::UsernameTaken(_)) {
                tracing::info!(username = %record.username, "registration rejected: username taken");
            }
            return Err(e);
        }

        tracing::info!(username = %record.username, "user registered");
        Ok(record)
    }

    /// Validate a raw token at the current time
    pub fn authorize(&self, token: &str) -> Result<Principal> {
        self.codec.verify(token, self.clock.now()).map_err(|e| {
            tracing::debug!(error = %e, "authorization rejected");
            AuthError::Unauthorized(e)
        })
    }

    /// Validate the value of an `Authorization` header
    pub fn authorize_header(&self, auth_header: &str) -> Result<Principal> {
        let token = extract_bearer(auth_header).ok_or(AuthError::MissingToken)?;
        self.authorize(token)
    }
}
