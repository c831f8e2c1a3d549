//! Vault credential lifecycle.
//!
//! One [`AuthConfig`] is selected at startup and never changes. The
//! [`CredentialStore`] owns the current [`Credential`] and asks the strategy
//! for a fresh one whenever the clock reaches its renewal instant.

pub mod secret;
/// Holder of the current credential
pub mod store;
/// Login strategies
pub mod strategy;

pub use secret::Secret;
pub use store::CredentialStore;
pub use strategy::{AuthConfig, DEFAULT_APPROLE_MOUNT, SERVICE_ACCOUNT_TOKEN_PATH, STATIC_TOKEN_LIFETIME_DAYS};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Authentication errors. All of them are fatal for the agent.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// A required setting is empty; Vault is never contacted
    #[error("Missing {field} for {method} authentication")]
    MissingField {
        /// Auth method being configured
        method: &'static str,
        /// Configuration key that is missing
        field: &'static str,
    },

    /// The service account token file could not be read
    #[error("Cannot read identity token from {path}: {reason}")]
    IdentityToken {
        /// Token file location
        path: String,
        /// Underlying IO error
        reason: String,
    },

    /// Vault rejected the login or could not be reached
    #[error("Login against auth/{mount} failed: {reason}")]
    LoginFailed {
        /// Auth mount the login was sent to
        mount: String,
        /// Vault's error
        reason: String,
    },

    /// Login succeeded without a token in the response
    #[error("Login against auth/{0} returned no client token")]
    EmptyToken(String),
}

/// A Vault token plus the instant by which it must be replaced.
///
/// `expires_at` is the renewal deadline chosen by the agent, not the server's
/// hard expiry: lease-based logins renew at half the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: Secret::new(token.into()),
            expires_at,
        }
    }

    /// The Vault token
    pub fn token(&self) -> &str {
        self.token.expose()
    }

    /// Instant at which the credential must be renewed
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Usable strictly before `expires_at`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
