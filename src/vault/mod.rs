//! Vault API access.
//!
//! The agent talks to Vault through the [`SecretsApi`] trait so the cycle can
//! be exercised against a fake in tests. [`VaultClient`] is the HTTP
//! implementation.

pub mod client;
/// Leadership check
pub mod gate;
/// Snapshot export
pub mod source;

pub use client::VaultClient;
pub use gate::{LeadershipGate, LeadershipQueryError};
pub use source::{FetchError, SnapshotSource};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a single Vault API call
#[derive(Error, Debug, Clone)]
pub enum VaultError {
    /// Transport failure or timeout
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status
    #[error("Vault returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Vault's `errors` joined, or the raw body
        message: String,
    },

    /// Body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Body of a login request
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginRequest {
    /// `auth/<approle mount>/login`
    AppRole {
        /// AppRole role ID
        role_id: String,
        /// AppRole secret ID
        secret_id: String,
    },
    /// `auth/<kubernetes mount>/login`
    Kubernetes {
        /// Vault role bound to the service account
        role: String,
        /// Service account token
        jwt: String,
    },
}

/// Response of a login endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    /// Missing when the endpoint returned no auth block
    #[serde(default)]
    pub auth: Option<LoginAuth>,
}

/// The `auth` block of a login response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginAuth {
    /// Token to send as `X-Vault-Token`
    #[serde(default)]
    pub client_token: String,
    /// Lease in seconds
    #[serde(default)]
    pub lease_duration: i64,
    /// Whether the lease can be renewed
    #[serde(default)]
    pub renewable: bool,
}

/// Response of `sys/leader`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeaderStatus {
    /// False for a standalone server
    #[serde(default)]
    pub ha_enabled: bool,
    /// This node is the active node
    #[serde(default)]
    pub is_self: bool,
    /// API address of the active node
    #[serde(default)]
    pub leader_address: String,
}

/// The Vault endpoints the agent needs
#[async_trait]
pub trait SecretsApi: Send + Sync {
    /// POST `auth/<mount>/login`; unauthenticated
    async fn login(&self, mount: &str, request: &LoginRequest) -> Result<LoginResponse, VaultError>;

    /// GET `sys/leader`
    async fn leader_status(&self, token: &str) -> Result<LeaderStatus, VaultError>;

    /// GET `sys/storage/raft/snapshot`
    async fn raft_snapshot(&self, token: &str) -> Result<Bytes, VaultError>;
}
