//! HTTP client for the Vault API.

use super::{LeaderStatus, LoginRequest, LoginResponse, SecretsApi, VaultError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Vault address, matching the Vault CLI
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Bound on a snapshot export unless configured otherwise
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault API client.
#[derive(Debug, Clone)]
pub struct VaultClient {
    client: Client,
    base_url: String,
    snapshot_timeout: Duration,
}

impl VaultClient {
    /// Create a client for `address`. Every request except the snapshot
    /// export is bounded by `timeout`.
    pub fn new(
        address: impl Into<String>,
        tls_skip_verify: bool,
        timeout: Duration,
    ) -> Result<Self, VaultError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(tls_skip_verify)
            .build()
            .map_err(|e| VaultError::Http(e.to_string()))?;

        let mut base_url: String = address.into();
        if base_url.is_empty() {
            base_url = DEFAULT_ADDRESS.to_string();
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            snapshot_timeout: DEFAULT_SNAPSHOT_TIMEOUT,
        })
    }

    /// Bound on the whole snapshot export, body included
    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Turn a non-success response into a `VaultError::Status`, keeping
    /// Vault's own error messages.
    async fn check(response: Response) -> Result<Response, VaultError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) if !body.errors.is_empty() => body.errors.join("; "),
            _ if text.is_empty() => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
            _ => text,
        };

        Err(VaultError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SecretsApi for VaultClient {
    #[instrument(skip(self, request))]
    async fn login(&self, mount: &str, request: &LoginRequest) -> Result<LoginResponse, VaultError> {
        let url = self.url(&format!("auth/{}/login", mount.trim_matches('/')));
        debug!(url = %url, "Logging in");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| VaultError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<LoginResponse>()
            .await
            .map_err(|e| VaultError::Decode(format!("login response: {}", e)))
    }

    #[instrument(skip(self, token))]
    async fn leader_status(&self, token: &str) -> Result<LeaderStatus, VaultError> {
        let response = self
            .client
            .get(self.url("sys/leader"))
            .header(TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| VaultError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<LeaderStatus>()
            .await
            .map_err(|e| VaultError::Decode(format!("leader response: {}", e)))
    }

    #[instrument(skip(self, token))]
    async fn raft_snapshot(&self, token: &str) -> Result<Bytes, VaultError> {
        let response = self
            .client
            .get(self.url("sys/storage/raft/snapshot"))
            .header(TOKEN_HEADER, token)
            .timeout(self.snapshot_timeout)
            .send()
            .await
            .map_err(|e| VaultError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| VaultError::Http(format!("reading snapshot body: {}", e)))
    }
}
