// Login strategies - static token, AppRole and Kubernetes service accounts

use super::{AuthError, Credential, Secret};
use crate::vault::{LoginRequest, SecretsApi};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Mount used for AppRole when the configuration leaves it empty
pub const DEFAULT_APPROLE_MOUNT: &str = "approle";

/// Where Kubernetes projects the pod's service account token
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Renewal horizon for static tokens, in days. They are managed outside the
/// agent, so this only needs to outlive any realistic run.
pub const STATIC_TOKEN_LIFETIME_DAYS: i64 = 365;

/// The authentication method selected for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// Pre-issued token
    StaticToken {
        /// The token itself
        token: Secret<String>,
    },

    /// AppRole login
    AppRole {
        /// Role ID
        role_id: String,
        /// Secret ID
        secret_id: Secret<String>,
        /// Auth mount; empty means [`DEFAULT_APPROLE_MOUNT`]
        mount_path: String,
    },

    /// Kubernetes service account login
    ServiceIdentity {
        /// Vault role bound to the service account
        role: String,
        /// Auth mount, required
        mount_path: String,
        /// File holding the identity JWT
        identity_source: PathBuf,
    },
}

impl AuthConfig {
    /// Short method name used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::StaticToken { .. } => "token",
            AuthConfig::AppRole { .. } => "approle",
            AuthConfig::ServiceIdentity { .. } => "kubernetes",
        }
    }

    /// Run one login flow and return a credential valid from `now`.
    #[instrument(skip(self, api), fields(method = self.kind()))]
    pub async fn authenticate(
        &self,
        api: &dyn SecretsApi,
        now: DateTime<Utc>,
    ) -> Result<Credential, AuthError> {
        match self {
            AuthConfig::StaticToken { token } => {
                if token.is_empty() {
                    return Err(AuthError::MissingField {
                        method: self.kind(),
                        field: "token",
                    });
                }
                Ok(Credential::new(token.expose().clone(), now + Duration::days(STATIC_TOKEN_LIFETIME_DAYS)))
            }

            AuthConfig::AppRole {
                role_id,
                secret_id,
                mount_path,
            } => {
                if role_id.is_empty() {
                    return Err(AuthError::MissingField {
                        method: self.kind(),
                        field: "role_id",
                    });
                }
                if secret_id.is_empty() {
                    return Err(AuthError::MissingField {
                        method: self.kind(),
                        field: "secret_id",
                    });
                }

                let mount = if mount_path.is_empty() {
                    DEFAULT_APPROLE_MOUNT
                } else {
                    mount_path.as_str()
                };

                let request = LoginRequest::AppRole {
                    role_id: role_id.clone(),
                    secret_id: secret_id.expose().clone(),
                };
                lease_login(api, mount, &request, now).await
            }

            AuthConfig::ServiceIdentity {
                role,
                mount_path,
                identity_source,
            } => {
                if role.is_empty() {
                    return Err(AuthError::MissingField {
                        method: self.kind(),
                        field: "k8s_auth_role",
                    });
                }
                if mount_path.is_empty() {
                    return Err(AuthError::MissingField {
                        method: self.kind(),
                        field: "k8s_auth_path",
                    });
                }

                let jwt = tokio::fs::read_to_string(identity_source)
                    .await
                    .map_err(|e| AuthError::IdentityToken {
                        path: identity_source.display().to_string(),
                        reason: e.to_string(),
                    })?;

                let request = LoginRequest::Kubernetes {
                    role: role.clone(),
                    jwt: jwt.trim().to_string(),
                };
                lease_login(api, mount_path.trim_matches('/'), &request, now).await
            }
        }
    }
}

/// Log in and derive the renewal instant from the lease: half of it, so the
/// token is replaced well before the server revokes it.
async fn lease_login(
    api: &dyn SecretsApi,
    mount: &str,
    request: &LoginRequest,
    now: DateTime<Utc>,
) -> Result<Credential, AuthError> {
    let response = api
        .login(mount, request)
        .await
        .map_err(|e| AuthError::LoginFailed {
            mount: mount.to_string(),
            reason: e.to_string(),
        })?;

    let auth = response.auth.ok_or_else(|| AuthError::LoginFailed {
        mount: mount.to_string(),
        reason: "response carried no auth block".to_string(),
    })?;

    if auth.client_token.is_empty() {
        return Err(AuthError::EmptyToken(mount.to_string()));
    }

    let lease_seconds = auth.lease_duration.max(0);
    let expires_at = now + half_lease(lease_seconds);

    info!(
        mount = %mount,
        lease_seconds = lease_seconds,
        renew_at = %expires_at,
        "Vault login succeeded"
    );
    debug!(renewable = auth.renewable, "Lease details");

    Ok(Credential::new(auth.client_token, expires_at))
}

fn half_lease(lease_seconds: i64) -> Duration {
    Duration::milliseconds(lease_seconds.saturating_mul(500))
}
