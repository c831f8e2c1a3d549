use super::{AuthConfig, AuthError, Credential};
use crate::vault::SecretsApi;
use chrono::{DateTime, Utc};
use tracing::info;

/// Owns the agent's Vault credential.
///
/// There is no stored "expired" state: whether the credential is still usable
/// is always derived by comparing the clock against its renewal instant.
#[derive(Debug)]
pub struct CredentialStore {
    strategy: AuthConfig,
    current: Option<Credential>,
}

impl CredentialStore {
    /// Create an unauthenticated store for the given strategy
    pub fn new(strategy: AuthConfig) -> Self {
        Self {
            strategy,
            current: None,
        }
    }

    /// The strategy selected at startup
    pub fn strategy(&self) -> &AuthConfig {
        &self.strategy
    }

    /// The current credential, if one has been obtained
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// True when there is no credential or `now` has reached its renewal instant
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        match &self.current {
            Some(credential) => !credential.is_valid_at(now),
            None => true,
        }
    }

    /// Log in again and replace the credential wholesale.
    ///
    /// On failure the previous credential is discarded as well, since the
    /// caller is about to stop.
    pub async fn renew(
        &mut self,
        api: &dyn SecretsApi,
        now: DateTime<Utc>,
    ) -> Result<&Credential, AuthError> {
        let previous = self.current.take();
        let credential = self.login(api, now, previous.is_some()).await?;
        Ok(self.current.insert(credential))
    }

    /// Return a credential usable at `now`, renewing first if required
    pub async fn ensure_valid(
        &mut self,
        api: &dyn SecretsApi,
        now: DateTime<Utc>,
    ) -> Result<&Credential, AuthError> {
        let credential = match self.current.take() {
            Some(credential) if credential.is_valid_at(now) => credential,
            previous => self.login(api, now, previous.is_some()).await?,
        };
        Ok(self.current.insert(credential))
    }

    async fn login(
        &self,
        api: &dyn SecretsApi,
        now: DateTime<Utc>,
        renewed: bool,
    ) -> Result<Credential, AuthError> {
        let credential = self.strategy.authenticate(api, now).await?;

        info!(
            method = self.strategy.kind(),
            renewed = renewed,
            renew_at = %credential.expires_at(),
            "Vault credential obtained"
        );

        Ok(credential)
    }
}
