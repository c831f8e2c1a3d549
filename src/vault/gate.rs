// Leadership gate - only the raft leader takes snapshots

use super::{SecretsApi, VaultError};
use crate::auth::Credential;
use thiserror::Error;
use tracing::{debug, instrument};

/// Leader status could not be determined
#[derive(Error, Debug, Clone)]
#[error("Unable to determine leader status: {0}")]
pub struct LeadershipQueryError(#[from] pub VaultError);

/// Decides whether this node should take a snapshot.
///
/// Every call queries Vault; leadership can move between cycles, so nothing is
/// cached and nothing is retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadershipGate;

impl LeadershipGate {
    /// Create a gate
    pub fn new() -> Self {
        Self
    }

    /// True when this node is the active leader.
    ///
    /// A node with HA disabled has no peers and is its own leader.
    #[instrument(skip(self, api, credential))]
    pub async fn is_leader(
        &self,
        api: &dyn SecretsApi,
        credential: &Credential,
    ) -> Result<bool, LeadershipQueryError> {
        let status = api.leader_status(credential.token()).await?;

        debug!(
            ha_enabled = status.ha_enabled,
            is_self = status.is_self,
            leader_address = %status.leader_address,
            "Leader status"
        );

        Ok(!status.ha_enabled || status.is_self)
    }
}
