//! Agent configuration.
//!
//! The configuration is a single JSON document read once at startup:
//!
//! ```json
//! {
//!   "addr": "https://vault.internal:8200",
//!   "retain": 72,
//!   "frequency": "1h",
//!   "vault_auth_method": "AppRole",
//!   "role_id": "…",
//!   "secret_id": "…",
//!   "local_storage": { "path": "/var/backups/vault" },
//!   "aws_storage": { "s3_bucket": "vault-snapshots", "s3_region": "eu-west-1" }
//! }
//! ```
//!
//! Everything except the auth fields has a default. [`Configuration::validate`]
//! rejects documents that cannot produce a working agent.

use crate::auth::{AuthConfig, Secret, SERVICE_ACCOUNT_TOKEN_PATH};
use crate::writer::{ObjectStoreTarget, StaticCredentials, WriterTarget};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be opened
    #[error("Cannot read configuration file {path}: {reason}")]
    Read {
        /// Configuration file path
        path: String,
        /// Underlying IO error
        reason: String,
    },

    /// The file is not valid JSON for this model
    #[error("Cannot parse configuration file: {0}")]
    Parse(String),

    /// A duration string did not parse or is zero
    #[error("Invalid duration for {field}: {reason}")]
    Duration {
        /// Configuration key
        field: &'static str,
        /// Parser message
        reason: String,
    },

    /// The document cannot produce a working agent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the agent authenticates to Vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum AuthMethod {
    /// Static token from `token`
    #[serde(rename = "token")]
    Token,
    /// Kubernetes service account login
    #[serde(rename = "k8s")]
    Kubernetes,
    /// AppRole login with `role_id` and `secret_id`
    #[default]
    #[serde(rename = "AppRole", alias = "approle")]
    AppRole,
}

/// `local_storage` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalConfig {
    /// Snapshot directory; empty disables the destination
    #[serde(default)]
    pub path: String,
}

/// `aws_storage` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Config {
    /// Static access key; empty uses the default credential chain
    #[serde(default)]
    pub access_key_id: String,
    /// Secret for `access_key_id`
    #[serde(default)]
    pub secret_access_key: Secret<String>,
    /// Custom endpoint for S3-compatible stores
    #[serde(default, rename = "s3_endpoint")]
    pub endpoint: String,
    /// Bucket region
    #[serde(default, rename = "s3_region")]
    pub region: String,
    /// Bucket name; empty disables the destination
    #[serde(default, rename = "s3_bucket")]
    pub bucket: String,
    /// Prepended to every object key
    #[serde(default, rename = "s3_key_prefix")]
    pub key_prefix: String,
    /// Request AES256 server-side encryption
    #[serde(default, rename = "s3_server_side_encryption")]
    pub server_side_encryption: bool,
    /// Fixed object name that is overwritten every cycle
    #[serde(default, rename = "s3_static_snapshot_name")]
    pub static_snapshot_name: String,
    /// Path-style addressing
    #[serde(default, rename = "s3_force_path_style")]
    pub force_path_style: bool,
}

/// The whole configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Vault API address
    #[serde(rename = "addr", alias = "address", default = "default_address")]
    pub address: String,
    /// Snapshots to keep per destination; zero or less keeps everything
    #[serde(default)]
    pub retain: i64,
    /// Time between cycles, e.g. `1h`
    #[serde(default = "default_frequency")]
    pub frequency: String,
    /// Object storage destination
    #[serde(rename = "aws_storage", default)]
    pub aws: S3Config,
    /// Local directory destination
    #[serde(rename = "local_storage", default)]
    pub local: LocalConfig,
    /// AppRole role ID
    #[serde(default)]
    pub role_id: String,
    /// AppRole secret ID
    #[serde(default)]
    pub secret_id: Secret<String>,
    /// AppRole mount override
    #[serde(default)]
    pub approle: String,
    /// Static token for `token` auth
    #[serde(default)]
    pub token: Secret<String>,
    /// Vault role for Kubernetes auth
    #[serde(default)]
    pub k8s_auth_role: String,
    /// Kubernetes auth mount
    #[serde(default)]
    pub k8s_auth_path: String,
    /// Which credentials to log in with
    #[serde(default)]
    pub vault_auth_method: AuthMethod,
    /// Accept any server certificate
    #[serde(default = "default_tls_skip_verify")]
    pub tls_skip_verify: bool,
    /// Bound on every other Vault request
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    /// Bound on a snapshot export including the body download
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout: String,
    /// Bound on one destination write
    #[serde(default = "default_writer_timeout")]
    pub writer_timeout: String,
}

fn default_address() -> String {
    crate::vault::client::DEFAULT_ADDRESS.to_string()
}

fn default_frequency() -> String {
    "1h".to_string()
}

fn default_tls_skip_verify() -> bool {
    true
}

fn default_request_timeout() -> String {
    "60s".to_string()
}

fn default_snapshot_timeout() -> String {
    "30m".to_string()
}

fn default_writer_timeout() -> String {
    "5m".to_string()
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Duration {
        field,
        reason: format!("'{}': {}", value, e),
    })
}

impl Configuration {
    /// Read, parse and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration document
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Configuration =
            serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive an agent
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frequency = self.frequency()?;
        if frequency.is_zero() {
            return Err(ConfigError::Invalid("frequency must be greater than zero".to_string()));
        }
        self.request_timeout()?;
        self.snapshot_timeout()?;
        self.writer_timeout()?;

        if self.local.path.is_empty() && self.aws.bucket.is_empty() {
            return Err(ConfigError::Invalid(
                "no snapshot destination configured (local_storage.path or aws_storage.s3_bucket)"
                    .to_string(),
            ));
        }

        if !cfg!(feature = "s3") && !self.aws.bucket.is_empty() {
            return Err(ConfigError::Invalid(
                "aws_storage is configured but the agent was built without S3 support".to_string(),
            ));
        }

        Ok(())
    }

    /// Interval between cycles
    pub fn frequency(&self) -> Result<Duration, ConfigError> {
        parse_duration("frequency", &self.frequency)
    }

    /// Bound on each Vault HTTP request
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("request_timeout", &self.request_timeout)
    }

    /// Bound on each snapshot export
    pub fn snapshot_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("snapshot_timeout", &self.snapshot_timeout)
    }

    /// Bound on each writer per cycle
    pub fn writer_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("writer_timeout", &self.writer_timeout)
    }

    /// The authentication strategy selected by `vault_auth_method`
    pub fn auth_config(&self) -> AuthConfig {
        match self.vault_auth_method {
            AuthMethod::Token => AuthConfig::StaticToken {
                token: self.token.clone(),
            },
            AuthMethod::AppRole => AuthConfig::AppRole {
                role_id: self.role_id.clone(),
                secret_id: self.secret_id.clone(),
                mount_path: self.approle.clone(),
            },
            AuthMethod::Kubernetes => AuthConfig::ServiceIdentity {
                role: self.k8s_auth_role.clone(),
                mount_path: self.k8s_auth_path.clone(),
                identity_source: PathBuf::from(SERVICE_ACCOUNT_TOKEN_PATH),
            },
        }
    }

    /// Destinations in dispatch order: local directory first, then object storage
    pub fn writer_targets(&self) -> Vec<WriterTarget> {
        let mut targets = Vec::new();

        if !self.local.path.is_empty() {
            targets.push(WriterTarget::LocalDirectory {
                path: PathBuf::from(&self.local.path),
                retain: self.retain,
            });
        }

        if !self.aws.bucket.is_empty() {
            let credentials = if !self.aws.access_key_id.is_empty() && !self.aws.secret_access_key.is_empty() {
                Some(StaticCredentials {
                    access_key_id: self.aws.access_key_id.clone(),
                    secret_access_key: self.aws.secret_access_key.clone(),
                })
            } else {
                None
            };

            targets.push(WriterTarget::ObjectStore(ObjectStoreTarget {
                bucket: self.aws.bucket.clone(),
                key_prefix: self.aws.key_prefix.clone(),
                endpoint: Some(self.aws.endpoint.clone()).filter(|e| !e.is_empty()),
                region: self.aws.region.clone(),
                credentials,
                use_server_side_encryption: self.aws.server_side_encryption,
                static_name: Some(self.aws.static_snapshot_name.clone()).filter(|n| !n.is_empty()),
                force_path_style: self.aws.force_path_style,
                retain: self.retain,
            }));
        }

        targets
    }
}
