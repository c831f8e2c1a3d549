// S3 object storage
// Works against AWS and S3-compatible services (MinIO, LocalStack) via a custom endpoint

use super::object_store::{ObjectEntry, ObjectStorage, ObjectStoreTarget};
use super::WriterError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

/// S3 client bound to one bucket
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
}

impl S3ObjectStorage {
    /// Build a client for the target's bucket
    pub async fn connect(target: &ObjectStoreTarget) -> Result<Self, WriterError> {
        if target.bucket.is_empty() {
            return Err(WriterError::StorageError("S3 bucket name is empty".to_string()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if !target.region.is_empty() {
            loader = loader.region(Region::new(target.region.clone()));
        }

        // Support for LocalStack/MinIO with custom endpoint
        if let Some(ref endpoint) = target.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some(ref credentials) = target.credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.expose().clone(),
                None,
                None,
                "raft-snapshot-agent",
            ));
        }

        let sdk_config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if target.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: target.bucket.clone(),
        })
    }

    /// Bucket every request targets
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(value.secs(), value.subsec_nanos()).single()
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        server_side_encryption: bool,
    ) -> Result<(), WriterError> {
        let mut put_request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));

        if server_side_encryption {
            put_request = put_request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        put_request
            .send()
            .await
            .map_err(|e| WriterError::StorageError(format!("Failed to upload {}: {}", key, e.into_service_error())))?;

        debug!(bucket = %self.bucket, key = %key, "Object uploaded");
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, WriterError> {
        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| {
                    WriterError::StorageError(format!("Failed to list {}: {}", prefix, e.into_service_error()))
                })?;

            entries.extend(response.contents().iter().filter_map(|object| {
                object.key().map(|key| ObjectEntry {
                    key: key.to_string(),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            }));

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(entries)
    }

    async fn delete_object(&self, key: &str) -> Result<(), WriterError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| WriterError::StorageError(format!("Failed to delete {}: {}", key, e.into_service_error())))?;

        Ok(())
    }
}
