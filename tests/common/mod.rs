// Shared test doubles for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use snapshot_agent::vault::{LeaderStatus, LoginAuth, LoginRequest, LoginResponse, SecretsApi, VaultError};
use snapshot_agent::writer::{ObjectEntry, ObjectStorage, WriterError};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory Vault that counts every call
pub struct FakeSecretsApi {
    lease_seconds: i64,
    leader: Mutex<Result<LeaderStatus, VaultError>>,
    snapshot: Mutex<Result<Bytes, VaultError>>,
    login_error: Mutex<Option<VaultError>>,
    login_requests: Mutex<Vec<(String, serde_json::Value)>>,
    logins: AtomicUsize,
    leader_queries: AtomicUsize,
    exports: AtomicUsize,
}

impl FakeSecretsApi {
    /// A leader that issues one hour leases and exports `raft-data`
    pub fn new() -> Self {
        Self::with_lease(3600)
    }

    pub fn with_lease(lease_seconds: i64) -> Self {
        Self {
            lease_seconds,
            leader: Mutex::new(Ok(leader_status(true))),
            snapshot: Mutex::new(Ok(Bytes::from_static(b"raft-data"))),
            login_error: Mutex::new(None),
            login_requests: Mutex::new(Vec::new()),
            logins: AtomicUsize::new(0),
            leader_queries: AtomicUsize::new(0),
            exports: AtomicUsize::new(0),
        }
    }

    pub fn set_leader(&self, is_self: bool) {
        *self.leader.lock().unwrap() = Ok(leader_status(is_self));
    }

    pub fn set_leader_status(&self, status: LeaderStatus) {
        *self.leader.lock().unwrap() = Ok(status);
    }

    pub fn fail_leader(&self, error: VaultError) {
        *self.leader.lock().unwrap() = Err(error);
    }

    pub fn set_snapshot(&self, data: &'static [u8]) {
        *self.snapshot.lock().unwrap() = Ok(Bytes::from_static(data));
    }

    pub fn fail_snapshot(&self, error: VaultError) {
        *self.snapshot.lock().unwrap() = Err(error);
    }

    pub fn fail_login(&self, error: VaultError) {
        *self.login_error.lock().unwrap() = Some(error);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn leader_queries(&self) -> usize {
        self.leader_queries.load(Ordering::SeqCst)
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    /// Mount and JSON body of every login, in order
    pub fn login_requests(&self) -> Vec<(String, serde_json::Value)> {
        self.login_requests.lock().unwrap().clone()
    }
}

pub fn leader_status(is_self: bool) -> LeaderStatus {
    LeaderStatus {
        ha_enabled: true,
        is_self,
        leader_address: "https://vault-0:8200".to_string(),
    }
}

#[async_trait]
impl SecretsApi for FakeSecretsApi {
    async fn login(&self, mount: &str, request: &LoginRequest) -> Result<LoginResponse, VaultError> {
        let count = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        self.login_requests
            .lock()
            .unwrap()
            .push((mount.to_string(), serde_json::to_value(request).unwrap()));

        if let Some(error) = self.login_error.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(LoginResponse {
            auth: Some(LoginAuth {
                client_token: format!("s.token-{}", count),
                lease_duration: self.lease_seconds,
                renewable: true,
            }),
        })
    }

    async fn leader_status(&self, _token: &str) -> Result<LeaderStatus, VaultError> {
        self.leader_queries.fetch_add(1, Ordering::SeqCst);
        self.leader.lock().unwrap().clone()
    }

    async fn raft_snapshot(&self, _token: &str) -> Result<Bytes, VaultError> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        self.snapshot.lock().unwrap().clone()
    }
}

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub encrypted: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Bucket held in memory. Upload times advance one second per put.
pub struct MemoryObjectStorage {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    listing: bool,
    fail_puts: AtomicBool,
    fail_lists: AtomicBool,
    hang_puts: AtomicBool,
    undeletable: Mutex<HashSet<String>>,
    puts: AtomicUsize,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            listing: true,
            fail_puts: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            hang_puts: AtomicBool::new(false),
            undeletable: Mutex::new(HashSet::new()),
            puts: AtomicUsize::new(0),
        }
    }

    /// Storage whose client cannot enumerate objects
    pub fn without_listing() -> Self {
        Self {
            listing: false,
            ..Self::new()
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn hang_puts(&self, hang: bool) {
        self.hang_puts.store(hang, Ordering::SeqCst);
    }

    /// Make deleting `key` fail
    pub fn fail_delete(&self, key: &str) {
        self.undeletable.lock().unwrap().insert(key.to_string());
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn insert(&self, key: &str, last_modified: Option<DateTime<Utc>>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: Bytes::from_static(b"old"),
                encrypted: false,
                last_modified,
            },
        );
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        server_side_encryption: bool,
    ) -> Result<(), WriterError> {
        let seq = self.puts.fetch_add(1, Ordering::SeqCst) as i64;

        if self.hang_puts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(WriterError::StorageError("connection reset by peer".to_string()));
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                encrypted: server_side_encryption,
                last_modified: Utc.timestamp_opt(1_700_000_000 + seq, 0).single(),
            },
        );
        Ok(())
    }

    fn supports_listing(&self) -> bool {
        self.listing
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, WriterError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(WriterError::StorageError("access denied".to_string()));
        }

        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                last_modified: object.last_modified,
            })
            .collect())
    }

    async fn delete_object(&self, key: &str) -> Result<(), WriterError> {
        if self.undeletable.lock().unwrap().contains(key) {
            return Err(WriterError::StorageError(format!("access denied deleting {}", key)));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}
