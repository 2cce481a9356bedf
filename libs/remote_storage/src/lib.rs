//! The outbox storage port: a narrow, S3-shaped view over whatever bucket
//! backs the time-limited download outbox.
//!
//! Production only ever talks to a real S3-compatible bucket, but the
//! trait boundary exists so the orchestrator can be exercised against an
//! in-memory fake in tests, the same way the teacher's `RemoteStorage`
//! trait separates callers from the concrete backend.

mod s3_bucket;

use std::num::NonZeroUsize;

use async_trait::async_trait;
use std::time::Duration;

pub use s3_bucket::S3Bucket;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("request to object storage timed out")]
    Timeout,
    #[error("request to object storage was cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Connection settings for the outbox S3 bucket, filled in from the
/// service configuration file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub bucket_region: String,
    pub endpoint: Option<String>,
    /// Force path-style addressing; required by most non-AWS S3-compatible
    /// object stores (MinIO, Ceph RGW, ...).
    #[serde(default = "default_true")]
    pub force_path_style: bool,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: NonZeroUsize,
    /// How long a presigned download URL served to a client stays valid.
    pub presigned_url_expiry: Duration,
}

fn default_true() -> bool {
    true
}

fn default_concurrency_limit() -> NonZeroUsize {
    NonZeroUsize::new(100).unwrap()
}

/// The five operations the download controller needs from the outbox
/// bucket. Deliberately narrower than a general-purpose object store
/// client: no upload, no byte-range reads, no cross-bucket copy.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn does_object_exist(&self, object_id: &str) -> Result<bool, ObjectStorageError>;

    async fn get_object_size(&self, object_id: &str) -> Result<u64, ObjectStorageError>;

    /// Issues a presigned GET URL valid for the configured expiry.
    async fn get_object_download_url(&self, object_id: &str) -> Result<String, ObjectStorageError>;

    async fn delete_object(&self, object_id: &str) -> Result<(), ObjectStorageError>;

    /// Lists every object currently in the outbox, for the cleanup loop to
    /// reconcile against the metadata database.
    async fn list_all_object_ids(&self) -> Result<Vec<String>, ObjectStorageError>;
}
