pub mod publisher;
pub mod subscriber;

use serde::{Deserialize, Serialize};

use crate::models::DrsObjectBase;

/// Inbound: a file has landed in the permanent archive and should be
/// tracked by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInternallyRegistered {
    #[serde(flatten)]
    pub base: DrsObjectBase,
    pub s3_endpoint_alias: String,
}

/// Inbound: a file and everything derived from it should be purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDeletionRequested {
    pub file_id: String,
}

/// Outbound: a file has been registered and is now trackable by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRegistered {
    pub file_id: String,
    pub self_uri: String,
}

/// Outbound: an access served a presigned URL to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadServed {
    pub file_id: String,
}

/// Outbound: access was requested for a file that isn't staged yet; the
/// staging worker should pick this up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstagedDownloadRequested {
    pub file_id: String,
    pub target_bucket_id: String,
    pub s3_endpoint_alias: String,
}

/// Outbound: a file and its derived artifacts were fully removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDeleted {
    pub file_id: String,
}
