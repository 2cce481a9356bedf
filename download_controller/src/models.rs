//! The data model shared by the DAO, the orchestrator and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The immutable metadata of a registered file, as handed in by
/// `file_internally_registered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsObjectBase {
    pub file_id: String,
    pub decryption_secret_id: String,
    pub decrypted_sha256: String,
    pub decrypted_size: u64,
    pub creation_date: DateTime<Utc>,
}

/// `DrsObjectBase` plus the staging-side attributes assigned at
/// registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsObject {
    #[serde(flatten)]
    pub base: DrsObjectBase,
    pub object_id: String,
    pub s3_endpoint_alias: String,
}

/// The shape actually persisted in the `drs_objects` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTimeDrsObject {
    #[serde(flatten)]
    pub object: DrsObject,
    pub last_accessed: DateTime<Utc>,
}

impl AccessTimeDrsObject {
    pub fn file_id(&self) -> &str {
        &self.object.base.file_id
    }

    pub fn object_id(&self) -> &str {
        &self.object.object_id
    }
}

/// `DrsObject` plus the `drs://` URI derived from `file_id` and the
/// configured server URI. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsObjectWithUri {
    #[serde(flatten)]
    pub object: DrsObject,
    pub self_uri: String,
}

/// `DrsObjectWithUri` plus a short-lived presigned access URL.
#[derive(Debug, Clone)]
pub struct DrsObjectWithAccess {
    pub object: DrsObjectWithUri,
    pub access_url: String,
}

/// A single supported access method in the DRS response. This service only
/// ever advertises `https`, carrying a presigned outbox URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessMethod {
    #[serde(rename = "type")]
    pub method_type: &'static str,
    pub access_url: AccessUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(rename = "type")]
    pub checksum_type: &'static str,
    pub checksum: String,
}

/// The DRS-compliant, client-facing rendering of `DrsObjectWithAccess`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrsObjectResponseModel {
    pub id: String,
    pub self_uri: String,
    /// Encrypted size, queried from the outbox at access time (not the
    /// plaintext `decrypted_size`; clients need this to compute ranges
    /// against the ciphertext).
    pub size: u64,
    pub created_time: DateTime<Utc>,
    pub checksums: Vec<Checksum>,
    pub access_methods: Vec<AccessMethod>,
}

impl DrsObjectResponseModel {
    pub fn new(access: DrsObjectWithAccess, encrypted_size: u64) -> Self {
        let object = &access.object.object;
        DrsObjectResponseModel {
            id: object.base.file_id.clone(),
            self_uri: access.object.self_uri.clone(),
            size: encrypted_size,
            created_time: object.base.creation_date,
            checksums: vec![Checksum {
                checksum_type: "sha-256",
                checksum: object.base.decrypted_sha256.clone(),
            }],
            access_methods: vec![AccessMethod {
                method_type: "https",
                access_url: AccessUrl {
                    url: access.access_url,
                },
            }],
        }
    }
}

/// Payload of a signed work-order token (§4.6). Only `type == "download"`
/// is ever accepted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderToken {
    #[serde(rename = "type")]
    pub token_type: String,
    pub file_id: String,
    pub user_id: String,
    pub full_user_name: String,
    pub email: String,
    pub user_public_crypt4gh_key: String,
    /// Standard JWT expiry claim, required so `jsonwebtoken`'s `exp`
    /// validation can reject stale tokens.
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_model_carries_encrypted_size_not_decrypted_size() {
        let base = DrsObjectBase {
            file_id: "file-1".into(),
            decryption_secret_id: "secret-1".into(),
            decrypted_sha256: "abc123".into(),
            decrypted_size: 100,
            creation_date: Utc::now(),
        };
        let object = DrsObject {
            base,
            object_id: "obj-1".into(),
            s3_endpoint_alias: "default".into(),
        };
        let with_uri = DrsObjectWithUri {
            object,
            self_uri: "drs://example.org/file-1".into(),
        };
        let with_access = DrsObjectWithAccess {
            object: with_uri,
            access_url: "https://outbox.example.org/obj-1?sig=...".into(),
        };

        let response = DrsObjectResponseModel::new(with_access, 999);
        assert_eq!(response.size, 999);
        assert_eq!(response.id, "file-1");
        assert_eq!(response.checksums[0].checksum, "abc123");
    }
}
