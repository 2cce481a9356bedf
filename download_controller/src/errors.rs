//! The orchestrator's error taxonomy (§7). Adapter-specific error enums
//! live next to their adapters and are mapped into `RepositoryError`
//! variants at the orchestrator boundary; nothing adapter-specific leaks
//! past that point.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[allow(clippy::large_enum_variant)]
pub enum RepositoryError {
    #[error("no DRS object with this id exists")]
    DrsObjectNotFound,

    #[error("object is not yet staged, retry later")]
    RetryAccessLater { retry_after: Duration },

    #[error("communication with external API at {api_url} failed")]
    ApiCommunicationError { api_url: String },

    #[error("no envelope available for this object")]
    EnvelopeNotFound,

    #[error("duplicate entry for this file_id")]
    DuplicateEntry,

    #[error("s3 endpoint alias '{0}' is not configured")]
    StorageAliasNotConfigured(String),

    #[error("cleanup failed for object {object_id}: {cause}")]
    CleanupError { object_id: String, cause: String },

    #[error("work-order token is malformed")]
    TokenMalformed,

    #[error("work-order token signature is invalid")]
    TokenSignature,

    #[error("work-order token has expired")]
    TokenExpired,

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}
