//! Response bodies specific to the HTTP adapter (§6.1). The DRS object
//! model itself lives in `crate::models` and is reused as-is; this module
//! only adds shapes that exist purely at the wire boundary.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus { status: "OK" }
    }
}

/// The `exception_id`-carrying error body served for every non-2xx
/// response (§6.1), distinguishing this surface's taxonomy from the
/// generic `utils::http::error::ApiError` message body.
#[derive(Debug, Serialize)]
pub struct DrsErrorBody {
    pub exception_id: &'static str,
    pub description: String,
}
