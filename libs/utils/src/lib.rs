//! Small, dependency-light helpers shared across the download controller's
//! binary and its adapter crates: JWS verification, HTTP router scaffolding,
//! retry/backoff, and logging setup.

pub mod auth;
pub mod backoff;
pub mod http;
pub mod logging;
