//! Configuration loading: a TOML file named on the command line, with
//! `DC_<FIELD>` environment variables overriding individual fields
//! afterwards — a Rust-shaped echo of the original service's layered
//! settings object.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use utils::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "download_controller", about = "DRS download controller")]
pub struct Args {
    /// Path to the service's TOML configuration file.
    #[arg(long, short = 'c')]
    pub config: std::path::PathBuf,
}

/// Connection details for one configured S3-compatible outbox endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStorageConfig {
    pub bucket: String,
    pub bucket_region: String,
    pub endpoint: Option<String>,
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

fn default_force_path_style() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub service_group_id: String,
    #[serde(default = "default_files_to_register_topic")]
    pub files_to_register_topic: String,
    #[serde(default = "default_files_to_register_type")]
    pub files_to_register_type: String,
    #[serde(default = "default_files_to_delete_topic")]
    pub files_to_delete_topic: String,
    #[serde(default = "default_files_to_delete_type")]
    pub files_to_delete_type: String,
    #[serde(default = "default_file_registered_topic")]
    pub file_registered_topic: String,
    #[serde(default = "default_download_served_topic")]
    pub download_served_topic: String,
    #[serde(default = "default_unstaged_download_requested_topic")]
    pub unstaged_download_requested_topic: String,
    #[serde(default = "default_file_deleted_topic")]
    pub file_deleted_topic: String,
}

fn default_files_to_register_topic() -> String {
    "file_registrations".to_string()
}
fn default_files_to_register_type() -> String {
    "file_internally_registered".to_string()
}
fn default_files_to_delete_topic() -> String {
    "file_deletions".to_string()
}
fn default_files_to_delete_type() -> String {
    "file_deletion_requested".to_string()
}
fn default_file_registered_topic() -> String {
    "downloads".to_string()
}
fn default_download_served_topic() -> String {
    "downloads".to_string()
}
fn default_unstaged_download_requested_topic() -> String {
    "downloads".to_string()
}
fn default_file_deleted_topic() -> String {
    "file_deletions".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Ambient: identifies this service instance in logs and published
    /// events.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_instance_id")]
    pub service_instance_id: String,

    /// `^drs://.+/$`; validated in `Config::validate`.
    pub drs_server_uri: String,
    #[serde(default = "default_retry_access_after")]
    pub retry_access_after_seconds: u64,
    pub presigned_url_expires_after_seconds: u64,
    #[serde(default = "default_cache_timeout_days")]
    pub cache_timeout_days: i64,

    pub ekss_base_url: String,
    #[serde(default = "default_ekss_timeout_seconds")]
    pub ekss_timeout_seconds: u64,

    pub outbox_bucket: String,
    pub object_storages: HashMap<String, ObjectStorageConfig>,

    pub mongo_uri: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,

    pub kafka: KafkaConfig,

    #[serde(default = "default_http_listen_addr")]
    pub http_listen_addr: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_service_name() -> String {
    "download-controller".to_string()
}
fn default_service_instance_id() -> String {
    "1".to_string()
}
fn default_retry_access_after() -> u64 {
    120
}
fn default_cache_timeout_days() -> i64 {
    7
}
fn default_ekss_timeout_seconds() -> u64 {
    5
}
fn default_db_name() -> String {
    "download_controller".to_string()
}
fn default_http_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Overlays `DC_<FIELD>` environment variables over the parsed file,
    /// mirroring the original service's `BaseSettings` env-var layering.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DC_DRS_SERVER_URI") {
            self.drs_server_uri = v;
        }
        if let Ok(v) = std::env::var("DC_EKSS_BASE_URL") {
            self.ekss_base_url = v;
        }
        if let Ok(v) = std::env::var("DC_MONGO_URI") {
            self.mongo_uri = v;
        }
        if let Ok(v) = std::env::var("DC_HTTP_LISTEN_ADDR") {
            self.http_listen_addr = v;
        }
        if let Ok(v) = std::env::var("DC_RETRY_ACCESS_AFTER_SECONDS") {
            if let Ok(v) = v.parse() {
                self.retry_access_after_seconds = v;
            }
        }
        if let Ok(v) = std::env::var("DC_CACHE_TIMEOUT_DAYS") {
            if let Ok(v) = v.parse() {
                self.cache_timeout_days = v;
            }
        }
        if let Ok(v) = std::env::var("DC_KAFKA_BOOTSTRAP_SERVERS") {
            self.kafka.bootstrap_servers = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        static DRS_URI_RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new(r"^drs://.+/$").unwrap());
        if !DRS_URI_RE.is_match(&self.drs_server_uri) {
            anyhow::bail!(
                "drs_server_uri '{}' does not match ^drs://.+/$",
                self.drs_server_uri
            );
        }
        if self.presigned_url_expires_after_seconds == 0 {
            anyhow::bail!("presigned_url_expires_after_seconds must be positive");
        }
        Ok(())
    }

    pub fn retry_access_after(&self) -> Duration {
        Duration::from_secs(self.retry_access_after_seconds)
    }

    pub fn presigned_url_expires_after(&self) -> Duration {
        Duration::from_secs(self.presigned_url_expires_after_seconds)
    }

    pub fn cache_timeout(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_timeout_days)
    }

    pub fn ekss_timeout(&self) -> Duration {
        Duration::from_secs(self.ekss_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> String {
        r#"
            drs_server_uri = "drs://example.org/"
            presigned_url_expires_after_seconds = 30
            ekss_base_url = "http://ekss.local"
            outbox_bucket = "outbox"
            mongo_uri = "mongodb://localhost:27017"

            [object_storages.outbox]
            bucket = "outbox"
            bucket_region = "eu-central-1"

            [kafka]
            bootstrap_servers = "localhost:9092"
            service_group_id = "download-controller"
        "#
        .to_string()
    }

    #[test]
    fn rejects_non_drs_scheme_uri() {
        let mut config: Config = toml::from_str(&sample_toml()).unwrap();
        config.drs_server_uri = "http://example.org/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_drs_uri() {
        let config: Config = toml::from_str(&sample_toml()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_presigned_url_expiry() {
        let mut config: Config = toml::from_str(&sample_toml()).unwrap();
        config.presigned_url_expires_after_seconds = 0;
        assert!(config.validate().is_err());
    }
}
