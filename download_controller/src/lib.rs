//! The Download Controller: a per-file access-control and staging service
//! between a permanent cold archive and a time-limited S3 outbox (see
//! `SPEC_FULL.md` for the full component design).

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod dao;
pub mod ekss_client;
pub mod errors;
pub mod events;
pub mod http;
pub mod metrics;
pub mod models;
pub mod repository;

use std::collections::HashMap;
use std::sync::Arc;

use remote_storage::{ObjectStorage, S3Bucket, S3Config};
use utils::auth::JwtAuth;

use config::Config;
use dao::MongoDrsObjectDao;
use ekss_client::EkssClient;
use events::publisher::KafkaEventPublisher;
use metrics::Metrics;
use repository::{CoreDependencies, DataRepository, OutboxEndpoint};

/// Everything a request handler needs: the orchestrator plus the ambient
/// concerns (metrics, token verification) that sit alongside it but
/// aren't part of the core's own contract.
pub struct ServiceState {
    pub repository: DataRepository,
    pub jwt_auth: JwtAuth,
    pub metrics: Arc<Metrics>,
}

/// Builds every long-lived handle named in the configuration and wires
/// them into a `ServiceState`, the way `CoreDependencies` is built once at
/// process start (§5, §10).
pub async fn build_service_state(
    config: Config,
    jwt_auth: JwtAuth,
    metrics: Arc<Metrics>,
) -> anyhow::Result<Arc<ServiceState>> {
    let dao = Arc::new(MongoDrsObjectDao::connect(&config.mongo_uri, &config.db_name).await?);

    let mut outbox_endpoints = HashMap::new();
    for (alias, storage_config) in &config.object_storages {
        let s3_config = S3Config {
            bucket_name: storage_config.bucket.clone(),
            bucket_region: storage_config.bucket_region.clone(),
            endpoint: storage_config.endpoint.clone(),
            force_path_style: storage_config.force_path_style,
            concurrency_limit: std::num::NonZeroUsize::new(100).unwrap(),
            presigned_url_expiry: config.presigned_url_expires_after(),
        };
        let storage: Arc<dyn ObjectStorage> = Arc::new(S3Bucket::new(&s3_config)?);
        outbox_endpoints.insert(alias.clone(), OutboxEndpoint { storage });
    }

    let ekss_client = Arc::new(EkssClient::new(
        config.ekss_base_url.parse()?,
        config.ekss_timeout(),
    )?);

    let publisher = Arc::new(KafkaEventPublisher::new(&config.kafka)?);

    let deps = Arc::new(CoreDependencies {
        dao,
        outbox_endpoints,
        ekss_client,
        publisher,
        config,
    });

    Ok(Arc::new(ServiceState {
        repository: DataRepository::new(deps),
        jwt_auth,
        metrics,
    }))
}
