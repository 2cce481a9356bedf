//! Outbound Kafka publishing (§4.4, §6.2). Every publish is
//! fire-and-forget and keyed by `file_id`; publishing is deliberately the
//! last step of every orchestrator operation, after the state change it
//! describes has already been persisted.

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::Serialize;
use std::time::Duration;

use super::{DownloadServed, FileDeleted, FileRegistered, UnstagedDownloadRequested};
use crate::config::KafkaConfig;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to publish event: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_file_registered(&self, event: FileRegistered) -> Result<(), PublishError>;
    async fn publish_download_served(&self, event: DownloadServed) -> Result<(), PublishError>;
    async fn publish_unstaged_download_requested(
        &self,
        event: UnstagedDownloadRequested,
    ) -> Result<(), PublishError>;
    async fn publish_file_deleted(&self, event: FileDeleted) -> Result<(), PublishError>;
}

pub struct KafkaEventPublisher {
    producer: FutureProducer,
    file_registered_topic: String,
    download_served_topic: String,
    unstaged_download_requested_topic: String,
    file_deleted_topic: String,
}

impl KafkaEventPublisher {
    pub fn new(config: &KafkaConfig) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            file_registered_topic: config.file_registered_topic.clone(),
            download_served_topic: config.download_served_topic.clone(),
            unstaged_download_requested_topic: config.unstaged_download_requested_topic.clone(),
            file_deleted_topic: config.file_deleted_topic.clone(),
        })
    }

    async fn publish<T: Serialize + Sync>(
        &self,
        topic: &str,
        key: &str,
        payload: &T,
    ) -> Result<(), PublishError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| PublishError::Delivery(format!("failed to serialize payload: {e}")))?;

        let record = FutureRecord::to(topic).key(key).payload(&body);
        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| PublishError::Delivery(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish_file_registered(&self, event: FileRegistered) -> Result<(), PublishError> {
        self.publish(&self.file_registered_topic, &event.file_id.clone(), &event)
            .await
    }

    async fn publish_download_served(&self, event: DownloadServed) -> Result<(), PublishError> {
        self.publish(&self.download_served_topic, &event.file_id.clone(), &event)
            .await
    }

    async fn publish_unstaged_download_requested(
        &self,
        event: UnstagedDownloadRequested,
    ) -> Result<(), PublishError> {
        self.publish(
            &self.unstaged_download_requested_topic,
            &event.file_id.clone(),
            &event,
        )
        .await
    }

    async fn publish_file_deleted(&self, event: FileDeleted) -> Result<(), PublishError> {
        self.publish(&self.file_deleted_topic, &event.file_id.clone(), &event)
            .await
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// In-memory fake used by the orchestrator's component tests; records
    /// every published event rather than talking to a broker.
    #[derive(Default)]
    pub struct InMemoryEventPublisher {
        pub file_registered: Mutex<Vec<FileRegistered>>,
        pub download_served: Mutex<Vec<DownloadServed>>,
        pub unstaged_download_requested: Mutex<Vec<UnstagedDownloadRequested>>,
        pub file_deleted: Mutex<Vec<FileDeleted>>,
    }

    #[async_trait]
    impl EventPublisher for InMemoryEventPublisher {
        async fn publish_file_registered(&self, event: FileRegistered) -> Result<(), PublishError> {
            self.file_registered.lock().await.push(event);
            Ok(())
        }

        async fn publish_download_served(&self, event: DownloadServed) -> Result<(), PublishError> {
            self.download_served.lock().await.push(event);
            Ok(())
        }

        async fn publish_unstaged_download_requested(
            &self,
            event: UnstagedDownloadRequested,
        ) -> Result<(), PublishError> {
            self.unstaged_download_requested.lock().await.push(event);
            Ok(())
        }

        async fn publish_file_deleted(&self, event: FileDeleted) -> Result<(), PublishError> {
            self.file_deleted.lock().await.push(event);
            Ok(())
        }
    }
}
