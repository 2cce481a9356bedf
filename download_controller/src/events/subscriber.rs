//! Inbound Kafka consumption (§4.5): a single consumer-group client
//! subscribed to the two registration/deletion topics, dispatching by
//! `type` header onto `DataRepository::register_new_file` /
//! `DataRepository::delete_file`.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::{FileDeletionRequested, FileInternallyRegistered};
use crate::config::KafkaConfig;
use crate::repository::DataRepository;

/// The `type` header value identifying each inbound message kind, set by
/// the upstream event publisher on every message it produces.
const TYPE_HEADER: &str = "type";

pub struct EventSubscriber {
    consumer: StreamConsumer,
    files_to_register_topic: String,
    files_to_register_type: String,
    files_to_delete_topic: String,
    files_to_delete_type: String,
}

impl EventSubscriber {
    pub fn new(config: &KafkaConfig) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.service_group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[
            config.files_to_register_topic.as_str(),
            config.files_to_delete_topic.as_str(),
        ])?;

        Ok(Self {
            consumer,
            files_to_register_topic: config.files_to_register_topic.clone(),
            files_to_register_type: config.files_to_register_type.clone(),
            files_to_delete_topic: config.files_to_delete_topic.clone(),
            files_to_delete_type: config.files_to_delete_type.clone(),
        })
    }

    /// Runs until `cancel` fires. Each message is dispatched on
    /// `(topic, type)`; an unrecognized type on a subscribed topic is
    /// treated as fatal to that message (logged and dropped, per the bus
    /// contract in §4.5) rather than crashing the loop.
    pub async fn run(&self, repository: DataRepository, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("event subscriber shutting down");
                    return;
                }
                message = self.consumer.recv() => {
                    match message {
                        Ok(message) => self.dispatch(&message, repository.clone()).await,
                        Err(e) => error!("error receiving kafka message: {e}"),
                    }
                }
            }
        }
    }

    async fn dispatch(&self, message: &rdkafka::message::BorrowedMessage<'_>, repository: DataRepository) {
        let topic = message.topic();
        let event_type = extract_type_header(message);

        let span = info_span!("consume_event", topic, event_type = event_type.as_deref());
        async {
            let Some(payload) = message.payload() else {
                warn!("received message with empty payload, ignoring");
                return;
            };

            if topic == self.files_to_register_topic {
                if event_type.as_deref() != Some(self.files_to_register_type.as_str()) {
                    error!(?event_type, "unknown event type on registration topic");
                    return;
                }
                match serde_json::from_slice::<FileInternallyRegistered>(payload) {
                    Ok(event) => {
                        if let Err(e) = repository
                            .register_new_file(event.base, event.s3_endpoint_alias)
                            .await
                        {
                            error!("failed to register file: {e}");
                        }
                    }
                    Err(e) => error!("failed to parse FileInternallyRegistered payload: {e}"),
                }
            } else if topic == self.files_to_delete_topic {
                if event_type.as_deref() != Some(self.files_to_delete_type.as_str()) {
                    error!(?event_type, "unknown event type on deletion topic");
                    return;
                }
                match serde_json::from_slice::<FileDeletionRequested>(payload) {
                    Ok(event) => {
                        if let Err(e) = repository.delete_file(&event.file_id).await {
                            error!("failed to delete file: {e}");
                        }
                    }
                    Err(e) => error!("failed to parse FileDeletionRequested payload: {e}"),
                }
            } else {
                warn!("received message on unsubscribed topic {topic}");
            }
        }
        .instrument(span)
        .await
    }
}

fn extract_type_header(message: &rdkafka::message::BorrowedMessage<'_>) -> Option<String> {
    let headers = message.headers()?;
    for i in 0..headers.count() {
        let header = headers.get(i);
        if header.key == TYPE_HEADER {
            return header
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned());
        }
    }
    None
}
