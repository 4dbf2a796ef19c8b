use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eddy_ingestor_core::error::{CommitSnafu, ReceiveSnafu};
use eddy_ingestor_core::{
    BoxError, Connector, ConsumptionPosition, EventSource, MessagePosition, SourceError,
    SourceMessage,
};
use eddy_observability::ErrorKind;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use snafu::{ResultExt, ensure};
use tracing::{debug, info, warn};

use crate::error::{ClientSnafu, JoinSnafu, KafkaError, NoBrokersSnafu, Result};
use crate::options::KafkaOptions;

/// Creates consumer group members for the configured topic.
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    options: KafkaOptions,
}

/// A subscribed consumer group member.
pub struct KafkaEventSource {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl KafkaConnector {
    pub fn new(options: KafkaOptions) -> Self {
        Self { options }
    }

    async fn open(&self) -> Result<KafkaEventSource> {
        let consumer: StreamConsumer = self
            .options
            .client_config()
            .create()
            .context(ClientSnafu {})?;
        let consumer = Arc::new(consumer);

        self.probe(consumer.clone()).await?;

        consumer
            .subscribe(&[self.options.topic.as_str()])
            .context(ClientSnafu {})?;

        info!(
            topic = %self.options.topic,
            group_id = %self.options.group_id,
            "Subscribed to topic"
        );

        Ok(KafkaEventSource {
            consumer,
            topic: self.options.topic.clone(),
        })
    }

    /// Fetches cluster metadata to prove the brokers are reachable.
    ///
    /// A topic that does not exist yet is not an error. The subscription is
    /// assigned partitions once a producer creates it.
    async fn probe(&self, consumer: Arc<StreamConsumer>) -> Result<()> {
        let timeout = self.options.metadata_timeout;

        let metadata = tokio::task::spawn_blocking(move || consumer.fetch_metadata(None, timeout))
            .await
            .context(JoinSnafu {})?
            .context(ClientSnafu {})?;

        let topic = metadata
            .topics()
            .iter()
            .find(|t| t.name() == self.options.topic)
            .map(|t| TopicMetadata {
                error: t.error().map(|err| format!("{err:?}")),
                partitions: t.partitions().len(),
            });

        match check_metadata(
            &self.options.bootstrap_servers,
            metadata.brokers().len(),
            topic,
        )? {
            Reachability::Ready {
                brokers,
                partitions,
            } => debug!(
                topic = %self.options.topic,
                brokers,
                partitions,
                "Fetched cluster metadata"
            ),
            Reachability::TopicPending { brokers, reason } => warn!(
                topic = %self.options.topic,
                brokers,
                reason = %reason,
                "Topic not available yet, subscribing anyway"
            ),
        }

        Ok(())
    }
}

struct TopicMetadata {
    error: Option<String>,
    partitions: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Reachability {
    Ready { brokers: usize, partitions: usize },
    TopicPending { brokers: usize, reason: String },
}

fn check_metadata(
    bootstrap_servers: &str,
    brokers: usize,
    topic: Option<TopicMetadata>,
) -> Result<Reachability> {
    ensure!(brokers > 0, NoBrokersSnafu { bootstrap_servers });

    Ok(match topic {
        None => Reachability::TopicPending {
            brokers,
            reason: "missing from metadata".to_string(),
        },
        Some(TopicMetadata {
            error: Some(reason),
            ..
        }) => Reachability::TopicPending { brokers, reason },
        Some(TopicMetadata {
            error: None,
            partitions,
        }) => Reachability::Ready {
            brokers,
            partitions,
        },
    })
}

/// Only configuration errors are final; everything else is retried.
fn source_error(err: KafkaError) -> SourceError {
    if err.kind() == ErrorKind::Configuration {
        SourceError::Configuration {
            source: BoxError::from(err),
        }
    } else {
        SourceError::Connect {
            source: BoxError::from(err),
        }
    }
}

/// Offsets to commit for `position`. Kafka expects the offset of the next
/// message to read.
fn commit_list(position: &ConsumptionPosition) -> Result<TopicPartitionList> {
    let mut offsets = TopicPartitionList::new();
    for (topic, partition, offset) in position.iter() {
        offsets
            .add_partition_offset(topic, partition, Offset::Offset(offset + 1))
            .context(ClientSnafu {})?;
    }
    Ok(offsets)
}

#[async_trait]
impl Connector for KafkaConnector {
    async fn connect(&self) -> Result<Box<dyn EventSource>, SourceError> {
        match self.open().await {
            Ok(source) => Ok(Box::new(source)),
            Err(err) => Err(source_error(err)),
        }
    }

    fn target(&self) -> String {
        self.options.bootstrap_servers.clone()
    }
}

impl KafkaEventSource {
    async fn commit_offsets(&self, position: &ConsumptionPosition) -> Result<()> {
        let offsets = commit_list(position)?;
        let consumer = self.consumer.clone();
        tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync))
            .await
            .context(JoinSnafu {})?
            .context(ClientSnafu {})
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, SourceError> {
        let message = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => return Ok(None),
            Ok(result) => result
                .map_err(|source| BoxError::from(KafkaError::Client { source }))
                .context(ReceiveSnafu {})?,
        };

        Ok(Some(SourceMessage {
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            position: MessagePosition {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
        }))
    }

    async fn commit(&mut self, position: &ConsumptionPosition) -> Result<(), SourceError> {
        self.commit_offsets(position)
            .await
            .map_err(BoxError::from)
            .context(CommitSnafu {})
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
        info!(topic = %self.topic, "Unsubscribed from topic");
    }
}
