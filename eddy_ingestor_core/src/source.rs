use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::position::ConsumptionPosition;

/// Where a message sits in the broker log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub payload: Vec<u8>,
    pub position: MessagePosition,
}

/// A live session with the broker.
///
/// Reconnecting after transient failures is up to the implementation. The
/// ingest loop only sees retryable errors from [`EventSource::poll`].
#[async_trait]
pub trait EventSource: Send {
    /// Waits at most `timeout` for the next message.
    ///
    /// Returns `Ok(None)` when no message arrived in time. Dropping the
    /// returned future must not lose a message.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, SourceError>;

    /// Records that every message up to and including `position` is durable.
    async fn commit(&mut self, position: &ConsumptionPosition) -> Result<(), SourceError>;

    /// Leaves the consumer group. Called once, when ingestion stops.
    async fn close(&mut self);
}

/// Opens new sessions with the broker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn EventSource>, SourceError>;

    /// Human readable broker address, used in logs.
    fn target(&self) -> String;
}
