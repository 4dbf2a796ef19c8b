//! Kafka consumer group source built on `rdkafka`.
//!
//! Auto commit is disabled. The ingest loop commits offsets itself after the
//! records they cover are durable.

mod consumer;
pub mod error;
mod options;

pub use self::consumer::{KafkaConnector, KafkaEventSource};
pub use self::error::{KafkaError, Result};
pub use self::options::{KafkaOptions, parse_setting};
