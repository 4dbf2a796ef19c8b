//! Batching and delivery core of the ingest service.
//!
//! [`IngestLoop`] pulls messages from an [`EventSource`], normalizes them,
//! buffers them in a [`BatchAccumulator`] and appends flushed batches to a
//! [`TableSink`](eddy_data_lake::TableSink).

mod accumulator;
pub mod error;
mod ingest;
mod metrics;
mod position;
mod source;
mod supervisor;

pub use self::accumulator::{BatchAccumulator, FlushDecision, FlushTrigger};
pub use self::error::{BoxError, IngestError, Result, SourceError, SupervisorError};
pub use self::ingest::{IngestLoop, IngestOptions, IngestState};
pub use self::position::ConsumptionPosition;
pub use self::source::{Connector, EventSource, MessagePosition, SourceMessage};
pub use self::supervisor::{ConnectOptions, ConnectionSupervisor};
