//! Appends normalized events to a Delta Lake table.
//!
//! The ingest loop only sees the [`TableSink`] trait. [`DeltaTableWriter`] is
//! the production implementation and talks to S3 compatible storage through
//! the `deltalake-aws` handlers.

mod delta;
pub mod error;
mod storage;

use async_trait::async_trait;
use eddy_events::EventRecord;

pub use self::delta::DeltaTableWriter;
pub use self::error::{DataLakeError, Result};
pub use self::storage::S3StorageOptions;

/// Destination of flushed batches.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Appends `events` as a single atomic commit.
    ///
    /// Either every event becomes visible to readers or none does. An empty
    /// slice is a no-op and creates no commit.
    async fn append(&self, events: &[EventRecord]) -> Result<()>;
}
