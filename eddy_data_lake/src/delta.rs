use std::collections::HashMap;
use std::sync::Once;

use async_trait::async_trait;
use deltalake_core::DeltaOps;
use deltalake_core::kernel::transaction::CommitProperties;
use deltalake_core::protocol::SaveMode;
use deltalake_core::table::builder::ensure_table_uri;
use eddy_events::{EventRecord, to_record_batch};
use serde_json::Value;
use snafu::{ResultExt, ensure};
use tracing::{debug, info};

use crate::TableSink;
use crate::error::{AppendSnafu, ArrowSnafu, InvalidLocationSnafu, OpenTableSnafu, Result};

static REGISTER_HANDLERS: Once = Once::new();

/// Appends event batches to a Delta table.
///
/// The table is loaded fresh for every append so commits from other writers
/// are picked up. A missing table is created by the first append.
pub struct DeltaTableWriter {
    table_uri: String,
    storage_options: HashMap<String, String>,
}

impl DeltaTableWriter {
    pub fn new(
        table_uri: impl Into<String>,
        storage_options: HashMap<String, String>,
    ) -> Result<Self> {
        REGISTER_HANDLERS.call_once(|| deltalake_aws::register_handlers(None));

        let table_uri = table_uri.into();
        ensure!(
            !table_uri.trim().is_empty(),
            InvalidLocationSnafu {
                message: "table path must not be empty",
            }
        );

        ensure_table_uri(&table_uri).context(OpenTableSnafu {
            table_uri: table_uri.clone(),
        })?;

        Ok(Self {
            table_uri,
            storage_options,
        })
    }

    pub fn table_uri(&self) -> &str {
        &self.table_uri
    }

    async fn open(&self) -> Result<DeltaOps> {
        debug!(table_uri = %self.table_uri, "Loading Delta table");
        DeltaOps::try_from_uri_with_storage_options(&self.table_uri, self.storage_options.clone())
            .await
            .context(OpenTableSnafu {
                table_uri: self.table_uri.clone(),
            })
    }
}

#[async_trait]
impl TableSink for DeltaTableWriter {
    async fn append(&self, events: &[EventRecord]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let batch = to_record_batch(events).context(ArrowSnafu {})?;
        let ops = self.open().await?;

        let commit_properties = CommitProperties::default().with_metadata([
            ("writer".to_string(), Value::from(env!("CARGO_PKG_NAME"))),
            ("records".to_string(), Value::from(events.len())),
        ]);

        let table = ops
            .write(vec![batch])
            .with_save_mode(SaveMode::Append)
            .with_commit_properties(commit_properties)
            .await
            .context(AppendSnafu {
                table_uri: self.table_uri.clone(),
                records: events.len(),
            })?;

        info!(
            table_uri = %self.table_uri,
            records = events.len(),
            version = ?table.version(),
            "Delta table committed"
        );

        Ok(())
    }
}

impl std::fmt::Debug for DeltaTableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaTableWriter")
            .field("table_uri", &self.table_uri)
            .finish_non_exhaustive()
    }
}
