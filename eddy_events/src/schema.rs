//! Arrow layout of the event table.
//!
//! The table is read by downstream dashboards, so column names, order and types
//! are a public contract. Columns are nullable so appends stay compatible with
//! tables created by earlier writers; only `interaction_value` ever holds nulls.

use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray, TimestampMicrosecondArray};
use arrow::error::ArrowError;
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};

use crate::record::{EventRecord, STRING_FIELDS};

pub const TIMESTAMP_TIMEZONE: &str = "UTC";

static EVENT_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    let timestamp = Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Microsecond, Some(TIMESTAMP_TIMEZONE.into())),
        true,
    );

    let mut fields = vec![timestamp];
    fields.extend(column_names().skip(1).map(|name| {
        let data_type = match name {
            "interaction_value" => DataType::Float64,
            _ => DataType::Utf8,
        };
        Field::new(name, data_type, true)
    }));

    Arc::new(Schema::new(fields))
});

/// Returns the schema of the event table.
pub fn event_schema() -> SchemaRef {
    EVENT_SCHEMA.clone()
}

/// Column names in table order.
pub fn column_names() -> impl Iterator<Item = &'static str> {
    let (before_value, after_value) = STRING_FIELDS.split_at(12);
    std::iter::once("timestamp")
        .chain(before_value.iter().copied())
        .chain(std::iter::once("interaction_value"))
        .chain(after_value.iter().copied())
        .chain(std::iter::once("metadata"))
}

/// Converts events into a single record batch with the event table schema.
pub fn to_record_batch(events: &[EventRecord]) -> Result<RecordBatch, ArrowError> {
    let schema = event_schema();

    let columns = schema
        .fields()
        .iter()
        .map(|field| column(field.name(), events))
        .collect::<Vec<_>>();

    RecordBatch::try_new(schema, columns)
}

fn column(name: &str, events: &[EventRecord]) -> ArrayRef {
    match name {
        "timestamp" => {
            let micros = events
                .iter()
                .map(|e| e.timestamp.timestamp_micros())
                .collect::<Vec<_>>();
            Arc::new(TimestampMicrosecondArray::from(micros).with_timezone(TIMESTAMP_TIMEZONE))
        }
        "interaction_value" => Arc::new(
            events
                .iter()
                .map(|e| e.interaction_value)
                .collect::<Float64Array>(),
        ),
        name => Arc::new(
            events
                .iter()
                .map(|e| e.string_field(name))
                .collect::<StringArray>(),
        ),
    }
}
