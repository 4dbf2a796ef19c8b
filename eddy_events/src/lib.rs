//! The analytics event model.
//!
//! Raw broker messages become [`EventRecord`]s through [`normalize`], and
//! batches of records become Arrow record batches through [`to_record_batch`].

pub mod error;
pub mod normalize;
pub mod record;
pub mod schema;

pub use error::{NormalizeError, Result};
pub use normalize::{normalize, normalize_at, parse_timestamp};
pub use record::{EMPTY_METADATA, EventRecord, STRING_FIELDS, UNKNOWN};
pub use schema::{column_names, event_schema, to_record_batch};
