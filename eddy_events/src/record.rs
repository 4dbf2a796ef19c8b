use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for grouping fields that arrive blank.
pub const UNKNOWN: &str = "unknown";

/// Serialized form of an empty `metadata` value.
pub const EMPTY_METADATA: &str = "{}";

/// String columns of the event table, in column order.
///
/// `channel` and `event_type` default to [`UNKNOWN`], every other field defaults
/// to the empty string.
pub const STRING_FIELDS: [&str; 13] = [
    "channel",
    "platform",
    "event_type",
    "event_category",
    "resource_id",
    "resource_title",
    "interaction_target",
    "session_id",
    "user_id",
    "device_id",
    "user_agent",
    "client_version",
    "interaction_text",
];

/// A normalized analytics event, one row of the event table.
///
/// Every field except `interaction_value` is always populated. `metadata` holds
/// compact JSON text since the table only stores flat scalar columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub platform: String,
    pub event_type: String,
    pub event_category: String,
    pub resource_id: String,
    pub resource_title: String,
    pub interaction_target: String,
    pub session_id: String,
    pub user_id: String,
    pub device_id: String,
    pub user_agent: String,
    pub client_version: String,
    pub interaction_value: Option<f64>,
    pub interaction_text: String,
    pub metadata: String,
}

impl EventRecord {
    /// Returns the value of one of the [`STRING_FIELDS`] by column name.
    pub fn string_field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "channel" => &self.channel,
            "platform" => &self.platform,
            "event_type" => &self.event_type,
            "event_category" => &self.event_category,
            "resource_id" => &self.resource_id,
            "resource_title" => &self.resource_title,
            "interaction_target" => &self.interaction_target,
            "session_id" => &self.session_id,
            "user_id" => &self.user_id,
            "device_id" => &self.device_id,
            "user_agent" => &self.user_agent,
            "client_version" => &self.client_version,
            "interaction_text" => &self.interaction_text,
            "metadata" => &self.metadata,
            _ => return None,
        };

        Some(value.as_str())
    }

    pub(crate) fn string_field_mut(&mut self, name: &str) -> Option<&mut String> {
        let value = match name {
            "channel" => &mut self.channel,
            "platform" => &mut self.platform,
            "event_type" => &mut self.event_type,
            "event_category" => &mut self.event_category,
            "resource_id" => &mut self.resource_id,
            "resource_title" => &mut self.resource_title,
            "interaction_target" => &mut self.interaction_target,
            "session_id" => &mut self.session_id,
            "user_id" => &mut self.user_id,
            "device_id" => &mut self.device_id,
            "user_agent" => &mut self.user_agent,
            "client_version" => &mut self.client_version,
            "interaction_text" => &mut self.interaction_text,
            _ => return None,
        };

        Some(value)
    }

    /// An event at `timestamp` with every field at its default.
    pub(crate) fn empty_at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            channel: UNKNOWN.to_string(),
            platform: String::new(),
            event_type: UNKNOWN.to_string(),
            event_category: String::new(),
            resource_id: String::new(),
            resource_title: String::new(),
            interaction_target: String::new(),
            session_id: String::new(),
            user_id: String::new(),
            device_id: String::new(),
            user_agent: String::new(),
            client_version: String::new(),
            interaction_value: None,
            interaction_text: String::new(),
            metadata: EMPTY_METADATA.to_string(),
        }
    }
}

/// Default value for a string field that arrived missing or null.
pub(crate) fn default_for(field: &str) -> &'static str {
    match field {
        "channel" | "event_type" => UNKNOWN,
        _ => "",
    }
}
