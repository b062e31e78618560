//! IPC event types (server to client).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use whisper_core::{DeviceKind, DeviceLink};

/// Event sent from daemon to subscribed clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type
    pub event: EventType,
    /// Event data
    pub data: Value,
}

impl Event {
    /// Build an event from serializable data.
    #[must_use]
    pub fn new<T: Serialize>(event: EventType, data: &T) -> Self {
        Self { event, data: serde_json::to_value(data).unwrap_or_default() }
    }
}

/// Types of events that can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The rendered device links changed
    ConnectionsChanged,
    /// A device volume was applied
    VolumeChanged,
    /// Settings changed
    SettingsChanged,
    /// Error occurred
    Error,
}

impl EventType {
    pub const ALL: [Self; 4] =
        [Self::ConnectionsChanged, Self::VolumeChanged, Self::SettingsChanged, Self::Error];
}

/// Connections changed event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsChangedData {
    pub connections: Vec<DeviceLink>,
    pub show_connection_ids: bool,
    pub generation: u64,
}

/// Volume changed event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeChangedData {
    pub kind: DeviceKind,
    pub resource_name: String,
    pub volume: f32,
}

/// Settings changed event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsChangedData {
    pub show_connection_ids: bool,
}

/// Error event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: i32,
    pub message: String,
    pub source: String,
}
