//! IPC message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use whisper_core::{DeviceKind, PortDirection};

use crate::events::EventType;

/// Request envelope sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID for matching responses
    pub id: u64,
    /// The method to invoke
    pub method: Method,
}

/// Response envelope sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this is responding to
    pub id: u64,
    /// Result of the request
    pub result: Result<Value, ErrorInfo>,
}

impl Response {
    #[must_use]
    pub fn ok(id: u64, value: Value) -> Self {
        Self { id, result: Ok(value) }
    }

    #[must_use]
    pub fn err(id: u64, error: ErrorInfo) -> Self {
        Self { id, result: Err(error) }
    }
}

/// Error information in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl ErrorInfo {
    pub const BAD_REQUEST: i32 = 400;
    pub const UNAVAILABLE: i32 = 503;
    pub const INTERNAL: i32 = 500;
    pub const TOOL_FAILED: i32 = 502;

    /// Create a new error.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Methods that can be invoked via IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Method {
    // Queries
    /// Get the currently rendered device links
    GetConnections,
    /// List ports in one direction
    GetPorts { direction: PortDirection },
    /// Read a device's volume (0.0 - 1.0)
    GetVolume { kind: DeviceKind, resource_name: String },
    /// Get persisted settings
    GetSettings,
    /// Get diagnostic information
    GetDiagnostics,

    // Link control
    /// Link an input device port to an output device port
    Connect { input: String, output: String },
    /// Remove links by id
    Disconnect { link_ids: Vec<String> },
    /// Force a reconciliation
    Refresh,

    // Device control
    /// Set a device's volume on the 0-100 slider scale
    SetVolume { kind: DeviceKind, resource_name: String, value: f64 },

    // Settings
    /// Toggle whether link ids are shown
    SetShowConnectionIds { enabled: bool },

    // Subscriptions (handled by the server)
    /// Subscribe to event types
    Subscribe { events: Vec<EventType> },
    /// Unsubscribe from event types
    Unsubscribe { events: Vec<EventType> },

    // System
    /// Request graceful shutdown
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_wire_format() {
        let method = Method::Disconnect { link_ids: vec!["5".into(), "7".into()] };
        let request = Request { id: 3, method };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 3,
                "method": {"type": "Disconnect", "params": {"link_ids": ["5", "7"]}}
            })
        );
    }

    #[test]
    fn test_unit_method_parses_without_params() {
        let request: Request =
            serde_json::from_str(r#"{"id":1,"method":{"type":"Refresh"}}"#).unwrap();
        assert_eq!(request.method, Method::Refresh);
    }

    #[test]
    fn test_volume_method_uses_lowercase_kind() {
        let request: Request = serde_json::from_str(
            concat!(
                r#"{"id":2,"method":{"type":"SetVolume","#,
                r#""params":{"kind":"source","resource_name":"mic","value":42.0}}}"#,
            ),
        )
        .unwrap();

        assert_eq!(
            request.method,
            Method::SetVolume { kind: DeviceKind::Source, resource_name: "mic".into(), value: 42.0 }
        );
    }

    #[test]
    fn test_error_response_round_trips() {
        let response = Response::err(9, ErrorInfo::new(ErrorInfo::TOOL_FAILED, "pw-link failed"));
        let text = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&text).unwrap();

        assert_eq!(back.id, 9);
        assert_eq!(back.result.unwrap_err().code, 502);
    }
}
