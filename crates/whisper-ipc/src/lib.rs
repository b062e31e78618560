//! Whisper IPC - Unix socket protocol and client library.
//!
//! This crate defines the line-delimited JSON protocol spoken between the
//! daemon and its clients, and provides both ends of the connection.

pub mod client;
pub mod error;
pub mod events;
pub mod messages;
pub mod server;

pub use client::IpcClient;
pub use error::{IpcError, IpcResult};
pub use events::{
    ConnectionsChangedData, ErrorData, Event, EventType, SettingsChangedData, VolumeChangedData,
};
pub use messages::{ErrorInfo, Method, Request, Response};
pub use server::{IncomingRequest, IpcServer};

use std::path::PathBuf;

/// Get the default socket path.
///
/// Uses `$XDG_RUNTIME_DIR/whisper/daemon.sock` or falls back to
/// `/run/user/$UID/whisper/daemon.sock`.
#[must_use]
#[allow(unsafe_code)] // libc::getuid() is safe to call
pub fn socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("whisper/daemon.sock")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/run/user/{uid}/whisper/daemon.sock"))
    }
}
