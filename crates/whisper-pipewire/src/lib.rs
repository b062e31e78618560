//! Whisper PipeWire - Talking to the audio server through its command-line tools.
//!
//! This crate handles all interactions with PipeWire, including:
//! - Running `pw-link`, `pw-cli` and `pactl` on the host
//! - Listing ports and links
//! - Creating and removing links
//! - Reading and writing device volume

pub mod controller;
pub mod error;
pub mod pwlink;
pub mod runner;
pub mod volume;

pub use controller::LinkController;
pub use error::{PwError, PwResult};
pub use pwlink::{PwLink, ToolPaths};
pub use runner::{CommandRunner, HostCommandRunner, HostSpawn};
pub use volume::AudioControl;
pub use whisper_core::DeviceKind;
