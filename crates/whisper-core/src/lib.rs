//! Whisper Core - Parsing and reconciliation of PipeWire device links.
//!
//! This crate turns the text printed by `pw-link` into ports, raw links and
//! device-level connections. Everything here is pure: no processes are run
//! and no I/O happens.

pub mod error;
pub mod link;
pub mod port;
pub mod reconcile;
pub mod state;

pub use error::{Error, Result};
pub use link::{Connection, LinkList, OutputLinks, parse_link_list};
pub use port::{DeviceKind, Port, PortDirection, PortList, parse_port_list};
pub use reconcile::{DeviceKey, DeviceLink, Reconciliation, needs_render, reconcile};
pub use state::{RenderSnapshot, RenderedState};
