//! Audio ports and the verbose port-listing parser.
//!
//! `pw-link --input --verbose --id` (and its `--output` twin) prints one
//! block per port:
//!
//! ```text
//!   47 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
//!       alsa:pcm:0:front:0:playback:playback_0
//!       Built-in Audio Analog Stereo:playback_FL
//! ```
//!
//! Blocks sharing a resource tag (the node name before the first `:`)
//! describe the channels of one device and are merged into a single
//! [`Port`].

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

/// Prefix carried by the descriptor line of hardware-backed ports.
pub const ALSA_PREFIX: &str = "alsa:";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\d+)\s+(\S.*)$").expect("header pattern is valid"));

/// Direction of a port as seen by the link tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Ports that receive audio (sinks, playback)
    Input,
    /// Ports that produce audio (sources, capture, monitors)
    Output,
}

/// Which side of a device link a volume belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Playback device (the input side of a link)
    Sink,
    /// Capture device (the output side of a link)
    Source,
}

impl DeviceKind {
    /// Noun used by `pactl` sub-commands.
    #[must_use]
    pub fn noun(self) -> &'static str {
        match self {
            Self::Sink => "sink",
            Self::Source => "source",
        }
    }
}

/// A device as reconstructed from the port listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Id of the first header row that introduced this device
    pub id: String,
    /// Node name, e.g. `alsa_output.pci-0000_00_1f.3.analog-stereo`
    pub resource_tag: String,
    /// Hardware descriptor; starts with `alsa:` for physical devices
    pub alsa_tag: String,
    /// Display name, taken from the last channel line
    pub name: String,
    /// Channel link id -> channel label
    pub channels: BTreeMap<String, String>,
}

impl Port {
    fn new(id: &str, resource_tag: &str) -> Self {
        Self {
            id: id.to_string(),
            resource_tag: resource_tag.to_string(),
            alsa_tag: String::new(),
            name: String::new(),
            channels: BTreeMap::new(),
        }
    }

    /// Check if this port belongs to a physical ALSA device.
    #[must_use]
    pub fn is_alsa(&self) -> bool {
        self.alsa_tag.starts_with(ALSA_PREFIX)
    }

    /// Check if the given channel link id belongs to this port.
    #[must_use]
    pub fn has_channel(&self, link_id: &str) -> bool {
        self.channels.contains_key(link_id)
    }
}

/// Ports keyed by resource tag, in the order the tool listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortList {
    ports: Vec<Port>,
    by_tag: HashMap<String, usize>,
}

impl PortList {
    /// Return the slot for `resource_tag`, creating it on first sight.
    fn slot(&mut self, id: &str, resource_tag: &str) -> usize {
        if let Some(&slot) = self.by_tag.get(resource_tag) {
            return slot;
        }
        let slot = self.ports.len();
        self.ports.push(Port::new(id, resource_tag));
        self.by_tag.insert(resource_tag.to_string(), slot);
        slot
    }

    /// Get a port by resource tag.
    #[must_use]
    pub fn get(&self, resource_tag: &str) -> Option<&Port> {
        self.by_tag.get(resource_tag).map(|&slot| &self.ports[slot])
    }

    /// Find the port owning a channel link id.
    #[must_use]
    pub fn find_by_channel(&self, link_id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.has_channel(link_id))
    }

    /// Find the ALSA-backed port owning a channel link id.
    #[must_use]
    pub fn find_alsa_device(&self, link_id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.has_channel(link_id) && p.is_alsa())
    }

    /// Iterate over ports in listing order.
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Consume the list, keeping listing order.
    #[must_use]
    pub fn into_vec(self) -> Vec<Port> {
        self.ports
    }
}

/// A `<id> <resource>:<rest>` header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header<'a> {
    pub id: &'a str,
    pub resource_tag: &'a str,
}

impl<'a> Header<'a> {
    pub(crate) fn parse(line: &'a str) -> Option<Self> {
        let caps = HEADER_RE.captures(line)?;
        let id = caps.get(1)?.as_str();
        let rest = caps.get(2)?.as_str();
        let resource_tag = rest.split_once(':').map_or(rest, |(tag, _)| tag);
        Some(Self { id, resource_tag })
    }
}

/// Where the scanner is inside a port block.
#[derive(Debug)]
enum ScanState {
    ExpectHeader,
    ExpectAlsaLine { slot: usize, header_id: String },
    ExpectChannelLines { slot: usize, header_id: String },
}

/// Parse verbose port-listing output.
///
/// Scanning stops at the first blank line.
///
/// # Errors
/// Returns a parse error if a descriptor line appears before any header or
/// a channel line has no `:` separator.
pub fn parse_port_list(output: &str) -> Result<PortList> {
    let mut ports = PortList::default();
    let mut state = ScanState::ExpectHeader;

    for (index, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            break;
        }

        if let Some(header) = Header::parse(line) {
            let slot = ports.slot(header.id, header.resource_tag);
            trace!(id = header.id, tag = header.resource_tag, "Port header");
            state = ScanState::ExpectAlsaLine { slot, header_id: header.id.to_string() };
            continue;
        }

        let text = line.trim();
        state = match state {
            ScanState::ExpectHeader => {
                return Err(Error::OrphanLine { line: index + 1, text: text.to_string() });
            }
            ScanState::ExpectAlsaLine { slot, header_id } => {
                ports.ports[slot].alsa_tag = text.to_string();
                ScanState::ExpectChannelLines { slot, header_id }
            }
            ScanState::ExpectChannelLines { slot, header_id } => {
                let (name, channel) = text.split_once(':').ok_or_else(|| {
                    Error::MissingChannelSeparator { line: index + 1, text: text.to_string() }
                })?;
                let port = &mut ports.ports[slot];
                // Every channel line overwrites the name; the last one wins.
                port.name = name.to_string();
                port.channels.insert(header_id.clone(), channel.to_string());
                ScanState::ExpectChannelLines { slot, header_id }
            }
        };
    }

    Ok(ports)
}
