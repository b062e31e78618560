//! Device-level link reconciliation.
//!
//! Collapses channel links between two ALSA devices into a single
//! [`DeviceLink`] and decides whether the presentation needs a redraw.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::link::LinkList;
use crate::port::{Port, PortList};

/// Grouping key: `(output resource tag, input resource tag)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub output: String,
    pub input: String,
}

impl DeviceKey {
    #[must_use]
    pub fn new(output: &Port, input: &Port) -> Self {
        Self { output: output.resource_tag.clone(), input: input.resource_tag.clone() }
    }
}

/// All channel links between one output device and one input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLink {
    /// Device receiving audio (a sink)
    pub input_device: Port,
    /// Device producing audio (a source)
    pub output_device: Port,
    /// Link ids, in the order they were found
    pub link_ids: Vec<String>,
}

impl DeviceLink {
    #[must_use]
    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(&self.output_device, &self.input_device)
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Device links in first-seen order
    pub links: Vec<DeviceLink>,
    /// Union of every link id in `links`
    pub link_ids: BTreeSet<String>,
}

impl Reconciliation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Build device links from fresh port and link listings.
///
/// Links whose output or input port is not ALSA-backed are dropped.
#[must_use]
pub fn reconcile(inputs: &PortList, outputs: &PortList, links: &LinkList) -> Reconciliation {
    let mut result = Reconciliation::default();
    let mut slots: HashMap<DeviceKey, usize> = HashMap::new();

    for block in links.iter() {
        let Some(output_device) = outputs.find_alsa_device(&block.output_port_id) else {
            trace!(port = %block.output_port_id, "Skipping links from non-ALSA output");
            continue;
        };

        for connection in &block.connections {
            let Some(input_device) = inputs.find_alsa_device(&connection.destination_port_id)
            else {
                trace!(link = %connection.id, "Skipping link to non-ALSA input");
                continue;
            };

            let key = DeviceKey::new(output_device, input_device);
            let slot = *slots.entry(key).or_insert_with(|| {
                result.links.push(DeviceLink {
                    input_device: input_device.clone(),
                    output_device: output_device.clone(),
                    link_ids: Vec::new(),
                });
                result.links.len() - 1
            });

            let device_link = &mut result.links[slot];
            if !device_link.link_ids.contains(&connection.id) {
                device_link.link_ids.push(connection.id.clone());
            }
            result.link_ids.insert(connection.id.clone());
        }
    }

    debug!(
        devices = result.links.len(),
        links = result.link_ids.len(),
        "Reconciled device links"
    );
    result
}

/// Decide whether the presentation must be redrawn.
#[must_use]
pub fn needs_render(rendered: &BTreeSet<String>, fresh: &BTreeSet<String>, force: bool) -> bool {
    force || rendered.symmetric_difference(fresh).next().is_some()
}
