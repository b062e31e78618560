//! Raw port-to-port links and the link-listing parser.
//!
//! `pw-link --links --id` prints each port followed by its links:
//!
//! ```text
//!   61 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FL
//!  104   |->   52 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
//!   52 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
//!  104   |<-   61 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FL
//! ```
//!
//! Only `|->` rows are recorded; `|<-` rows repeat the same link from the
//! other side.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::port::Header;

const OUTGOING: &str = "|->";
const INCOMING: &str = "|<-";

/// One elementary channel link reported by the link tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Link id assigned by the server
    pub id: String,
    /// Port id the link leaves from
    pub output_port_id: String,
    /// Resource tag of the destination node
    pub destination_channel_tag: String,
    /// Port id the link arrives at
    pub destination_port_id: String,
    /// Destination port label, e.g. `playback_FL`
    pub channel: String,
}

/// Connections leaving one output port, in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLinks {
    pub output_port_id: String,
    pub connections: Vec<Connection>,
}

impl OutputLinks {
    fn upsert(&mut self, connection: Connection) {
        match self.connections.iter_mut().find(|c| c.id == connection.id) {
            Some(existing) => *existing = connection,
            None => self.connections.push(connection),
        }
    }
}

/// Output port id -> connections keyed by connection id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkList {
    outputs: Vec<OutputLinks>,
    by_output: HashMap<String, usize>,
}

impl LinkList {
    fn open(&mut self, output_port_id: &str) -> usize {
        if let Some(&slot) = self.by_output.get(output_port_id) {
            return slot;
        }
        let slot = self.outputs.len();
        self.outputs.push(OutputLinks {
            output_port_id: output_port_id.to_string(),
            connections: Vec::new(),
        });
        self.by_output.insert(output_port_id.to_string(), slot);
        slot
    }

    /// Connections leaving the given output port.
    #[must_use]
    pub fn get(&self, output_port_id: &str) -> Option<&OutputLinks> {
        self.by_output.get(output_port_id).map(|&slot| &self.outputs[slot])
    }

    /// Iterate over output ports in listing order.
    pub fn iter(&self) -> impl Iterator<Item = &OutputLinks> {
        self.outputs.iter()
    }

    /// Every connection id in the listing, whatever the endpoints.
    #[must_use]
    pub fn connection_ids(&self) -> BTreeSet<String> {
        self.outputs
            .iter()
            .flat_map(|o| o.connections.iter().map(|c| c.id.clone()))
            .collect()
    }

    /// Total number of connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.outputs.iter().map(|o| o.connections.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

fn malformed(line: usize, text: &str) -> Error {
    Error::MalformedConnection { line, text: text.trim().to_string() }
}

fn parse_connection(line_no: usize, line: &str, output_port_id: &str) -> Result<Connection> {
    let id = line
        .split_whitespace()
        .next()
        .filter(|token| token.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| malformed(line_no, line))?;
    let (_, target) = line.split_once(OUTGOING).ok_or_else(|| malformed(line_no, line))?;
    let (target_id, rest) =
        target.trim_start().split_once(' ').ok_or_else(|| malformed(line_no, line))?;
    let (tag, channel) = rest.split_once(':').ok_or_else(|| malformed(line_no, line))?;

    if target_id.is_empty() {
        return Err(malformed(line_no, line));
    }

    Ok(Connection {
        id: id.to_string(),
        output_port_id: output_port_id.to_string(),
        destination_channel_tag: tag.to_string(),
        destination_port_id: target_id.to_string(),
        channel: channel.to_string(),
    })
}

/// Parse link-listing output.
///
/// Scanning stops at the first blank line.
///
/// # Errors
/// Returns a parse error for header rows that carry no id, and for link
/// rows that appear before any header or lack a target.
pub fn parse_link_list(output: &str) -> Result<LinkList> {
    let mut links = LinkList::default();
    let mut current: Option<usize> = None;

    for (index, line) in output.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            break;
        }

        if line.contains(OUTGOING) {
            let slot = current.ok_or_else(|| Error::OrphanLine {
                line: line_no,
                text: line.trim().to_string(),
            })?;
            let block = &mut links.outputs[slot];
            let connection = parse_connection(line_no, line, &block.output_port_id)?;
            block.upsert(connection);
        } else if !line.contains(INCOMING) {
            let header = Header::parse(line).ok_or_else(|| Error::MalformedHeader {
                line: line_no,
                text: line.trim().to_string(),
            })?;
            current = Some(links.open(header.id));
        }
    }

    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const LINKS: &str = "  61 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FL
 104   |->   52 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
  62 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FR
 105   |->   53 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FR
 130   |->   90 obs:input_FR
  52 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
 104   |<-   61 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FL
";

    #[test]
    fn test_parse_realistic_link_listing() {
        let links = parse_link_list(LINKS).expect("valid listing");

        let capture_fl = links.get("61").unwrap();
        assert_eq!(capture_fl.connections.len(), 1);
        assert_eq!(
            capture_fl.connections[0],
            Connection {
                id: "104".into(),
                output_port_id: "61".into(),
                destination_channel_tag: "alsa_output.pci-0000_00_1f.3.analog-stereo".into(),
                destination_port_id: "52".into(),
                channel: "playback_FL".into(),
            }
        );

        let capture_fr = links.get("62").unwrap();
        let ids: Vec<_> = capture_fr.connections.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["105", "130"]);
        assert_eq!(capture_fr.connections[1].destination_channel_tag, "obs");
    }

    #[test]
    fn test_incoming_rows_are_ignored() {
        let links = parse_link_list(LINKS).unwrap();

        // Header 52 opens an entry, but its `|<-` row adds nothing.
        assert!(links.get("52").unwrap().connections.is_empty());
        assert_eq!(links.connection_count(), 3);
    }

    #[test]
    fn test_connection_ids_cover_all_links() {
        let links = parse_link_list(LINKS).unwrap();
        let ids: Vec<_> = links.connection_ids().into_iter().collect();

        assert_eq!(ids, ["104", "105", "130"]);
    }

    #[test]
    fn test_output_order_follows_listing() {
        let links = parse_link_list(LINKS).unwrap();
        let order: Vec<_> = links.iter().map(|o| o.output_port_id.as_str()).collect();

        assert_eq!(order, ["61", "62", "52"]);
    }

    #[test]
    fn test_stops_at_first_blank_line() {
        let listing = format!("{LINKS}\n  70 late:out\n 200   |->   71 late:in\n");
        let links = parse_link_list(&listing).unwrap();

        assert!(links.get("70").is_none());
    }

    #[test]
    fn test_repeated_header_reuses_entry() {
        let listing = "  61 a:FL\n 104   |->   52 b:FL\n  61 a:FL\n 106   |->   54 c:FL\n";
        let links = parse_link_list(listing).unwrap();

        assert_eq!(links.get("61").unwrap().connections.len(), 2);
    }

    #[test]
    fn test_empty_listing() {
        let links = parse_link_list("").unwrap();
        assert!(links.is_empty());
        assert!(links.connection_ids().is_empty());
    }

    #[test]
    fn test_link_before_header_is_rejected() {
        let err = parse_link_list(" 104   |->   52 b:FL\n").unwrap_err();
        assert_matches!(err, Error::OrphanLine { line: 1, .. });
    }

    #[test]
    fn test_link_without_channel_is_rejected() {
        let err = parse_link_list("  61 a:FL\n 104   |->   52 nochannel\n").unwrap_err();
        assert_matches!(err, Error::MalformedConnection { line: 2, .. });
    }

    #[test]
    fn test_link_without_own_id_is_rejected() {
        let err = parse_link_list("  61 a:FL\n   |->   52 b:FL\n").unwrap_err();
        assert_matches!(err, Error::MalformedConnection { line: 2, .. });
    }

    #[test]
    fn test_garbage_header_is_rejected() {
        let err = parse_link_list("not a header\n").unwrap_err();
        assert_matches!(err, Error::MalformedHeader { line: 1, .. });
    }
}
