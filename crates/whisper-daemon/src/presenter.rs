//! Publishing rendered device links to clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;
use whisper_core::DeviceLink;
use whisper_ipc::{ConnectionsChangedData, ErrorData, Event, EventType};

use crate::config::Settings;

/// Receives every render of the device links.
pub trait Presenter: Send + Sync {
    fn on_connections_changed(&self, links: &[DeviceLink], generation: u64);
}

/// Presenter that broadcasts renders as IPC events.
pub struct IpcPresenter {
    events: broadcast::Sender<Event>,
    settings: Arc<Settings>,
}

impl IpcPresenter {
    #[must_use]
    pub fn new(events: broadcast::Sender<Event>, settings: Arc<Settings>) -> Self {
        Self { events, settings }
    }
}

impl Presenter for IpcPresenter {
    fn on_connections_changed(&self, links: &[DeviceLink], generation: u64) {
        let data = ConnectionsChangedData {
            connections: links.to_vec(),
            show_connection_ids: self.settings.show_connection_ids(),
            generation,
        };
        let event = Event::new(EventType::ConnectionsChanged, &data);
        let receivers = self.events.send(event).unwrap_or(0);
        debug!(count = links.len(), generation, receivers, "Published device links");
    }
}

/// Broadcast an error event.
pub fn publish_error(events: &broadcast::Sender<Event>, code: i32, message: String, source: &str) {
    let data = ErrorData { code, message, source: source.to_string() };
    let _ = events.send(Event::new(EventType::Error, &data));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::BTreeMap;
    use whisper_core::Port;

    #[test]
    fn test_event_carries_display_setting() {
        let (tx, mut rx) = broadcast::channel(4);
        let mut config = Config::default();
        config.ui.show_connection_ids = true;
        let presenter = IpcPresenter::new(tx, Arc::new(Settings::new(config, None)));

        let port = |id: &str, tag: &str| Port {
            id: id.into(),
            resource_tag: tag.into(),
            alsa_tag: "alsa:pcm:0:front:0".into(),
            name: tag.into(),
            channels: BTreeMap::from([(id.to_string(), "FL".to_string())]),
        };
        let link = DeviceLink {
            input_device: port("52", "alsa_output.speakers"),
            output_device: port("61", "alsa_input.mic"),
            link_ids: vec!["51".into()],
        };
        presenter.on_connections_changed(&[link], 3);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, EventType::ConnectionsChanged);
        assert_eq!(event.data["show_connection_ids"], true);
        assert_eq!(event.data["generation"], 3);
        assert_eq!(event.data["connections"][0]["link_ids"][0], "51");
    }

    #[test]
    fn test_publish_without_clients_is_silent() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        publish_error(&tx, 502, "pw-link failed".into(), "poll");
    }
}
