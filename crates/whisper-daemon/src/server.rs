//! Request handling for the IPC server.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use whisper_core::DeviceKind;
use whisper_ipc::messages::{ErrorInfo, Method};
use whisper_ipc::{ConnectionsChangedData, Event, EventType, SettingsChangedData, VolumeChangedData};
use whisper_pipewire::volume::from_percent;
use whisper_pipewire::{AudioControl, CommandRunner, LinkController, PwError, PwLink};

use crate::config::{Config, Settings};
use crate::debounce::Debouncer;
use crate::error::{DaemonError, DaemonResult, run_blocking};
use crate::poller::PollLoop;
use crate::presenter::{IpcPresenter, publish_error};
use crate::refresh::{RefreshOutcome, RefreshService};

/// Everything a request handler can touch.
pub struct Daemon {
    pw: PwLink,
    controller: LinkController,
    audio: AudioControl,
    refresh: RefreshService,
    settings: Arc<Settings>,
    volumes: Debouncer<(DeviceKind, String)>,
    poll: PollLoop,
    events: broadcast::Sender<Event>,
    /// Why the tools are unusable, if they are
    unavailable: Option<String>,
}

impl Daemon {
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: &Config,
        settings: Arc<Settings>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        let pw = PwLink::new(Arc::clone(&runner), config.tools.paths());
        let presenter = Arc::new(IpcPresenter::new(events.clone(), Arc::clone(&settings)));
        Self {
            controller: LinkController::new(pw.clone()),
            audio: AudioControl::new(runner, config.tools.pactl.clone()),
            refresh: RefreshService::new(pw.clone(), whisper_core::RenderedState::new(), presenter),
            pw,
            settings,
            volumes: Debouncer::new(config.volume.debounce()),
            poll: PollLoop::new(config.poll.interval()),
            events,
            unavailable: None,
        }
    }

    #[must_use]
    pub fn pw(&self) -> &PwLink {
        &self.pw
    }

    #[must_use]
    pub fn audio(&self) -> &AudioControl {
        &self.audio
    }

    #[must_use]
    pub fn refresher(&self) -> &RefreshService {
        &self.refresh
    }

    /// Enter degraded mode: requests that need the tools are refused.
    pub fn mark_unavailable(&mut self, reason: String) {
        self.unavailable = Some(reason);
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }

    /// Start background polling.
    pub fn start_polling(&self) {
        let refresh = self.refresh.clone();
        let events = self.events.clone();
        self.poll.start(move || {
            let refresh = refresh.clone();
            let events = events.clone();
            async move {
                if let Err(e) = refresh.refresh(false).await {
                    publish_error(&events, ErrorInfo::from(&e).code, e.to_string(), "poll");
                }
            }
        });
    }

    /// Stop polling and drop pending volume writes.
    pub fn shutdown(&self) {
        self.poll.stop();
        self.volumes.cancel_all();
    }

    fn ensure_available(&self) -> DaemonResult<()> {
        match &self.unavailable {
            Some(reason) => Err(DaemonError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Refresh after a user action; the action's own result wins.
    async fn forced_refresh(&self) {
        if self.is_available() {
            let _ = self.refresh.refresh(true).await;
        }
    }

    /// Handle an IPC request and return a response value.
    pub async fn handle_request(&self, method: Method) -> Result<Value, ErrorInfo> {
        self.dispatch(method).await.map_err(|e| {
            debug!(error = %e, "Request failed");
            ErrorInfo::from(&e)
        })
    }

    async fn dispatch(&self, method: Method) -> DaemonResult<Value> {
        match method {
            Method::GetConnections => {
                let snapshot = self.refresh.state().snapshot();
                Ok(to_value(&ConnectionsChangedData {
                    connections: snapshot.rendered.links.clone(),
                    show_connection_ids: self.settings.show_connection_ids(),
                    generation: snapshot.generation,
                }))
            }

            Method::GetPorts { direction } => {
                self.ensure_available()?;
                let pw = self.pw.clone();
                let ports = run_blocking(move || pw.list_ports(direction)).await?;
                Ok(to_value(&ports.into_vec()))
            }

            Method::GetVolume { kind, resource_name } => {
                self.ensure_available()?;
                let audio = self.audio.clone();
                let name = resource_name.clone();
                let volume = run_blocking(move || audio.volume(kind, &name)).await?;
                Ok(to_value(&VolumeChangedData { kind, resource_name, volume }))
            }

            Method::GetSettings => Ok(self.settings_value()),

            Method::GetDiagnostics => Ok(self.diagnostics()),

            Method::Connect { input, output } => {
                self.ensure_available()?;
                info!(%input, %output, "Connect requested");
                let controller = self.controller.clone();
                let result = run_blocking(move || controller.connect(&input, &output)).await;
                self.forced_refresh().await;
                result?;
                Ok(json!({ "success": true }))
            }

            Method::Disconnect { link_ids } => {
                self.ensure_available()?;
                info!(?link_ids, "Disconnect requested");
                let controller = self.controller.clone();
                let result = run_blocking(move || controller.disconnect(&link_ids)).await;
                self.forced_refresh().await;
                Ok(json!({ "removed": result? }))
            }

            Method::Refresh => {
                self.ensure_available()?;
                match self.refresh.refresh(true).await? {
                    RefreshOutcome::Rendered(count) => Ok(json!({ "rendered": count })),
                    RefreshOutcome::Unchanged => Ok(json!({ "rendered": null })),
                }
            }

            Method::SetVolume { kind, resource_name, value } => {
                let volume = from_percent(value);
                if !(0.0..=1.0).contains(&volume) {
                    return Err(PwError::from(whisper_core::Error::InvalidVolume(volume)).into());
                }
                self.ensure_available()?;
                self.schedule_volume(kind, resource_name, volume);
                Ok(json!({ "scheduled": true, "volume": volume }))
            }

            Method::SetShowConnectionIds { enabled } => {
                self.settings.set_show_connection_ids(enabled).map_err(DaemonError::Settings)?;
                info!(enabled, "Show connection ids changed");
                let _ = self.events.send(Event::new(
                    EventType::SettingsChanged,
                    &SettingsChangedData { show_connection_ids: enabled },
                ));
                self.forced_refresh().await;
                Ok(self.settings_value())
            }

            Method::Subscribe { .. } | Method::Unsubscribe { .. } => Err(DaemonError::BadRequest(
                "subscriptions are handled by the IPC server".to_string(),
            )),

            Method::Shutdown => {
                info!("Shutdown requested via IPC");
                // The main loop will handle this
                Ok(json!({ "success": true }))
            }
        }
    }

    fn schedule_volume(&self, kind: DeviceKind, resource_name: String, volume: f32) {
        let audio = self.audio.clone();
        let events = self.events.clone();
        let key = (kind, resource_name.clone());

        self.volumes.schedule(key, move || async move {
            let name = resource_name.clone();
            match run_blocking(move || audio.set_volume(kind, &name, volume)).await {
                Ok(()) => {
                    info!(?kind, %resource_name, volume, "Volume applied");
                    let data = VolumeChangedData { kind, resource_name, volume };
                    let _ = events.send(Event::new(EventType::VolumeChanged, &data));
                }
                Err(e) => {
                    warn!(?kind, %resource_name, error = %e, "Volume write failed");
                    publish_error(&events, ErrorInfo::from(&e).code, e.to_string(), "volume");
                }
            }
        });
    }

    fn settings_value(&self) -> Value {
        json!({ "show_connection_ids": self.settings.show_connection_ids() })
    }

    fn diagnostics(&self) -> Value {
        let snapshot = self.refresh.state().snapshot();
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "available": self.is_available(),
            "unavailable_reason": self.unavailable,
            "poll": self.poll.state(),
            "poll_interval_secs": self.poll.interval().as_secs(),
            "generation": snapshot.generation,
            "rendered_links": snapshot.rendered.links.len(),
            "observed_link_ids": snapshot.observed.len(),
            "pending_volume_writes": self.volumes.pending(),
        })
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use std::time::Duration;
    use whisper_core::PortDirection;

    const LINGER_MIC_TO_SPEAKERS: &str =
        "pw-link --linger alsa_input.mic:capture_FL alsa_output.speakers:playback_FL";

    fn daemon(runner: &Arc<ScriptedRunner>) -> (Daemon, broadcast::Receiver<Event>) {
        let (tx, rx) = broadcast::channel(32);
        let mut config = Config::default();
        config.volume.debounce_ms = 20;
        let settings = Arc::new(Settings::new(config.clone(), None));
        (Daemon::new(Arc::clone(runner) as _, &config, settings, tx), rx)
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>, wanted: EventType) -> Event {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.unwrap();
                if event.event == wanted {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_connections_reflect_last_render() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        let (daemon, _rx) = daemon(&runner);

        let empty = daemon.handle_request(Method::GetConnections).await.unwrap();
        assert_eq!(empty["connections"], json!([]));

        daemon.handle_request(Method::Refresh).await.unwrap();
        let value = daemon.handle_request(Method::GetConnections).await.unwrap();

        assert_eq!(value["generation"], 1);
        assert_eq!(value["connections"][0]["link_ids"], json!(["104", "105"]));
        assert_eq!(value["show_connection_ids"], false);
    }

    #[tokio::test]
    async fn test_connect_passes_tags_in_order_and_refreshes() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        runner.reply(LINGER_MIC_TO_SPEAKERS, "");
        let (daemon, mut rx) = daemon(&runner);

        daemon
            .handle_request(Method::Connect {
                input: "alsa_input.mic:capture_FL".into(),
                output: "alsa_output.speakers:playback_FL".into(),
            })
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0], LINGER_MIC_TO_SPEAKERS);
        assert_eq!(calls[1], "pw-link --links --id");
        next_event(&mut rx, EventType::ConnectionsChanged).await;
    }

    #[tokio::test]
    async fn test_failed_connect_still_refreshes() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        runner.fail("pw-link --linger a b", "failed to link ports: No such file or directory");
        let (daemon, _rx) = daemon(&runner);

        let method = Method::Connect { input: "a".into(), output: "b".into() };
        let err = daemon.handle_request(method).await.unwrap_err();

        assert_eq!(err.code, ErrorInfo::TOOL_FAILED);
        assert!(err.message.contains("No such file"));
        assert_eq!(runner.count("pw-link --links --id"), 1);
    }

    #[tokio::test]
    async fn test_disconnect_reports_failing_id() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        runner.reply("pw-link --disconnect 5", "");
        runner.fail("pw-link --disconnect 7", "link not found");
        let (daemon, _rx) = daemon(&runner);

        let err = daemon
            .handle_request(Method::Disconnect { link_ids: vec!["5".into(), "7".into()] })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorInfo::TOOL_FAILED);
        assert!(err.message.contains('7'));
        assert_eq!(runner.count("pw-link --disconnect 5"), 1);
        assert_eq!(runner.count("pw-link --links --id"), 1);
    }

    #[tokio::test]
    async fn test_disconnect_counts_removed_links() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        runner.reply("pw-link --disconnect 104", "");
        runner.reply("pw-link --disconnect 105", "");
        let (daemon, _rx) = daemon(&runner);

        let value = daemon
            .handle_request(Method::Disconnect { link_ids: vec!["104".into(), "105".into()] })
            .await
            .unwrap();

        assert_eq!(value, json!({ "removed": 2 }));
    }

    #[tokio::test]
    async fn test_degraded_mode_refuses_tool_requests() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        let (mut daemon, _rx) = daemon(&runner);
        daemon.mark_unavailable("pw-link not found".into());

        let method = Method::GetPorts { direction: PortDirection::Input };
        let err = daemon.handle_request(method).await.unwrap_err();
        assert_eq!(err.code, ErrorInfo::UNAVAILABLE);

        assert!(daemon.handle_request(Method::GetConnections).await.is_ok());
        let diagnostics = daemon.handle_request(Method::GetDiagnostics).await.unwrap();
        assert_eq!(diagnostics["available"], false);
        assert_eq!(diagnostics["poll"], "stopped");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_ports_lists_devices() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        let (daemon, _rx) = daemon(&runner);

        let method = Method::GetPorts { direction: PortDirection::Output };
        let value = daemon.handle_request(method).await.unwrap();

        assert_eq!(value[0]["resource_tag"], "alsa_input.usb-Blue_Yeti-00.analog-stereo");
        assert_eq!(value[0]["name"], "Yeti Stereo Microphone");
    }

    #[tokio::test]
    async fn test_volume_out_of_range_is_rejected() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        let (daemon, _rx) = daemon(&runner);

        let method = Method::SetVolume {
            kind: DeviceKind::Sink,
            resource_name: "speakers".into(),
            value: 150.0,
        };
        let err = daemon.handle_request(method).await.unwrap_err();

        assert_eq!(err.code, ErrorInfo::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_volume_write_is_debounced_and_announced() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        runner.reply("pactl set-source-volume mic 42%", "");
        let (daemon, mut rx) = daemon(&runner);

        for value in [10.0, 25.0, 42.0] {
            let method =
                Method::SetVolume { kind: DeviceKind::Source, resource_name: "mic".into(), value };
            daemon.handle_request(method).await.unwrap();
        }

        let event = next_event(&mut rx, EventType::VolumeChanged).await;
        assert_eq!(event.data["resource_name"], "mic");
        assert_eq!(runner.count("pactl set-source-volume mic 42%"), 1);
        let pactl: Vec<_> = runner.calls().into_iter().filter(|c| c.starts_with("pactl")).collect();
        assert_eq!(pactl, vec!["pactl set-source-volume mic 42%"]);
    }

    #[tokio::test]
    async fn test_get_volume_reads_flat_level() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        runner.reply(
            "pactl get-sink-volume speakers",
            "Volume: front-left: 39322 /  60% / -13.31 dB,   \
             front-right: 26214 /  40% / -23.88 dB\n",
        );
        let (daemon, _rx) = daemon(&runner);

        let method = Method::GetVolume { kind: DeviceKind::Sink, resource_name: "speakers".into() };
        let value = daemon.handle_request(method).await.unwrap();

        let volume = value["volume"].as_f64().unwrap();
        assert!((volume - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_toggle_ids_rerenders_with_flag() {
        let runner = Arc::new(ScriptedRunner::with_graph());
        let (daemon, mut rx) = daemon(&runner);

        let method = Method::SetShowConnectionIds { enabled: true };
        let value = daemon.handle_request(method).await.unwrap();
        assert_eq!(value, json!({ "show_connection_ids": true }));

        let settings = next_event(&mut rx, EventType::SettingsChanged).await;
        assert_eq!(settings.data["show_connection_ids"], true);
        let connections = next_event(&mut rx, EventType::ConnectionsChanged).await;
        assert_eq!(connections.data["show_connection_ids"], true);
    }
}
