//! `whisperctl` - command-line client for the Whisper daemon.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use whisper_core::{DeviceKind, DeviceLink, PortDirection};
use whisper_ipc::{ConnectionsChangedData, EventType, IpcClient, Method, socket_path};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print raw JSON instead of a summary
    #[clap(long, global = true)]
    json: bool,

    /// Daemon socket (defaults to $XDG_RUNTIME_DIR/whisper/daemon.sock)
    #[clap(long, global = true)]
    socket: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show active links between devices
    Connections,
    /// List devices in one direction
    Ports {
        #[clap(value_enum)]
        direction: Direction,
    },
    /// Link a microphone to a speaker (pw-link --linger INPUT OUTPUT)
    Connect { input: String, output: String },
    /// Remove links by id
    Disconnect {
        #[clap(required = true)]
        link_ids: Vec<String>,
    },
    /// Re-read the link graph now
    Refresh,
    /// Read or change a device's volume
    Volume {
        #[clap(subcommand)]
        action: VolumeCommands,
    },
    /// Show or change settings
    Settings {
        /// Show link ids next to each connection (true or false)
        #[clap(long)]
        show_ids: Option<bool>,
    },
    /// Show daemon diagnostics
    Diagnostics,
    /// Print events as they arrive
    Watch {
        /// Events to watch (all when omitted)
        #[clap(value_enum)]
        events: Vec<Watched>,
    },
    /// Stop the daemon
    Shutdown,
}

#[derive(Subcommand, Debug)]
enum VolumeCommands {
    /// Current volume, 0-100
    Get {
        #[clap(value_enum)]
        kind: Kind,
        name: String,
    },
    /// Set volume, 0-100
    Set {
        #[clap(value_enum)]
        kind: Kind,
        name: String,
        value: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Inputs,
    Outputs,
}

impl From<Direction> for PortDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Inputs => Self::Input,
            Direction::Outputs => Self::Output,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Sink,
    Source,
}

impl From<Kind> for DeviceKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Sink => Self::Sink,
            Kind::Source => Self::Source,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Watched {
    Connections,
    Volume,
    Settings,
    Errors,
}

impl From<Watched> for EventType {
    fn from(watched: Watched) -> Self {
        match watched {
            Watched::Connections => Self::ConnectionsChanged,
            Watched::Volume => Self::VolumeChanged,
            Watched::Settings => Self::SettingsChanged,
            Watched::Errors => Self::Error,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(socket = ?cli.socket, "Connecting to daemon");

    let connected = match &cli.socket {
        Some(socket) => IpcClient::connect(socket).await,
        None => IpcClient::connect_default().await,
    };
    let mut client = connected.with_context(|| {
        let socket = cli.socket.clone().unwrap_or_else(socket_path);
        format!("Is whisper-daemon running? Could not connect to {}", socket.display())
    })?;

    let method = match cli.command {
        Commands::Watch { events } => return watch(&mut client, events, cli.json).await,
        Commands::Connections => Method::GetConnections,
        Commands::Ports { direction } => Method::GetPorts { direction: direction.into() },
        Commands::Connect { input, output } => Method::Connect { input, output },
        Commands::Disconnect { link_ids } => Method::Disconnect { link_ids },
        Commands::Refresh => Method::Refresh,
        Commands::Volume { action } => match action {
            VolumeCommands::Get { kind, name } => {
                Method::GetVolume { kind: kind.into(), resource_name: name }
            }
            VolumeCommands::Set { kind, name, value } => {
                Method::SetVolume { kind: kind.into(), resource_name: name, value }
            }
        },
        Commands::Settings { show_ids: Some(enabled) } => Method::SetShowConnectionIds { enabled },
        Commands::Settings { show_ids: None } => Method::GetSettings,
        Commands::Diagnostics => Method::GetDiagnostics,
        Commands::Shutdown => Method::Shutdown,
    };

    let summarize = matches!(method, Method::GetConnections) && !cli.json;
    let value = client.request(method).await?;

    if summarize {
        let data: ConnectionsChangedData = serde_json::from_value(value)?;
        print!("{}", render_connections(&data.connections, data.show_connection_ids));
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    Ok(())
}

async fn watch(client: &mut IpcClient, events: Vec<Watched>, json: bool) -> Result<()> {
    let events = events.into_iter().map(EventType::from).collect();
    client.request(Method::Subscribe { events }).await?;

    loop {
        tokio::select! {
            event = client.events().recv() => {
                let Some(event) = event else {
                    anyhow::bail!("Daemon closed the connection");
                };
                if !json && event.event == EventType::ConnectionsChanged {
                    let data: ConnectionsChangedData = serde_json::from_value(event.data)?;
                    print!("{}", render_connections(&data.connections, data.show_connection_ids));
                } else {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// One line per device link: `microphone -> speakers`.
fn render_connections(links: &[DeviceLink], show_ids: bool) -> String {
    if links.is_empty() {
        return "No active connections\n".to_string();
    }

    let mut out = String::new();
    for link in links {
        let (from, to) = (display_name(&link.output_device), display_name(&link.input_device));
        let _ = write!(out, "{from} -> {to}");
        if show_ids {
            let _ = write!(out, "  [{}]", link.link_ids.join(", "));
        }
        out.push('\n');
    }
    out
}

fn display_name(port: &whisper_core::Port) -> &str {
    if port.name.is_empty() { &port.resource_tag } else { &port.name }
}
