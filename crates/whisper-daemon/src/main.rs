//! Whisper Daemon - PipeWire device link manager.
//!
//! Keeps the list of links between physical audio devices in sync with
//! PipeWire, and serves it to clients over a Unix socket.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod debounce;
mod error;
mod poller;
mod presenter;
mod refresh;
mod server;
mod signals;
#[cfg(test)]
mod testing;

use whisper_ipc::{IpcServer, Response, socket_path};
use whisper_ipc::messages::Method;
use whisper_pipewire::{HostCommandRunner, PwError};

use crate::config::Settings;
use crate::error::run_blocking;
use crate::server::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_path) = config::load_config()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.daemon.log_level))
        .context("Invalid log level")?
        .add_directive("whisper_daemon=debug".parse()?)
        .add_directive("whisper_pipewire=debug".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Whisper daemon");
    info!(?config_path, "Configuration loaded");

    let runner = Arc::new(HostCommandRunner::new(config.tools.host_spawn));
    let settings = Arc::new(Settings::new(config.clone(), Some(config_path)));

    // Start IPC server
    let socket = socket_path();
    info!(?socket, "Starting IPC server");
    let (ipc_server, mut request_rx) =
        IpcServer::bind(&socket).await.context("Failed to start IPC server")?;

    // Get event sender for broadcasting events to IPC clients
    let event_tx = ipc_server.event_sender();

    let mut daemon = Daemon::new(runner, &config, Arc::clone(&settings), event_tx);

    // Check the tools once; without them the daemon still answers clients.
    let pw = daemon.pw().clone();
    let audio = daemon.audio().clone();
    let probe = run_blocking(move || {
        pw.check_installed()?;
        audio.probe()
    })
    .await;

    match probe {
        Ok(()) => log_startup_diagnostics(&daemon).await,
        Err(e) => {
            error!(error = %e, "PipeWire tools unavailable, running in degraded mode");
            daemon.mark_unavailable(e.to_string());
        }
    }

    let daemon = Arc::new(daemon);

    if daemon.is_available() {
        if let Err(e) = daemon.refresher().refresh(true).await {
            warn!(error = %e, "Initial refresh failed");
        }
        daemon.start_polling();
    }

    // Spawn IPC server task
    let ipc_handle = tokio::spawn(async move {
        ipc_server.run().await;
    });

    // Set up signal handling
    let shutdown = signals::setup_signal_handlers()?;

    info!("Daemon running. Press Ctrl+C to exit.");

    // Main event loop
    loop {
        tokio::select! {
            // Handle IPC requests
            Some((client_id, request, response_tx)) = request_rx.recv() => {
                debug!(client_id, request_id = request.id, "Handling IPC request");

                if request.method == Method::Shutdown {
                    let result = daemon.handle_request(request.method).await;
                    let _ = response_tx.send(Response { id: request.id, result }).await;
                    break;
                }

                // Requests may wait on the tools; never stall the loop.
                let daemon = Arc::clone(&daemon);
                tokio::spawn(async move {
                    let result = daemon.handle_request(request.method).await;
                    let _ = response_tx.send(Response { id: request.id, result }).await;
                });
            }

            // Handle shutdown signal
            () = shutdown.cancelled() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    daemon.shutdown();
    ipc_handle.abort();
    if let Err(e) = std::fs::remove_file(&socket) {
        debug!(error = %e, "Could not remove socket");
    }

    info!("Whisper daemon stopped");
    Ok(())
}

/// Dump what the tools see at startup.
async fn log_startup_diagnostics(daemon: &Daemon) {
    let pw = daemon.pw().clone();
    let listing = run_blocking(move || -> Result<_, PwError> {
        Ok((pw.server_info()?, pw.list_inputs()?, pw.list_outputs()?, pw.list_links()?))
    })
    .await;

    match listing {
        Ok((server, inputs, outputs, links)) => {
            debug!(%server, "PipeWire server info");
            for port in inputs.iter() {
                let (id, tag, alsa) = (&port.id, &port.resource_tag, port.is_alsa());
                debug!(%id, %tag, name = %port.name, alsa, "Input");
            }
            for port in outputs.iter() {
                let (id, tag, alsa) = (&port.id, &port.resource_tag, port.is_alsa());
                debug!(%id, %tag, name = %port.name, alsa, "Output");
            }
            debug!(links = links.connection_count(), "Links");
        }
        Err(e) => warn!(error = %e, "Startup diagnostics failed"),
    }
}
