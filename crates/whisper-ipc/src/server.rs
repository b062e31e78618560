//! IPC server implementation.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::error::IpcResult;
use crate::events::{Event, EventType};
use crate::messages::{Method, Request, Response};

/// A request forwarded to the daemon, with the channel to answer on.
pub type IncomingRequest = (u64, Request, mpsc::Sender<Response>);

type Clients = Arc<RwLock<HashMap<u64, ClientHandle>>>;

/// IPC server that listens for client connections.
pub struct IpcServer {
    listener: UnixListener,
    clients: Clients,
    next_client_id: AtomicU64,
    event_tx: broadcast::Sender<Event>,
    request_tx: mpsc::Sender<IncomingRequest>,
}

/// `None` receives every event; an empty set receives nothing.
#[derive(Default)]
struct ClientHandle {
    subscriptions: Option<HashSet<EventType>>,
}

impl ClientHandle {
    fn wants(&self, event: EventType) -> bool {
        self.subscriptions.as_ref().is_none_or(|set| set.contains(&event))
    }

    fn subscribe(&mut self, events: &[EventType]) {
        if events.is_empty() {
            self.subscriptions = None;
        } else {
            self.subscriptions.get_or_insert_with(HashSet::new).extend(events.iter().copied());
        }
    }

    fn unsubscribe(&mut self, events: &[EventType]) {
        let set = self.subscriptions.get_or_insert_with(|| EventType::ALL.into_iter().collect());
        if events.is_empty() {
            set.clear();
        }
        for event in events {
            set.remove(event);
        }
    }

    fn subscribed(&self) -> Vec<EventType> {
        EventType::ALL.into_iter().filter(|event| self.wants(*event)).collect()
    }
}

impl IpcServer {
    /// Create a new IPC server bound to the given socket path.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be created.
    pub async fn bind(socket_path: &Path) -> IpcResult<(Self, mpsc::Receiver<IncomingRequest>)> {
        if let Some(parent) = socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // A stale socket from a crashed daemon blocks bind().
        if socket_path.exists() {
            tokio::fs::remove_file(socket_path).await?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(?socket_path, "IPC server listening");

        let (event_tx, _) = broadcast::channel(256);
        let (request_tx, request_rx) = mpsc::channel(64);

        Ok((
            Self {
                listener,
                clients: Arc::new(RwLock::new(HashMap::new())),
                next_client_id: AtomicU64::new(1),
                event_tx,
                request_tx,
            },
            request_rx,
        ))
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
                    info!(client_id, "Client connected");

                    let clients = Arc::clone(&self.clients);
                    let event_rx = self.event_tx.subscribe();
                    let request_tx = self.request_tx.clone();

                    tokio::spawn(async move {
                        clients.write().await.insert(client_id, ClientHandle::default());
                        let result =
                            Self::serve_client(client_id, stream, &clients, event_rx, request_tx)
                                .await;
                        clients.write().await.remove(&client_id);

                        match result {
                            Ok(()) => debug!(client_id, "Client handler exiting"),
                            Err(e) => error!(client_id, error = %e, "Client error"),
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                }
            }
        }
    }

    /// Broadcast an event to all subscribed clients.
    pub fn broadcast(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Get a clone of the event sender for broadcasting from other tasks.
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<Event> {
        self.event_tx.clone()
    }

    async fn serve_client(
        client_id: u64,
        stream: UnixStream,
        clients: &Clients,
        mut event_rx: broadcast::Receiver<Event>,
        request_tx: mpsc::Sender<IncomingRequest>,
    ) -> IpcResult<()> {
        let (reader, writer) = stream.into_split();
        let mut lines = FramedRead::new(reader, LinesCodec::new());
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        let (response_tx, mut response_rx) = mpsc::channel::<Response>(16);

        loop {
            tokio::select! {
                frame = lines.next() => {
                    let Some(frame) = frame else {
                        debug!(client_id, "Client disconnected");
                        return Ok(());
                    };
                    let request = match serde_json::from_str::<Request>(&frame?) {
                        Ok(request) => request,
                        Err(e) => {
                            warn!(client_id, error = %e, "Invalid request format");
                            continue;
                        }
                    };
                    debug!(client_id, request_id = request.id, "Received request");

                    let answered = Self::handle_subscription(client_id, &request, clients).await;
                    if let Some(response) = answered {
                        write_line(&mut sink, &response).await?;
                    } else if request_tx
                        .send((client_id, request, response_tx.clone()))
                        .await
                        .is_err()
                    {
                        warn!(client_id, "Daemon no longer accepts requests");
                        return Ok(());
                    }
                }

                Some(response) = response_rx.recv() => {
                    write_line(&mut sink, &response).await?;
                }

                event = event_rx.recv() => match event {
                    Ok(event) => {
                        let wanted = clients
                            .read()
                            .await
                            .get(&client_id)
                            .is_some_and(|handle| handle.wants(event.event));
                        if wanted {
                            write_line(&mut sink, &event).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(client_id, skipped, "Client fell behind on events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    /// Answer subscription requests in place; everything else goes to the daemon.
    async fn handle_subscription(
        client_id: u64,
        request: &Request,
        clients: &Clients,
    ) -> Option<Response> {
        let mut clients = clients.write().await;
        let handle = clients.get_mut(&client_id)?;

        match &request.method {
            Method::Subscribe { events } => {
                handle.subscribe(events);
                debug!(client_id, ?events, "Client subscribed");
            }
            Method::Unsubscribe { events } => {
                handle.unsubscribe(events);
                debug!(client_id, ?events, "Client unsubscribed");
            }
            _ => return None,
        }

        Some(Response::ok(request.id, json!({ "subscriptions": handle.subscribed() })))
    }
}

async fn write_line<T: Serialize>(
    sink: &mut FramedWrite<OwnedWriteHalf, LinesCodec>,
    message: &T,
) -> IpcResult<()> {
    sink.send(serde_json::to_string(message)?).await?;
    Ok(())
}
