//! WebSocket client connection to the Coder CLI.
//!
//! One connection at a time. Inbound frames are decoded and forwarded to the
//! single subscriber; outbound messages go through a writer task so `send`
//! never blocks the caller.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use super::protocol::{decode_server_message, ClientMessage, ServerMessage};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SUBSCRIBER_BUFFER: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Snapshot of the transport's connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub port: Option<u16>,
}

/// Slot holding the current inbound subscriber, shared with reader tasks.
type SubscriberSlot = Arc<Mutex<Option<mpsc::Sender<ServerMessage>>>>;

/// Live socket with its reader and writer tasks.
struct Link {
    alive: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<WsMessage>,
    reader: JoinHandle<()>,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// The writer task sends the close frame and exits on its own.
    fn close(self) {
        self.alive.store(false, Ordering::Release);
        let _ = self.outbound.send(WsMessage::Close(None));
        self.reader.abort();
    }
}

/// Owns the connection to the CLI on a local port.
pub struct Transport {
    subscriber: SubscriberSlot,
    connection: Arc<watch::Sender<bool>>,
    link: Option<Link>,
    port: Option<u16>,
    connect_timeout: Duration,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            subscriber: Arc::default(),
            connection: Arc::new(watch::Sender::new(false)),
            link: None,
            port: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Register the receiver for inbound messages, replacing any previous one.
    /// Messages that arrived before this call are not replayed.
    pub fn subscribe(&self) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        *self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Follow the connection flag, including a close initiated by the CLI.
    pub fn watch_connection(&self) -> watch::Receiver<bool> {
        self.connection.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(Link::is_alive)
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState {
            connected: self.is_connected(),
            port: self.port,
        }
    }

    /// Try to connect to `ws://localhost:<port>`. Returns whether it succeeded.
    pub async fn connect(&mut self, port: u16) -> bool {
        self.disconnect();
        self.port = Some(port);

        let url = format!("ws://localhost:{port}");
        tracing::info!("Connecting to {url}");

        let socket = match timeout(self.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                tracing::warn!("Failed to connect to {url}: {e}");
                return false;
            }
            Err(_) => {
                tracing::warn!(
                    "Connecting to {url} timed out after {:?}",
                    self.connect_timeout
                );
                return false;
            }
        };

        let (sink, stream) = socket.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            stream,
            Arc::clone(&alive),
            Arc::clone(&self.subscriber),
            Arc::clone(&self.connection),
        ));
        tokio::spawn(write_loop(
            sink,
            outbound_rx,
            Arc::clone(&alive),
            Arc::clone(&self.connection),
        ));
        self.link = Some(Link {
            alive,
            outbound,
            reader,
        });
        self.connection.send_replace(true);

        tracing::info!("Connected to {url}");
        true
    }

    /// Close the connection. Safe to call when not connected.
    pub fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
            self.connection.send_replace(false);
            tracing::info!("Disconnected from Coder CLI");
        }
    }

    /// Queue a message for the CLI. Dropped with a warning when not connected.
    pub fn send(&self, msg: &ClientMessage) {
        let Some(link) = self.link.as_ref().filter(|link| link.is_alive()) else {
            tracing::warn!("Cannot send message: not connected to Coder CLI");
            return;
        };
        let json = match serde_json::to_string(msg) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize message: {e}");
                return;
            }
        };
        if link.outbound.send(WsMessage::Text(json.into())).is_err() {
            tracing::warn!("Cannot send message: connection writer has stopped");
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn read_loop(
    mut stream: SplitStream<Socket>,
    alive: Arc<AtomicBool>,
    subscriber: SubscriberSlot,
    connection: Arc<watch::Sender<bool>>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => forward_frame(&subscriber, text.as_str()).await,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("WebSocket error: {e}");
                break;
            }
        }
    }
    // A link closed locally has already reported itself.
    if alive.swap(false, Ordering::AcqRel) {
        connection.send_replace(false);
        tracing::info!("Connection to Coder CLI closed");
    }
}

async fn forward_frame(subscriber: &SubscriberSlot, text: &str) {
    let msg = match decode_server_message(text) {
        Ok(Some(msg)) => msg,
        Ok(None) => {
            tracing::debug!("Ignoring message with unknown type: {text}");
            return;
        }
        Err(e) => {
            tracing::warn!("Invalid message from CLI: {e}");
            return;
        }
    };
    let current = subscriber
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let Some(subscriber) = current else {
        tracing::debug!("No subscriber for inbound message");
        return;
    };
    if subscriber.send(msg).await.is_err() {
        tracing::debug!("Inbound subscriber dropped");
    }
}

async fn write_loop(
    mut sink: SplitSink<Socket, WsMessage>,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    alive: Arc<AtomicBool>,
    connection: Arc<watch::Sender<bool>>,
) {
    while let Some(frame) = outbound.recv().await {
        let closing = matches!(frame, WsMessage::Close(_));
        if let Err(e) = sink.send(frame).await {
            tracing::warn!("Failed to send to Coder CLI: {e}");
            if alive.swap(false, Ordering::AcqRel) {
                connection.send_replace(false);
            }
            break;
        }
        if closing {
            break;
        }
    }
}
