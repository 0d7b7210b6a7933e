//! Blocking client endpoint.
//!
//! Every public method is synchronous. The socket itself is driven by a reader
//! and a writer task on the endpoint's own runtime, so these methods must not
//! be called from inside another tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use ripple_core::lifecycle::{Phase, SessionSlot};
use ripple_core::session::{ChannelSession, CloseCode, CloseReason, Outbound, SessionHandle};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::address::server_endpoint_url;
use crate::errors::ClientError;
use crate::queue::MessageQueue;

/// How long [`ClientEndpoint::receive_message`] waits by default.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on waiting for the close handshake in
/// [`ClientEndpoint::disconnect`].
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type ConnectionSlot = SessionSlot<Arc<ClientConnection>>;

/// One live connection: the session handle plus the task reading from it.
#[derive(Debug)]
struct ClientConnection {
    session: Arc<ChannelSession>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Client side of one WebSocket connection at a time.
///
/// Received text is queued in arrival order and handed out by
/// [`receive_message`](Self::receive_message). The queue outlives individual
/// connections, so replies survive a reconnect.
#[derive(Debug)]
pub struct ClientEndpoint {
    runtime: Runtime,
    queue: Arc<MessageQueue>,
    slot: Arc<ConnectionSlot>,
    receive_timeout: Duration,
    close_timeout: Duration,
}

impl ClientEndpoint {
    /// Build an endpoint and start its runtime.
    pub fn new() -> Result<Self, ClientError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("ripple-client")
            .enable_all()
            .build()
            .map_err(ClientError::Runtime)?;

        Ok(Self {
            runtime,
            queue: Arc::new(MessageQueue::new()),
            slot: Arc::new(SessionSlot::new()),
            receive_timeout: RECEIVE_TIMEOUT,
            close_timeout: CLOSE_TIMEOUT,
        })
    }

    /// Override how long `receive_message` waits.
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Override how long `disconnect` waits for the close handshake.
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Connect to the endpoint at `path` on `base` and block until the
    /// handshake completes.
    pub fn connect(&self, base: &str, path: &str) -> Result<(), ClientError> {
        let url = server_endpoint_url(base, path)?;
        if self.is_open() {
            return Err(ClientError::AlreadyConnected);
        }
        // Forget a connection whose reader has not finished closing it.
        let _ = self.slot.close();

        debug!(%url, "connecting");
        let (ws, _response) = self.runtime.block_on(connect_async(url.as_str()))?;
        let (sink, stream) = ws.split();

        let (session, outbound_rx) = ChannelSession::channel();
        let session = Arc::new(session);
        let _writer = self.runtime.spawn(write_outbound(sink, outbound_rx));

        // Open the slot before reading, so an immediate close finds it.
        let connection = Arc::new(ClientConnection {
            session: Arc::clone(&session),
            reader: Mutex::new(None),
        });
        self.on_open(Arc::clone(&connection))?;

        let reader = self.runtime.spawn(read_inbound(
            stream,
            session,
            Arc::clone(&self.queue),
            Arc::clone(&self.slot),
        ));
        *connection.reader.lock() = Some(reader);
        info!(%url, "connected");
        Ok(())
    }

    /// Close the live session normally and wait for the close handshake.
    ///
    /// A no-op, apart from a warning, when nothing is open.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        let Some(connection) = self.live_connection() else {
            warn!(phase = %self.slot.phase(), "disconnect requested but endpoint is not open");
            return Ok(());
        };

        connection.session.close(CloseReason::normal())?;

        let reader = connection.reader.lock().take();
        if let Some(mut reader) = reader {
            let finished = self
                .runtime
                .block_on(async { tokio::time::timeout(self.close_timeout, &mut reader).await });
            if finished.is_err() {
                warn!(timeout = ?self.close_timeout, "close handshake did not finish in time");
                reader.abort();
            }
        }

        let _ = self
            .slot
            .close_if(|live| Arc::ptr_eq(live, &connection));
        Ok(())
    }

    /// Whether a session exists and is still open.
    pub fn is_open(&self) -> bool {
        self.live_connection().is_some()
    }

    /// Queue `text` for transmission without waiting for it to be written.
    pub fn send_async(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let connection = self.live_connection().ok_or(ClientError::NotConnected)?;
        connection.session.send_text(text.into())?;
        Ok(())
    }

    /// Next received message, or `None` after the receive timeout.
    pub fn receive_message(&self) -> Option<String> {
        self.queue.pop(self.receive_timeout)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.slot.phase()
    }

    /// Id of the current session, if any.
    pub fn session_id(&self) -> Option<String> {
        self.slot
            .session()
            .map(|connection| connection.session.id().to_owned())
    }

    fn on_open(&self, connection: Arc<ClientConnection>) -> Result<(), ClientError> {
        trace!(
            method = "on_open",
            session_id = connection.session.id(),
            "endpoint callback"
        );
        self.slot
            .open(connection)
            .map_err(|_| ClientError::AlreadyConnected)
    }

    fn live_connection(&self) -> Option<Arc<ClientConnection>> {
        self.slot
            .session()
            .filter(|connection| connection.session.is_open())
    }
}

impl Drop for ClientEndpoint {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// Reader task: queue every text payload until the connection ends.
async fn read_inbound(
    mut stream: SplitStream<WsStream>,
    session: Arc<ChannelSession>,
    queue: Arc<MessageQueue>,
    slot: Arc<ConnectionSlot>,
) {
    let mut close_reason = None;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => on_message(&queue, text.as_str()),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => on_message(&queue, text),
                Err(_) => debug!(len = data.len(), "ignoring non-UTF-8 binary frame"),
            },
            // Keep polling so the close reply gets flushed.
            Ok(Message::Close(frame)) => {
                close_reason = frame.map(|f| CloseReason {
                    code: CloseCode::from(u16::from(f.code)),
                    phrase: (!f.reason.is_empty()).then(|| f.reason.to_string()),
                });
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "read failed");
                break;
            }
        }
    }
    on_close(&slot, &session, close_reason.as_ref());
}

fn on_message(queue: &MessageQueue, text: &str) {
    trace!(method = "on_message", data = text, "endpoint callback");
    queue.push(text.to_owned());
}

/// Close `session` and, if it is still the live one, the endpoint's slot.
fn on_close(slot: &ConnectionSlot, session: &ChannelSession, reason: Option<&CloseReason>) {
    trace!(method = "on_close", reason = ?reason, "endpoint callback");
    let _ = session.mark_closed();
    let _ = slot.close_if(|live| live.session.id() == session.id());
    info!(session_id = session.id(), reason = ?reason, "connection closed");
}

/// Writer task: turn [`Outbound`] commands into frames.
async fn write_outbound(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(error = %e, "text frame not delivered");
                    break;
                }
            }
            Outbound::Close(reason) => {
                let frame = CloseFrame {
                    code: reason.code.as_u16().into(),
                    reason: reason.phrase.unwrap_or_default().into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "close frame not delivered");
                }
                break;
            }
        }
    }
}
