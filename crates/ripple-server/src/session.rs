//! Endpoint session: drives one [`ServerEndpoint`] from upgrade through
//! disconnect.
//!
//! 1. Opens the endpoint with a [`ChannelSession`] whose writer task owns the
//!    socket's sink
//! 2. Feeds every text frame to `on_message`, and every failure (validation,
//!    malformed frame, read error) to `on_error`
//! 3. Stops reading once the session is closed locally, the peer closes, or
//!    shutdown is requested
//! 4. Calls `on_close` and lets the writer flush its last frame

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::gauge;
use ripple_core::errors::{EndpointError, TransportError};
use ripple_core::session::{ChannelSession, CloseCode, CloseReason, Outbound, SessionHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::endpoint::ServerEndpoint;
use crate::metrics::WS_CONNECTIONS_ACTIVE;

/// Run `endpoint` over `ws` until the connection ends.
#[instrument(skip_all, fields(session_id))]
pub async fn run_endpoint_session(
    ws: WebSocket,
    endpoint: ServerEndpoint,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();
    let (session, outbound_rx) = ChannelSession::channel();
    let session = Arc::new(session);
    let _ = tracing::Span::current().record("session_id", session.id());

    if let Err(e) = endpoint.on_open(session.clone()) {
        warn!(error = %e, "refusing to open endpoint");
        return;
    }
    info!("endpoint opened");
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let writer = tokio::spawn(write_outbound(ws_tx, outbound_rx));

    let mut close_reason = None;
    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = shutdown.cancelled() => {
                info!("server shutting down, closing endpoint");
                if let Err(e) = session.close(CloseReason::new(CloseCode::GoingAway)) {
                    warn!(error = %e, "failed to close endpoint on shutdown");
                }
                break;
            }
        };

        let outcome = match frame {
            None => break,
            Some(Ok(Message::Text(text))) => endpoint.on_message(text.as_str()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => endpoint.on_message(text),
                Err(_) => Err(EndpointError::Protocol(format!(
                    "binary frame of {} bytes is not UTF-8",
                    data.len()
                ))),
            },
            Some(Ok(Message::Close(frame))) => {
                close_reason = frame.map(|f| CloseReason {
                    code: CloseCode::from(f.code),
                    phrase: (!f.reason.is_empty()).then(|| f.reason.to_string()),
                });
                debug!("peer sent close frame");
                break;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(()),
            Some(Err(e)) => Err(TransportError::Io(std::io::Error::other(e)).into()),
        };

        if let Err(err) = outcome {
            if let Err(fatal) = endpoint.on_error(&err) {
                error!(error = %fatal, "failed to report error to peer");
                break;
            }
        }

        if !session.is_open() {
            break;
        }
    }

    let _ = session.mark_closed();
    endpoint.on_close(close_reason.as_ref());
    info!(reason = ?close_reason, "endpoint closed");
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);

    // Dropping the last sender lets the writer drain and exit.
    drop(endpoint);
    drop(session);
    let _ = writer.await;
}

/// Writer task: turn [`Outbound`] commands into frames until a close is sent,
/// the socket fails, or every sender is gone.
async fn write_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Outbound::Text(text) => {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    debug!(error = %e, "text frame not delivered");
                    break;
                }
            }
            Outbound::Close(reason) => {
                let frame = CloseFrame {
                    code: reason.code.as_u16(),
                    reason: reason.phrase.unwrap_or_default().into(),
                };
                if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "close frame not delivered");
                }
                break;
            }
        }
    }
    // Flushes a pending close reply when the peer closed first.
    let _ = ws_tx.close().await;
}
