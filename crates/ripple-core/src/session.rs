//! Transport boundary: what an endpoint needs from a live connection.
//!
//! Endpoints only see [`SessionHandle`]. Both the server (axum) and the client
//! (tokio-tungstenite) transports back it with a [`ChannelSession`]: sends and
//! closes are enqueued as [`Outbound`] commands on an unbounded channel and a
//! per-connection writer task turns them into frames. Neither call blocks the
//! caller, which may be a transport worker thread.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::TransportError;

/// WebSocket close status codes used by ripple (RFC 6455 §7.4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000, normal closure.
    Normal,
    /// 1001, endpoint going away.
    GoingAway,
    /// 1002, protocol error.
    ProtocolError,
    /// 1011, the server hit an unexpected condition.
    UnexpectedCondition,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Numeric wire value.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::UnexpectedCondition => 1011,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1011 => Self::UnexpectedCondition,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// Why a connection is being closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    /// Status code.
    pub code: CloseCode,
    /// Optional reason phrase.
    pub phrase: Option<String>,
}

impl CloseReason {
    /// Close with an explicit code and no phrase.
    pub fn new(code: CloseCode) -> Self {
        Self { code, phrase: None }
    }

    /// Normal closure, no phrase.
    pub fn normal() -> Self {
        Self::new(CloseCode::Normal)
    }

    /// Unexpected condition (1011), no phrase.
    pub fn unexpected_condition() -> Self {
        Self::new(CloseCode::UnexpectedCondition)
    }

    /// Attach a reason phrase.
    #[must_use]
    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = Some(phrase.into());
        self
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.phrase {
            Some(phrase) => write!(f, "{} ({phrase})", self.code.as_u16()),
            None => write!(f, "{}", self.code.as_u16()),
        }
    }
}

/// A command for a connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(String),
    /// Send a close frame and stop writing.
    Close(CloseReason),
}

/// A live connection as seen by an endpoint.
///
/// Implementations must be safe to share between the callback thread that
/// opened the session and any thread that later sends on or closes it.
pub trait SessionHandle: Send + Sync + std::fmt::Debug {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Whether the connection can still carry messages.
    fn is_open(&self) -> bool;

    /// Queue a text message for asynchronous delivery.
    fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Start the close handshake. Closing an already closed session is a no-op.
    fn close(&self, reason: CloseReason) -> Result<(), TransportError>;
}

/// [`SessionHandle`] backed by an unbounded channel to a writer task.
#[derive(Debug)]
pub struct ChannelSession {
    id: String,
    tx: mpsc::UnboundedSender<Outbound>,
    open: AtomicBool,
}

impl ChannelSession {
    /// Create a session and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Wrap an existing sender.
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: format!("session_{}", Uuid::now_v7()),
            tx,
            open: AtomicBool::new(true),
        }
    }

    /// Record that the connection went away without a local close.
    ///
    /// Returns `true` if the session was open until now.
    pub fn mark_closed(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }
}

impl SessionHandle for ChannelSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::SessionClosed {
                session_id: self.id.clone(),
            });
        }
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::ChannelClosed {
                session_id: self.id.clone(),
            })
    }

    fn close(&self, reason: CloseReason) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::AcqRel) {
            debug!(session_id = %self.id, "close requested on closed session");
            return Ok(());
        }
        self.tx
            .send(Outbound::Close(reason))
            .map_err(|_| TransportError::ChannelClosed {
                session_id: self.id.clone(),
            })
    }
}
