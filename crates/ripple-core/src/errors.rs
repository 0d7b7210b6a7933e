//! Error taxonomy for ripple endpoints.
//!
//! - [`BadMessage`]: the one expected failure, a message that violates the
//!   protocol. The server answers it with text and keeps the connection open.
//! - [`TransportError`]: sending or closing failed at the transport boundary.
//! - [`EndpointError`]: anything a message handler can produce. Every variant
//!   other than [`EndpointError::BadMessage`] is treated as unexpected.

use thiserror::Error;

/// A message that does not fit the communication protocol.
///
/// Carries the exact rejected text.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("bad message: {message:?}")]
pub struct BadMessage {
    message: String,
}

impl BadMessage {
    /// Wrap a rejected message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The rejected message, untouched.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consume the error and return the rejected message.
    pub fn into_message(self) -> String {
        self.message
    }
}

/// Failures at the transport boundary while sending or closing.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The session was already closed.
    #[error("session {session_id} is closed")]
    SessionClosed {
        /// Session the operation targeted.
        session_id: String,
    },
    /// The writer task for the session is gone.
    #[error("writer for session {session_id} has shut down")]
    ChannelClosed {
        /// Session the operation targeted.
        session_id: String,
    },
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a message handler may fail with.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The expected, recoverable kind.
    #[error(transparent)]
    BadMessage(#[from] BadMessage),
    /// Sending or closing failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The peer sent a frame the endpoint cannot interpret.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// Any other failure while handling a message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EndpointError {
    /// Whether the error is the expected domain kind.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::BadMessage(_))
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadMessage(_) => "bad_message",
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::Internal(_) => "internal",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
