//! Client endpoint errors.

use ripple_core::errors::TransportError;
use thiserror::Error;

/// Failures surfaced by [`ClientEndpoint`](crate::ClientEndpoint).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The target address could not be composed.
    #[error("invalid endpoint address: {0}")]
    Address(String),

    /// The transport rejected the connection.
    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    /// A session is already live on this endpoint.
    #[error("endpoint is already connected")]
    AlreadyConnected,

    /// No live session to send on.
    #[error("endpoint is not connected")]
    NotConnected,

    /// The write or close path failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint's runtime could not be started.
    #[error("failed to start client runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Handshake(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_is_transparent() {
        let err = ClientError::from(TransportError::SessionClosed {
            session_id: "session_1".into(),
        });
        assert_eq!(
            err.to_string(),
            TransportError::SessionClosed {
                session_id: "session_1".into()
            }
            .to_string()
        );
    }

    #[test]
    fn handshake_error_is_boxed() {
        let err = ClientError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, ClientError::Handshake(_)));
        assert!(err.to_string().starts_with("handshake failed"));
    }
}
