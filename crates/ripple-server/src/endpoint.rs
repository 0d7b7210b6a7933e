//! The server endpoint: one instance per connection.
//!
//! The transport drives it through `on_open`, `on_message`, `on_error` and
//! `on_close`. Validation failures come back from [`ServerEndpoint::on_message`]
//! as [`EndpointError::BadMessage`] and are answered in exactly one place,
//! [`ServerEndpoint::on_error`]:
//!
//! | error                         | reaction                                  |
//! |-------------------------------|-------------------------------------------|
//! | any, session not open         | log, nothing to notify                    |
//! | `BadMessage(text)`            | reply `"Unacceptable message: " + text`   |
//! | anything else                 | log at warn, close with 1011              |

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use ripple_core::errors::{BadMessage, EndpointError, TransportError};
use ripple_core::lifecycle::{LifecycleError, Phase, SessionSlot};
use ripple_core::session::{CloseReason, SessionHandle};
use tracing::{debug, info, trace, warn};

use crate::metrics::{
    WS_ENDPOINTS_CLOSED_TOTAL, WS_ENDPOINTS_OPENED_TOTAL, WS_MESSAGES_REJECTED_TOTAL,
    WS_UNEXPECTED_ERRORS_TOTAL,
};

/// Path the server endpoint is mounted at.
pub const PATH: &str = "/test";

/// The one message the endpoint refuses.
pub const BAD_MESSAGE: &str = "BAD MESSAGE";

/// Prefix of the reply sent for a refused message.
pub const UNACCEPTABLE_PREFIX: &str = "Unacceptable message: ";

/// Cumulative count of endpoint opens.
///
/// Only ever incremented. It counts opens over the life of the process, not
/// connections that are open right now.
#[derive(Debug)]
pub struct OpenCounter {
    opened: AtomicU64,
}

impl OpenCounter {
    /// A counter at zero.
    pub const fn new() -> Self {
        Self {
            opened: AtomicU64::new(0),
        }
    }

    /// Record one open.
    pub fn increment(&self) {
        let _ = self.opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Opens recorded so far.
    pub fn get(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }
}

impl Default for OpenCounter {
    fn default() -> Self {
        Self::new()
    }
}

static ENDPOINTS_OPENED: OpenCounter = OpenCounter::new();

/// Number of server endpoints opened since the process started.
pub fn count_endpoints_opened() -> u64 {
    ENDPOINTS_OPENED.get()
}

/// Apply the endpoint's single validation rule.
pub fn validate(data: &str) -> Result<(), BadMessage> {
    if data == BAD_MESSAGE {
        return Err(BadMessage::new(data));
    }
    Ok(())
}

/// Text sent back to the peer for a refused message.
pub fn unacceptable_reply(bad: &BadMessage) -> String {
    format!("{UNACCEPTABLE_PREFIX}{}", bad.message())
}

/// Server side of one WebSocket connection.
#[derive(Debug)]
pub struct ServerEndpoint {
    slot: SessionSlot<Arc<dyn SessionHandle>>,
    opened: &'static OpenCounter,
}

impl ServerEndpoint {
    /// Endpoint that records opens in the process-wide counter.
    pub fn new() -> Self {
        Self::with_counter(&ENDPOINTS_OPENED)
    }

    /// Endpoint that records opens in `counter` instead.
    pub fn with_counter(counter: &'static OpenCounter) -> Self {
        Self {
            slot: SessionSlot::new(),
            opened: counter,
        }
    }

    /// Handshake completed: record the session and count the open.
    pub fn on_open(&self, session: Arc<dyn SessionHandle>) -> Result<(), LifecycleError> {
        trace!(method = "on_open", session_id = session.id(), "endpoint callback");
        self.slot.open(session)?;
        self.opened.increment();
        counter!(WS_ENDPOINTS_OPENED_TOTAL).increment(1);
        Ok(())
    }

    /// Connection closed, by either side.
    pub fn on_close(&self, reason: Option<&CloseReason>) {
        trace!(method = "on_close", reason = ?reason, "endpoint callback");
        if self.slot.close().is_some() {
            counter!(WS_ENDPOINTS_CLOSED_TOTAL).increment(1);
        }
    }

    /// Validate an incoming text message.
    pub fn on_message(&self, data: &str) -> Result<(), EndpointError> {
        trace!(method = "on_message", data, "endpoint callback");
        debug!(open = self.is_open(), "websocket is open?");

        if let Err(bad) = validate(data) {
            warn!(payload = data, "received a bad message");
            return Err(bad.into());
        }

        info!("message accepted");
        Ok(())
    }

    /// Report an error raised while handling a message.
    ///
    /// Returns `Err` only when closing the session failed, which leaves the
    /// connection in an unknown state.
    pub fn on_error(&self, error: &EndpointError) -> Result<(), TransportError> {
        trace!(method = "on_error", kind = error.kind(), "endpoint callback");

        let Some(session) = self.open_session() else {
            warn!(error = %error, "received unhandled error on a closed endpoint");
            return Ok(());
        };

        if let EndpointError::BadMessage(bad) = error {
            counter!(WS_MESSAGES_REJECTED_TOTAL).increment(1);
            return session.send_text(unacceptable_reply(bad));
        }

        warn!(error = %error, kind = error.kind(), "received unexpected error, closing connection");
        counter!(WS_UNEXPECTED_ERRORS_TOTAL).increment(1);
        session.close(CloseReason::unexpected_condition())
    }

    /// Whether a session is recorded and still open.
    pub fn is_open(&self) -> bool {
        self.open_session().is_some()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.slot.phase()
    }

    /// Id of the live session, if any.
    pub fn session_id(&self) -> Option<String> {
        self.slot.session().map(|s| s.id().to_owned())
    }

    fn open_session(&self) -> Option<Arc<dyn SessionHandle>> {
        self.slot.session().filter(|s| s.is_open())
    }
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ripple_core::logging::capture_logs;
    use ripple_core::session::{ChannelSession, CloseCode, Outbound};
    use tokio::sync::mpsc;
    use tracing::Level;

    fn private_counter() -> &'static OpenCounter {
        Box::leak(Box::new(OpenCounter::new()))
    }

    fn open_endpoint() -> (
        ServerEndpoint,
        Arc<ChannelSession>,
        mpsc::UnboundedReceiver<Outbound>,
        &'static OpenCounter,
    ) {
        let counter = private_counter();
        let endpoint = ServerEndpoint::with_counter(counter);
        let (session, rx) = ChannelSession::channel();
        let session = Arc::new(session);
        endpoint.on_open(session.clone()).unwrap();
        (endpoint, session, rx, counter)
    }

    /// Session whose writer is healthy for text but whose close always fails.
    #[derive(Debug)]
    struct BrokenCloseSession;

    impl SessionHandle for BrokenCloseSession {
        fn id(&self) -> &str {
            "broken"
        }
        fn is_open(&self) -> bool {
            true
        }
        fn send_text(&self, _text: String) -> Result<(), TransportError> {
            Ok(())
        }
        fn close(&self, _reason: CloseReason) -> Result<(), TransportError> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket gone").into())
        }
    }

    // ── validation ──────────────────────────────────────────────────

    #[test]
    fn validate_refuses_only_the_sentinel() {
        assert_eq!(validate(BAD_MESSAGE), Err(BadMessage::new("BAD MESSAGE")));
        for ok in ["", "hello", "bad message", "BAD MESSAGE ", " BAD MESSAGE", "BAD  MESSAGE"] {
            assert!(validate(ok).is_ok(), "{ok:?} should be accepted");
        }
    }

    #[test]
    fn reply_format() {
        let bad = BadMessage::new("BAD MESSAGE");
        assert_eq!(unacceptable_reply(&bad), "Unacceptable message: BAD MESSAGE");
    }

    // ── lifecycle ───────────────────────────────────────────────────

    #[test]
    fn not_open_before_open() {
        let endpoint = ServerEndpoint::with_counter(private_counter());
        assert!(!endpoint.is_open());
        assert_eq!(endpoint.phase(), Phase::Uninitialized);
        assert!(endpoint.session_id().is_none());
    }

    #[test]
    fn open_records_session_and_counts() {
        let (endpoint, session, _rx, counter) = open_endpoint();
        assert!(endpoint.is_open());
        assert_eq!(endpoint.session_id().as_deref(), Some(session.id()));
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn second_open_is_rejected_and_not_counted() {
        let (endpoint, _session, _rx, counter) = open_endpoint();
        let (other, _other_rx) = ChannelSession::channel();
        assert_eq!(
            endpoint.on_open(Arc::new(other)),
            Err(LifecycleError::AlreadyOpen)
        );
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn close_does_not_decrement() {
        let (endpoint, _session, _rx, counter) = open_endpoint();
        endpoint.on_close(Some(&CloseReason::normal()));
        assert!(!endpoint.is_open());
        assert_eq!(endpoint.phase(), Phase::Closed);
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn is_open_follows_session_state() {
        let (endpoint, session, _rx, _counter) = open_endpoint();
        assert!(session.mark_closed());
        assert!(!endpoint.is_open());
    }

    #[test]
    fn counter_is_accurate_under_concurrent_opens() {
        let counter = private_counter();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                std::thread::spawn(move || {
                    let endpoint = ServerEndpoint::with_counter(counter);
                    let (session, _rx) = ChannelSession::channel();
                    endpoint.on_open(Arc::new(session)).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.get(), 16);
    }

    #[test]
    fn global_counter_is_monotonic() {
        let before = count_endpoints_opened();
        let endpoint = ServerEndpoint::new();
        let (session, _rx) = ChannelSession::channel();
        endpoint.on_open(Arc::new(session)).unwrap();
        endpoint.on_close(None);
        assert!(count_endpoints_opened() > before);
    }

    // ── on_message ──────────────────────────────────────────────────

    #[test]
    fn good_messages_are_accepted_and_connection_stays_open() {
        let (endpoint, _session, mut rx, _counter) = open_endpoint();
        for text in ["hello", "", "BAD", "ünïcödé", "BAD MESSAGE!"] {
            endpoint.on_message(text).unwrap();
        }
        assert!(endpoint.is_open());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn bad_message_yields_domain_error_with_payload() {
        let (endpoint, _session, _rx, _counter) = open_endpoint();
        let err = endpoint.on_message(BAD_MESSAGE).unwrap_err();
        assert_matches!(&err, EndpointError::BadMessage(bad) if bad.message() == "BAD MESSAGE");
    }

    #[test]
    fn bad_message_is_logged_at_warn() {
        let (logs, _guard) = capture_logs();
        let (endpoint, _session, _rx, _counter) = open_endpoint();
        let _ = endpoint.on_message(BAD_MESSAGE);
        assert!(logs.has_event(Level::WARN, "received a bad message"));
    }

    // ── on_error ────────────────────────────────────────────────────

    #[test]
    fn bad_message_error_replies_and_keeps_connection_open() {
        let (endpoint, _session, mut rx, _counter) = open_endpoint();
        let err = endpoint.on_message(BAD_MESSAGE).unwrap_err();
        endpoint.on_error(&err).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Text("Unacceptable message: BAD MESSAGE".into())
        );
        assert!(rx.try_recv().is_err());
        assert!(endpoint.is_open());
    }

    #[test]
    fn unexpected_error_closes_with_unexpected_condition() {
        let (logs, _guard) = capture_logs();
        let (endpoint, _session, mut rx, _counter) = open_endpoint();
        endpoint
            .on_error(&EndpointError::Internal("handler exploded".into()))
            .unwrap();

        let Outbound::Close(reason) = rx.try_recv().unwrap() else {
            panic!("expected a close command");
        };
        assert_eq!(reason.code, CloseCode::UnexpectedCondition);
        assert!(reason.phrase.is_none());
        assert!(!endpoint.is_open());
        assert!(logs.has_event(Level::WARN, "unexpected error"));
    }

    #[test]
    fn unexpected_error_never_sends_text() {
        let (endpoint, _session, mut rx, _counter) = open_endpoint();
        endpoint
            .on_error(&EndpointError::Protocol("BAD MESSAGE".into()))
            .unwrap();
        assert_matches!(rx.try_recv().unwrap(), Outbound::Close(_));
    }

    #[test]
    fn error_on_closed_endpoint_is_logged_only() {
        let (logs, _guard) = capture_logs();
        let (endpoint, _session, mut rx, _counter) = open_endpoint();
        endpoint.on_close(None);

        endpoint
            .on_error(&BadMessage::new(BAD_MESSAGE).into())
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert!(logs.has_event(Level::WARN, "closed endpoint"));
    }

    #[test]
    fn error_before_open_is_logged_only() {
        let endpoint = ServerEndpoint::with_counter(private_counter());
        endpoint
            .on_error(&EndpointError::Internal("early".into()))
            .unwrap();
        assert!(!endpoint.is_open());
    }

    #[test]
    fn second_unexpected_error_after_close_is_a_no_op() {
        let (endpoint, _session, mut rx, _counter) = open_endpoint();
        let err = EndpointError::Internal("first".into());
        endpoint.on_error(&err).unwrap();
        endpoint.on_error(&err).unwrap();

        assert_matches!(rx.try_recv().unwrap(), Outbound::Close(_));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_close_is_surfaced() {
        let endpoint = ServerEndpoint::with_counter(private_counter());
        endpoint.on_open(Arc::new(BrokenCloseSession)).unwrap();

        let err = endpoint
            .on_error(&EndpointError::Internal("boom".into()))
            .unwrap_err();
        assert_matches!(err, TransportError::Io(_));
    }

    #[test]
    fn reply_is_skipped_when_writer_is_gone() {
        let (endpoint, _session, rx, _counter) = open_endpoint();
        drop(rx);
        // With the writer gone the session reports closed, so nothing is sent.
        endpoint
            .on_error(&BadMessage::new(BAD_MESSAGE).into())
            .unwrap();
    }
}
