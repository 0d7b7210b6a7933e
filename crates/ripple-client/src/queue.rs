//! Received-message queue bridging transport tasks and the calling thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<String>,
    closed: bool,
}

/// Unbounded FIFO of received text.
///
/// Producers never wait beyond the internal lock. Consumers block in
/// [`pop`](Self::pop) until a message arrives, the timeout elapses, or the
/// queue is closed.
#[derive(Debug, Default)]
pub struct MessageQueue {
    inner: Mutex<Inner>,
    available: Condvar,
}

impl MessageQueue {
    /// An empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` at the tail.
    ///
    /// Once the queue is closed the message is dropped with a warning.
    pub fn push(&self, text: String) {
        let mut inner = self.inner.lock();
        if inner.closed {
            warn!(len = text.len(), "queue closed, dropping received message");
            return;
        }
        inner.messages.push_back(text);
        drop(inner);
        let _ = self.available.notify_one();
    }

    /// Remove the head, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout, or as soon as the queue is closed and empty.
    pub fn pop(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        loop {
            if let Some(text) = inner.messages.pop_front() {
                return Some(text);
            }
            if inner.closed {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut inner, deadline).timed_out() {
                        return inner.messages.pop_front();
                    }
                }
                // Timeout too large to represent: wait indefinitely.
                None => self.available.wait(&mut inner),
            }
        }
    }

    /// Stop accepting messages and wake every blocked consumer.
    ///
    /// Messages already queued can still be popped.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        let _ = self.available.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Whether no messages are queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }
}
