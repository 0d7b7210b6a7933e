//! Per-endpoint connection lifecycle.
//!
//! Transport callbacks drive an explicit state machine instead of poking at
//! loose fields:
//!
//! ```text
//! Uninitialized ──open──▶ Open(session) ──close──▶ Closed
//!                              ▲                     │
//!                              └────────open─────────┘
//! ```
//!
//! Opening while a session is live is rejected, so an endpoint never holds
//! more than one session at a time.

use parking_lot::RwLock;
use thiserror::Error;

/// Observable lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No session has ever been opened.
    Uninitialized,
    /// A session is live.
    Open,
    /// The last session was closed.
    Closed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Illegal lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// `open` was called while a session was still live.
    #[error("endpoint already has an open session")]
    AlreadyOpen,
}

enum State<S> {
    Uninitialized,
    Open(S),
    Closed,
}

/// Holds the session of one endpoint and guards its transitions.
///
/// Sessions are written once per open and only read afterwards, so `S` is
/// normally an `Arc`.
pub struct SessionSlot<S> {
    state: RwLock<State<S>>,
}

impl<S: Clone> SessionSlot<S> {
    /// An empty slot in the `Uninitialized` phase.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Uninitialized),
        }
    }

    /// Transition to `Open` with `session`.
    pub fn open(&self, session: S) -> Result<(), LifecycleError> {
        let mut state = self.state.write();
        if matches!(*state, State::Open(_)) {
            return Err(LifecycleError::AlreadyOpen);
        }
        *state = State::Open(session);
        Ok(())
    }

    /// Transition to `Closed`, returning the session that was live, if any.
    ///
    /// Closing a slot that is not open leaves it `Closed` and returns `None`.
    pub fn close(&self) -> Option<S> {
        let mut state = self.state.write();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Open(session) => Some(session),
            State::Uninitialized | State::Closed => None,
        }
    }

    /// Like [`close`](Self::close), but only if the live session satisfies
    /// `is_current`.
    ///
    /// Lets a transport task close its own session without touching one that
    /// replaced it.
    pub fn close_if(&self, is_current: impl FnOnce(&S) -> bool) -> Option<S> {
        let mut state = self.state.write();
        let State::Open(session) = &*state else {
            return None;
        };
        if !is_current(session) {
            return None;
        }
        match std::mem::replace(&mut *state, State::Closed) {
            State::Open(session) => Some(session),
            State::Uninitialized | State::Closed => None,
        }
    }

    /// The live session, if the slot is open.
    pub fn session(&self) -> Option<S> {
        match &*self.state.read() {
            State::Open(session) => Some(session.clone()),
            State::Uninitialized | State::Closed => None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match &*self.state.read() {
            State::Uninitialized => Phase::Uninitialized,
            State::Open(_) => Phase::Open,
            State::Closed => Phase::Closed,
        }
    }
}

impl<S: Clone> Default for SessionSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for SessionSlot<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match &*self.state.read() {
            State::Uninitialized => Phase::Uninitialized,
            State::Open(_) => Phase::Open,
            State::Closed => Phase::Closed,
        };
        f.debug_struct("SessionSlot").field("phase", &phase).finish()
    }
}
