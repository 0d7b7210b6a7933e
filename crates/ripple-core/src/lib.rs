//! # ripple-core
//!
//! Foundation types shared by the ripple client and server endpoints.
//!
//! - [`errors`]: the domain error ([`BadMessage`]) and everything else a
//!   handler or transport can fail with
//! - [`lifecycle`]: the per-endpoint `Uninitialized → Open → Closed` state machine
//! - [`session`]: the transport boundary ([`SessionHandle`]) and the
//!   channel-backed session both transports use
//! - [`logging`]: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod session;

pub use errors::{BadMessage, EndpointError, TransportError};
pub use lifecycle::{LifecycleError, Phase, SessionSlot};
pub use session::{ChannelSession, CloseCode, CloseReason, Outbound, SessionHandle};
