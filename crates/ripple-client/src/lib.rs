//! # ripple-client
//!
//! Blocking client endpoint for the ripple server.
//!
//! The endpoint owns a private tokio runtime whose tasks drive the socket;
//! received text crosses back to the calling thread through a
//! [`MessageQueue`].

#![deny(unsafe_code)]

pub mod address;
pub mod endpoint;
pub mod errors;
pub mod queue;

pub use address::server_endpoint_url;
pub use endpoint::{CLOSE_TIMEOUT, ClientEndpoint, RECEIVE_TIMEOUT};
pub use errors::ClientError;
pub use queue::MessageQueue;
