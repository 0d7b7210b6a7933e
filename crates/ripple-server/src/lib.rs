//! # ripple-server
//!
//! Validating WebSocket server endpoint, hosted on axum.
//!
//! - [`endpoint`]: the per-connection endpoint, its message validation, and
//!   the process-wide open counter
//! - [`session`]: drives one endpoint over an upgraded socket
//! - [`server`]: router, listener, `/health`, `/metrics`
//! - [`shutdown`]: graceful shutdown coordination

#![deny(unsafe_code)]

pub mod config;
pub mod endpoint;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use endpoint::{BAD_MESSAGE, PATH, ServerEndpoint, count_endpoints_opened};
pub use errors::ServerError;
pub use server::RippleServer;
pub use shutdown::ShutdownCoordinator;
