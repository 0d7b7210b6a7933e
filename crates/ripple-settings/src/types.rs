//! Settings types. JSON keys are camelCase.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RippleSettings {
    /// Server endpoint hosting.
    pub server: ServerSettings,
    /// Client endpoint behavior.
    pub client: ClientSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Where and how the server listens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for in-flight connections.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_message_size: 16 * 1024 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Client endpoint timeouts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// How long a blocking receive waits for a message.
    pub receive_timeout_secs: u64,
    /// How long a disconnect waits for the close handshake.
    pub close_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            receive_timeout_secs: 30,
            close_timeout_secs: 5,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
