//! # ripple
//!
//! Runs the validating WebSocket server, or sends text to one with the
//! blocking client endpoint.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ripple_client::ClientEndpoint;
use ripple_server::{RippleServer, ServerConfig, metrics};
use ripple_settings::RippleSettings;
use tracing::info;

/// WebSocket endpoint pair.
#[derive(Parser, Debug)]
#[command(name = "ripple", about = "Validating WebSocket server and blocking client")]
struct Cli {
    /// Settings file (defaults to `~/.ripple/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the endpoint until Ctrl-C.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, 0 for auto-assign (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send each text to a server and print the reply.
    Send {
        /// Base address of the server, e.g. `http://127.0.0.1:8080`.
        #[arg(long)]
        url: String,

        /// Endpoint path appended to the base address.
        #[arg(long, default_value = ripple_server::PATH)]
        path: String,

        /// Seconds to wait for each reply (overrides settings).
        #[arg(long)]
        timeout: Option<u64>,

        /// Messages to send.
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<RippleSettings> {
    match path {
        Some(path) => ripple_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => ripple_settings::load_settings().context("Failed to load settings"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;
    ripple_core::logging::init_subscriber(&settings.logging.level);

    match cli.command {
        Command::Serve { host, port } => {
            let mut config = ServerConfig::from(&settings.server);
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(serve(config))
        }
        Command::Send {
            url,
            path,
            timeout,
            texts,
        } => {
            let timeout = timeout.unwrap_or(settings.client.receive_timeout_secs);
            send(&url, &path, Duration::from_secs(timeout), &settings, &texts)
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let handle = metrics::install_recorder().context("Failed to install metrics recorder")?;
    let server = RippleServer::new(config).with_metrics(handle);

    let (addr, serve_handle) = server.listen().await.context("Failed to start server")?;
    info!(%addr, "ready, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    let _ = server
        .shutdown()
        .graceful_shutdown([serve_handle], shutdown_timeout)
        .await;
    info!(
        endpoints_opened = ripple_server::count_endpoints_opened(),
        "server stopped"
    );
    Ok(())
}

fn send(
    base: &str,
    path: &str,
    timeout: Duration,
    settings: &RippleSettings,
    texts: &[String],
) -> Result<()> {
    let client = ClientEndpoint::new()
        .context("Failed to create client")?
        .with_receive_timeout(timeout)
        .with_close_timeout(Duration::from_secs(settings.client.close_timeout_secs));

    client
        .connect(base, path)
        .with_context(|| format!("Failed to connect to {base}{path}"))?;

    for text in texts {
        client.send_async(text.as_str()).context("Failed to send")?;
        match client.receive_message() {
            Some(reply) => println!("{reply}"),
            None => println!("(no reply)"),
        }
    }

    client.disconnect().context("Failed to disconnect")?;
    Ok(())
}
