//! Shutdown signal shared by the listener and every endpoint session.
//!
//! Cancelling the token stops the listener from accepting. It also makes each
//! live session close its connection with 1001 ("going away").

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the server's [`CancellationToken`].
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// A coordinator that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a task that should stop on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the token. Later calls do nothing.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the token, then give `tasks` until `timeout` to finish.
    ///
    /// Returns `false` if any task was still running at the deadline.
    pub async fn graceful_shutdown(
        &self,
        tasks: impl IntoIterator<Item = JoinHandle<()>>,
        timeout: Duration,
    ) -> bool {
        self.shutdown();
        let deadline = Instant::now() + timeout;

        let mut pending = 0_usize;
        for task in tasks {
            if timeout_at(deadline, task).await.is_err() {
                pending += 1;
            }
        }

        if pending == 0 {
            info!("all tasks drained");
            true
        } else {
            warn!(pending, ?timeout, "shutdown deadline passed with tasks still running");
            false
        }
    }
}
