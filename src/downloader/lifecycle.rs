//! Shutdown coordination.

use crate::error::{Error, Result};
use crate::types::{ControllerState, Event};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::MediaDownloader;

/// Upper bound for stopping the active job during shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting for another caller's stop to finish
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new job starts (enqueue still works, nothing runs)
    /// 2. Stops the active job, if any, and waits for the slot to free up
    /// 3. Emits [`Event::Shutdown`]
    ///
    /// Queued jobs stay `Queued`. Calling this twice is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        let stopped = tokio::time::timeout(SHUTDOWN_TIMEOUT, self.stop_and_wait_idle()).await;
        match stopped {
            Ok(Ok(())) => tracing::info!("Active download stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Error while stopping active download"),
            Err(_) => tracing::warn!(
                "Timeout waiting for active download to stop, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Shutdown complete");

        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.accepting_new.load(Ordering::SeqCst)
    }

    async fn stop_and_wait_idle(&self) -> Result<()> {
        match self.stop().await {
            Ok(()) => return Ok(()),
            Err(Error::InvalidState { .. }) => {}
            Err(e) => return Err(e),
        }

        // Either idle already, or someone else is mid-stop
        while self.state().await != ControllerState::Idle {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
        tracing::debug!("No active download at shutdown");
        Ok(())
    }
}
