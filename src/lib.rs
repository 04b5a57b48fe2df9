//! # media-dl
//!
//! Library for queueing and driving media downloads through an external
//! command-line fetcher (yt-dlp by default).
//!
//! A single download runs at a time. The controller spawns the fetcher,
//! turns its output into progress and destination updates, and lets
//! consumers pause, resume, stop or cancel jobs. Everything observable is
//! published on a broadcast channel of [`Event`]s.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, JobSpec, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let spec = JobSpec::new("https://example.com/watch?v=abc", "/tmp/videos")
//!         .with_quality("720");
//!     downloader.enqueue(spec).await?;
//!     downloader.start_next().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download controller and job queue
pub mod downloader;
/// Error types
pub mod error;
/// External fetcher process handling and output parsing
pub mod fetcher;
/// Core types (jobs, statuses, events)
pub mod types;

pub use config::{Config, JobDefaults, QueueConfig, ToolsConfig};
pub use downloader::{JobQueue, MediaDownloader};
pub use error::{Error, Result};
pub use fetcher::{
    CliFetcher, Fetcher, FetcherProcess, FormatEntry, LineEvent, MediaInfo, build_args,
    parse_line,
};
pub use types::{
    ContainerFormat, ControllerState, Event, Job, JobId, JobSpec, MediaType, PostProcessing,
    QueueStats, SponsorBlockMode, Status,
};

/// Wait for a termination signal, then shut the downloader down
///
/// Listens for SIGTERM and SIGINT on unix, Ctrl+C elsewhere. The active job
/// is stopped before this returns; queued jobs stay queued.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default())?;
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
