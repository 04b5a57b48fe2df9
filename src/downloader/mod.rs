//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Ordered job storage and validated status transitions
//! - [`control`] - The single-slot controller (start/pause/resume/stop/cancel)
//! - [`task`] - Per-job output consumer running on its own tokio task
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod lifecycle;
mod queue;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use queue::JobQueue;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{self, CliFetcher, Fetcher, FormatEntry, MediaInfo};
use crate::types::{ControllerState, Event, Job, JobId, QueueStats};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The active slot: controller state plus the handles of the running job
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) state: ControllerState,
    pub(crate) active: Option<ActiveJob>,
}

impl Slot {
    pub(crate) fn active_id(&self) -> Option<JobId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Return to Idle, releasing the slot
    pub(crate) fn clear(&mut self) {
        self.active = None;
        self.state = ControllerState::Idle;
    }
}

/// Handles for the job occupying the slot
pub(crate) struct ActiveJob {
    pub(crate) id: JobId,
    /// `true` while paused; the consumer buffers output instead of dispatching it
    pub(crate) pause_tx: watch::Sender<bool>,
    /// Cancelled by `stop()`
    pub(crate) cancel: CancellationToken,
    /// Consumer task, taken by whoever waits for it to finish
    pub(crate) handle: Option<JoinHandle<()>>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the job queue and the single active slot. At most one job is
/// `Downloading` or `Paused` at any time. Lock order is always slot, then
/// queue; neither lock is held while waiting on fetcher output.
#[derive(Clone)]
pub struct MediaDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Launches fetcher processes (trait object for pluggable implementations)
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Ordered job history
    pub(crate) queue: Arc<Mutex<JobQueue>>,
    /// Controller state and active job
    pub(crate) slot: Arc<Mutex<Slot>>,
    /// Flag to indicate whether new jobs may start (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader using the fetcher described by `config.tools`
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) when the settings are
    /// invalid or the fetcher binary cannot be found.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = CliFetcher::from_config(&config.tools)?;
        tracing::info!(
            fetcher = %fetcher.binary_path().display(),
            "Fetcher binary resolved"
        );
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a new MediaDownloader with an explicit fetcher implementation
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.queue.event_capacity);

        tracing::debug!(
            fetcher = fetcher.name(),
            auto_advance = config.queue.auto_advance,
            settle_delay_ms = config.queue.settle_delay.as_millis() as u64,
            "Downloader initialized"
        );

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            fetcher,
            queue: Arc::new(Mutex::new(JobQueue::new())),
            slot: Arc::new(Mutex::new(Slot::default())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. A subscriber that falls behind by more than
    /// `queue.event_capacity` events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{Config, Event, MediaDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default())?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             if let Event::ProgressChanged { id, percent } = event {
    ///                 println!("job {id}: {percent:.1}%");
    ///             }
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Snapshot of every job in insertion order
    pub async fn jobs(&self) -> Vec<Job> {
        self.queue.lock().await.snapshot()
    }

    /// Snapshot of one job
    pub async fn job(&self, id: JobId) -> Option<Job> {
        self.queue.lock().await.get(id).cloned()
    }

    /// Job counts per status
    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.lock().await.stats()
    }

    /// Read a URL's metadata with a one-shot fetcher run
    ///
    /// Independent of the queue; may run while a job is downloading.
    pub async fn probe_media(&self, url: &str, cookie_file: Option<&Path>) -> Result<MediaInfo> {
        fetcher::probe_media(
            self.fetcher.as_ref(),
            url,
            cookie_file,
            self.config.tools.probe_timeout,
        )
        .await
    }

    /// List the formats a URL offers, for use as quality tokens
    pub async fn list_formats(
        &self,
        url: &str,
        cookie_file: Option<&Path>,
    ) -> Result<Vec<FormatEntry>> {
        fetcher::list_formats(
            self.fetcher.as_ref(),
            url,
            cookie_file,
            self.config.tools.probe_timeout,
        )
        .await
    }

    /// Build a job from the configured defaults and enqueue it
    pub async fn enqueue_url(&self, url: &str) -> Result<JobId> {
        self.enqueue(self.config.defaults.spec_for(url)).await
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is dropped, so jobs keep
    /// running whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
