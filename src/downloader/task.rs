//! Per-job output consumer.
//!
//! One task per active job reads the fetcher's output, turns each line into
//! events and finalizes the job when the process exits or is stopped.

use crate::error::Error;
use crate::fetcher::{FetcherProcess, LineEvent, parse_line};
use crate::types::{Event, JobId, Status};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::MediaDownloader;

/// How long a terminated fetcher gets to close its output and exit
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Paused-buffer length past which consecutive progress lines collapse into
/// the latest one
pub(crate) const PAUSE_BUFFER_SOFT_LIMIT: usize = 4096;

impl MediaDownloader {
    /// Consume one job's output until it finishes or is stopped
    ///
    /// While paused, lines are read into `buffered` so the pipe never fills
    /// up, and replayed in order on resume. A line read while older lines
    /// are still buffered joins the buffer, so nothing overtakes them. End of
    /// output while paused holds finalization until the job is resumed or
    /// stopped.
    pub(crate) async fn run_job(
        self,
        id: JobId,
        mut process: Box<dyn FetcherProcess>,
        mut pause_rx: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) {
        let mut buffered: VecDeque<String> = VecDeque::new();
        let mut output_done = false;
        let mut exit_code: Option<i32> = None;

        loop {
            let paused = *pause_rx.borrow_and_update();

            if !paused {
                while let Some(line) = buffered.pop_front() {
                    self.dispatch_line(id, line).await;
                }
            }

            if output_done && exit_code.is_none() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.finish_stopped(id, process, buffered.len()).await;
                        return;
                    }
                    result = process.wait() => {
                        exit_code = Some(result.unwrap_or_else(|e| {
                            tracing::warn!(job_id = id.get(), error = %e, "Failed to wait for fetcher");
                            -1
                        }));
                    }
                }
                continue;
            }

            if let Some(code) = exit_code
                && !paused
            {
                if self.finish_exited(id, code, &cancel, &pause_rx).await {
                    return;
                }
                if cancel.is_cancelled() {
                    self.finish_stopped(id, process, buffered.len()).await;
                    return;
                }
                // Paused between the check above and taking the slot lock
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.finish_stopped(id, process, buffered.len()).await;
                    return;
                }
                changed = pause_rx.changed() => {
                    if changed.is_err() {
                        // Sender lives in the slot; it only goes away if the
                        // slot was released without us.
                        tracing::warn!(job_id = id.get(), "Pause channel closed, stopping consumer");
                        self.finish_stopped(id, process, buffered.len()).await;
                        return;
                    }
                }
                line = process.next_line(), if !output_done => match line {
                    Some(line) => {
                        // A resume may land between the top of the loop and here
                        if *pause_rx.borrow() || !buffered.is_empty() {
                            buffer_line(&mut buffered, line);
                        } else {
                            self.dispatch_line(id, line).await;
                        }
                    }
                    None => output_done = true,
                },
            }
        }
    }

    /// Forward one output line as events
    ///
    /// Every line becomes a `LogLine`; progress and destination lines also
    /// produce their structured event afterwards.
    async fn dispatch_line(&self, id: JobId, line: String) {
        tracing::debug!(job_id = id.get(), line = %line, "Fetcher output");
        let parsed = parse_line(&line);
        self.emit_event(Event::LogLine { id, line });

        match parsed {
            Some(LineEvent::Progress { percent }) => {
                let applied = self.queue.lock().await.update_progress(id, percent);
                if let Some(percent) = applied {
                    self.emit_event(Event::ProgressChanged { id, percent });
                }
            }
            Some(LineEvent::Destination { path }) => {
                let recorded = self.queue.lock().await.set_destination(id, path.clone());
                match recorded {
                    Ok(()) => self.emit_event(Event::DestinationKnown { id, path }),
                    Err(e) => {
                        tracing::warn!(job_id = id.get(), error = %e, "Could not record destination")
                    }
                }
            }
            None => {}
        }
    }

    /// Finalize a job whose fetcher exited on its own
    ///
    /// Returns `false` without touching anything if a stop or pause got in
    /// first; both are checked under the slot lock.
    async fn finish_exited(
        &self,
        id: JobId,
        code: i32,
        cancel: &CancellationToken,
        pause_rx: &watch::Receiver<bool>,
    ) -> bool {
        let mut slot = self.slot.lock().await;
        if cancel.is_cancelled() || *pause_rx.borrow() {
            return false;
        }

        let (status, error) = if code == 0 {
            (Status::Completed, None)
        } else {
            (Status::Failed, Some(Error::ProcessExit { code }.to_string()))
        };

        let mut queue = self.queue.lock().await;
        if status == Status::Completed && queue.update_progress(id, 100.0).is_some() {
            self.emit_event(Event::ProgressChanged { id, percent: 100.0 });
        }
        if let Err(e) = queue.mark_terminal(id, status, error.clone()) {
            tracing::warn!(job_id = id.get(), error = %e, "Could not finalize job");
        }
        drop(queue);

        slot.clear();
        self.emit_event(Event::StatusChanged {
            id,
            status,
            error: error.clone(),
        });
        drop(slot);

        match status {
            Status::Completed => tracing::info!(job_id = id.get(), "Download completed"),
            _ => tracing::warn!(job_id = id.get(), exit_code = code, "Download failed"),
        }

        if self.config.queue.auto_advance {
            tokio::spawn(self.clone().advance_after(self.config.queue.settle_delay));
        }

        true
    }

    /// Terminate the fetcher, discard its output and mark the job stopped
    async fn finish_stopped(
        &self,
        id: JobId,
        mut process: Box<dyn FetcherProcess>,
        discarded: usize,
    ) {
        process.terminate();

        let drained = tokio::time::timeout(TERMINATE_GRACE, async {
            let mut count = 0usize;
            while process.next_line().await.is_some() {
                count += 1;
            }
            count
        })
        .await;

        let code = match drained {
            Ok(count) => {
                tracing::debug!(
                    job_id = id.get(),
                    drained = count,
                    discarded,
                    "Discarded fetcher output after stop"
                );
                tokio::time::timeout(TERMINATE_GRACE, process.wait()).await
            }
            Err(_) => {
                tracing::warn!(job_id = id.get(), "Fetcher ignored termination, killing");
                process.kill();
                tokio::time::timeout(TERMINATE_GRACE, process.wait()).await
            }
        };

        match code {
            Ok(Ok(code)) => tracing::debug!(job_id = id.get(), exit_code = code, "Fetcher exited"),
            Ok(Err(e)) => tracing::warn!(job_id = id.get(), error = %e, "Failed to reap fetcher"),
            Err(_) => {
                process.kill();
                tracing::warn!(job_id = id.get(), "Fetcher did not exit after kill")
            }
        }

        let mut slot = self.slot.lock().await;
        let mut queue = self.queue.lock().await;
        if let Err(e) = queue.mark_terminal(id, Status::Stopped, None) {
            tracing::warn!(job_id = id.get(), error = %e, "Could not mark job stopped");
        }
        drop(queue);

        if slot.active_id() == Some(id) {
            slot.clear();
        }
        self.emit_event(Event::StatusChanged {
            id,
            status: Status::Stopped,
            error: None,
        });
        drop(slot);

        tracing::info!(job_id = id.get(), "Download stopped");
    }

    /// Wait `delay`, then start the next queued job if the slot is still free
    ///
    /// Boxed because `start_next` spawns the consumer that spawns this again.
    fn advance_after(self, delay: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            tokio::time::sleep(delay).await;

            match self.start_next().await {
                Ok(Some(id)) => tracing::debug!(job_id = id.get(), "Advanced to next queued job"),
                Ok(None) => tracing::debug!("Queue drained"),
                Err(Error::InvalidState { state, .. }) => {
                    tracing::debug!(state = %state, "Skipped auto-advance")
                }
                // Already reported to subscribers as `StartFailed`
                Err(e) => tracing::error!(error = %e, "Auto-advance failed to start next job"),
            }
        })
    }
}

/// Append a line read while paused
///
/// Past [`PAUSE_BUFFER_SOFT_LIMIT`] a progress line replaces a progress line
/// at the tail, so a long pause over `--newline` output stays bounded. Other
/// lines are always kept.
fn buffer_line(buffered: &mut VecDeque<String>, line: String) {
    if buffered.len() >= PAUSE_BUFFER_SOFT_LIMIT
        && is_progress(&line)
        && let Some(last) = buffered.back_mut()
        && is_progress(last)
    {
        *last = line;
        return;
    }
    buffered.push_back(line);
}

fn is_progress(line: &str) -> bool {
    matches!(parse_line(line), Some(LineEvent::Progress { .. }))
}
