//! Download controller: start, pause, resume, stop and cancel.
//!
//! The controller owns one active slot. Every operation takes the slot lock
//! first and the queue lock second, and both are released before waiting on
//! the consumer task.

use crate::error::{Error, Result};
use crate::fetcher::build_args;
use crate::types::{ControllerState, Event, JobId, Status};
use std::sync::atomic::Ordering;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ActiveJob, MediaDownloader, Slot};

impl MediaDownloader {
    /// Start the earliest queued job
    ///
    /// Returns `Ok(None)` when nothing is queued. Only allowed while the
    /// controller is idle.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if a job is already active or the downloader
    ///   is shutting down
    /// - [`Error::Spawn`] if the fetcher cannot be launched; the job stays
    ///   `Queued` and the slot stays free
    pub async fn start_next(&self) -> Result<Option<JobId>> {
        self.start_job(None).await
    }

    /// Start a specific queued job, skipping the ones ahead of it
    pub async fn start(&self, id: JobId) -> Result<JobId> {
        match self.start_job(Some(id)).await? {
            Some(started) => Ok(started),
            None => Err(Error::NotFound(id)),
        }
    }

    async fn start_job(&self, target: Option<JobId>) -> Result<Option<JobId>> {
        let mut slot = self.slot.lock().await;
        if slot.state != ControllerState::Idle {
            return Err(Error::invalid_state("start", slot.state));
        }
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::invalid_state("start", "shutting down"));
        }

        let mut queue = self.queue.lock().await;
        let job = match target {
            None => match queue.next_pending() {
                Some(job) => job.clone(),
                None => {
                    tracing::debug!("No queued job to start");
                    return Ok(None);
                }
            },
            Some(id) => {
                let job = queue.get(id).ok_or(Error::NotFound(id))?;
                if job.status != Status::Queued {
                    return Err(Error::InvalidTransition {
                        id,
                        from: job.status,
                        to: Status::Downloading,
                    });
                }
                job.clone()
            }
        };
        let id = job.id;

        let args = build_args(&job.spec);
        let process = match self.fetcher.spawn(&args) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(job_id = id.get(), error = %e, "Failed to spawn fetcher");
                self.emit_event(Event::StartFailed {
                    id,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        queue.mark_active(id)?;
        drop(queue);

        let (pause_tx, pause_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        slot.state = ControllerState::Running;
        self.emit_event(Event::StatusChanged {
            id,
            status: Status::Downloading,
            error: None,
        });

        // The consumer needs the slot lock to finish, so storing the handle
        // here cannot race with its completion.
        let handle = tokio::spawn(self.clone().run_job(id, process, pause_rx, cancel.clone()));
        slot.active = Some(ActiveJob {
            id,
            pause_tx,
            cancel,
            handle: Some(handle),
        });

        tracing::info!(
            job_id = id.get(),
            url = %job.spec.url,
            fetcher = self.fetcher.name(),
            "Download started"
        );

        Ok(Some(id))
    }

    /// Pause the active job
    ///
    /// The fetcher keeps running; its output is buffered and replayed on
    /// [`resume`](Self::resume). Pausing an already paused job does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] when no job is active or a stop is in progress.
    pub async fn pause(&self) -> Result<()> {
        let mut guard = self.slot.lock().await;
        let slot = &mut *guard;
        match slot.state {
            ControllerState::Paused => return Ok(()),
            ControllerState::Running => {}
            state => return Err(Error::invalid_state("pause", state)),
        }

        let Some(active) = slot.active.as_ref() else {
            return Err(Error::invalid_state("pause", ControllerState::Idle));
        };
        let id = active.id;

        self.queue.lock().await.mark_paused(id)?;
        active.pause_tx.send_replace(true);
        slot.state = ControllerState::Paused;

        self.emit_event(Event::StatusChanged {
            id,
            status: Status::Paused,
            error: None,
        });
        tracing::debug!(job_id = id.get(), "Download paused");

        Ok(())
    }

    /// Resume the paused job
    ///
    /// Output buffered while paused is dispatched, in order, before any new
    /// output. Resuming a running job does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] when no job is active or a stop is in progress.
    pub async fn resume(&self) -> Result<()> {
        let mut guard = self.slot.lock().await;
        let slot = &mut *guard;
        match slot.state {
            ControllerState::Running => return Ok(()),
            ControllerState::Paused => {}
            state => return Err(Error::invalid_state("resume", state)),
        }

        let Some(active) = slot.active.as_ref() else {
            return Err(Error::invalid_state("resume", ControllerState::Idle));
        };
        let id = active.id;

        self.queue.lock().await.mark_resumed(id)?;
        slot.state = ControllerState::Running;

        // Emitted before the consumer can replay buffered output
        self.emit_event(Event::StatusChanged {
            id,
            status: Status::Downloading,
            error: None,
        });
        active.pause_tx.send_replace(false);
        tracing::debug!(job_id = id.get(), "Download resumed");

        Ok(())
    }

    /// Stop the active job
    ///
    /// Terminates the fetcher, discards its remaining output and marks the job
    /// `Stopped` whatever its exit code. Returns once the job is `Stopped` and
    /// the slot is free. Works from `Running` and `Paused`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] when no job is active or another stop is
    /// already in progress.
    pub async fn stop(&self) -> Result<()> {
        self.stop_job(None).await
    }

    /// Stop the active job, but only if it is `expected`
    pub(crate) async fn stop_job(&self, expected: Option<JobId>) -> Result<()> {
        let (id, handle) = {
            let mut slot = self.slot.lock().await;
            begin_stop(&mut slot, expected)?
        };
        self.finish_stop(id, handle).await;
        Ok(())
    }

    /// Wait for a cancelled consumer to mark its job stopped
    async fn finish_stop(&self, id: JobId, handle: Option<JoinHandle<()>>) {
        tracing::info!(job_id = id.get(), "Stopping download");

        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(job_id = id.get(), error = %e, "Download task ended abnormally");
            self.release_slot(id).await;
        }
    }

    /// Cancel a job
    ///
    /// The active job is stopped; a queued job becomes `Stopped` without ever
    /// starting. Finished jobs cannot be cancelled.
    ///
    /// Whether the job is still active is decided under the slot lock, so a
    /// job finishing concurrently is either stopped or reported as finished.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if slot.active_id() == Some(id) {
            let (id, handle) = begin_stop(&mut slot, Some(id))?;
            drop(slot);
            self.finish_stop(id, handle).await;
            return Ok(());
        }

        self.queue.lock().await.cancel(id)?;
        drop(slot);

        self.emit_event(Event::StatusChanged {
            id,
            status: Status::Stopped,
            error: None,
        });
        tracing::info!(job_id = id.get(), "Queued job cancelled");

        Ok(())
    }

    /// Current controller state
    pub async fn state(&self) -> ControllerState {
        self.slot.lock().await.state
    }

    /// Id of the job in the active slot
    pub async fn active_job(&self) -> Option<JobId> {
        self.slot.lock().await.active_id()
    }

    /// Free the slot after the consumer task died without cleaning up
    async fn release_slot(&self, id: JobId) {
        let mut slot = self.slot.lock().await;
        let mut queue = self.queue.lock().await;

        if queue.get(id).is_some_and(|j| j.status.is_active()) {
            if let Err(e) = queue.mark_terminal(id, Status::Stopped, None) {
                tracing::warn!(job_id = id.get(), error = %e, "Could not mark job stopped");
            }
            self.emit_event(Event::StatusChanged {
                id,
                status: Status::Stopped,
                error: None,
            });
        }
        drop(queue);

        if slot.active_id() == Some(id) {
            slot.clear();
        }
    }
}

/// Cancel the consumer and move the slot to `Stopping`
///
/// Returns the job id and the consumer handle to wait on once the slot lock
/// is released.
fn begin_stop(
    slot: &mut Slot,
    expected: Option<JobId>,
) -> Result<(JobId, Option<JoinHandle<()>>)> {
    match slot.state {
        ControllerState::Running | ControllerState::Paused => {}
        state => return Err(Error::invalid_state("stop", state)),
    }

    let Some(active) = slot.active.as_mut() else {
        return Err(Error::invalid_state("stop", ControllerState::Idle));
    };
    if let Some(expected) = expected
        && active.id != expected
    {
        return Err(Error::invalid_state(
            "stop",
            format!("job {expected} is not active"),
        ));
    }

    active.cancel.cancel();
    let id = active.id;
    let handle = active.handle.take();
    slot.state = ControllerState::Stopping;
    Ok((id, handle))
}
