//! Ordered job storage and validated status transitions.

use crate::error::{Error, Result};
use crate::types::{Event, Job, JobId, JobSpec, QueueStats, Status};
use chrono::Utc;
use std::collections::BTreeMap;

use super::MediaDownloader;

/// Ordered collection of jobs
///
/// Jobs are kept for the queue's lifetime; finished jobs form the history.
/// Ids come from a monotonic counter, so ordering by id is insertion order
/// and the earliest `Queued` job is always the next one to run.
///
/// Every status change goes through [`Status::can_transition_to`]. A rejected
/// transition returns [`Error::InvalidTransition`] and leaves the job as it was.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: BTreeMap<JobId, Job>,
    next_id: u64,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `spec` and append it as a `Queued` job
    ///
    /// The URL must be non-empty and the output directory absolute. Creating
    /// the directory is the caller's job.
    pub fn enqueue(&mut self, spec: JobSpec) -> Result<JobId> {
        validate_spec(&spec)?;

        self.next_id += 1;
        let id = JobId::new(self.next_id);
        self.jobs.insert(id, Job::new(id, spec));
        Ok(id)
    }

    /// Earliest job still waiting to run
    pub fn next_pending(&self) -> Option<&Job> {
        self.jobs.values().find(|j| j.status == Status::Queued)
    }

    /// Job currently occupying the active slot, if any
    pub fn active(&self) -> Option<&Job> {
        self.jobs.values().find(|j| j.status.is_active())
    }

    /// Look up a job
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Copy of every job in insertion order
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.values().cloned().collect()
    }

    /// Number of jobs ever enqueued
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether nothing has been enqueued yet
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Job counts per status
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.jobs.len(),
            ..Default::default()
        };
        for job in self.jobs.values() {
            match job.status {
                Status::Queued => stats.queued += 1,
                Status::Downloading => stats.downloading += 1,
                Status::Paused => stats.paused += 1,
                Status::Completed => stats.completed += 1,
                Status::Failed => stats.failed += 1,
                Status::Stopped => stats.stopped += 1,
            }
        }
        stats
    }

    /// `Queued` -> `Downloading`
    ///
    /// Refused while another job is active, so the single-slot invariant holds
    /// even if a caller bypasses the controller.
    pub fn mark_active(&mut self, id: JobId) -> Result<()> {
        if let Some(other) = self.active()
            && other.id != id
        {
            return Err(Error::invalid_state(
                "start",
                format!("job {} is {}", other.id, other.status),
            ));
        }

        let job = self.transition(id, Status::Downloading)?;
        job.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Downloading` -> `Paused`
    pub fn mark_paused(&mut self, id: JobId) -> Result<()> {
        self.transition(id, Status::Paused).map(|_| ())
    }

    /// `Paused` -> `Downloading`
    pub fn mark_resumed(&mut self, id: JobId) -> Result<()> {
        let job = self.get(id).ok_or(Error::NotFound(id))?;
        if job.status != Status::Paused {
            return Err(Error::InvalidTransition {
                id,
                from: job.status,
                to: Status::Downloading,
            });
        }
        self.transition(id, Status::Downloading).map(|_| ())
    }

    /// Move a job to `Completed`, `Failed` or `Stopped`
    ///
    /// `error` is recorded as the failure detail. Completing a job also sets
    /// its progress to 100.
    pub fn mark_terminal(&mut self, id: JobId, status: Status, error: Option<String>) -> Result<()> {
        if !status.is_terminal() {
            let from = self.get(id).ok_or(Error::NotFound(id))?.status;
            return Err(Error::InvalidTransition { id, from, to: status });
        }

        let job = self.transition(id, status)?;
        job.finished_at = Some(Utc::now());
        job.error = error;
        if status == Status::Completed {
            job.progress = 100.0;
        }
        Ok(())
    }

    /// Record a progress report
    ///
    /// Returns the applied percentage, or `None` when the job is unknown,
    /// not active, or the value would move progress backwards. Fetchers that
    /// download video and audio separately restart at 0% for the second
    /// stream; those reports are dropped.
    pub fn update_progress(&mut self, id: JobId, percent: f32) -> Option<f32> {
        let job = self.jobs.get_mut(&id)?;
        if !job.status.is_active() || !percent.is_finite() {
            return None;
        }

        let percent = percent.clamp(0.0, 100.0);
        if percent < job.progress {
            return None;
        }
        job.progress = percent;
        Some(percent)
    }

    /// Record the output file reported by the fetcher
    pub fn set_destination(&mut self, id: JobId, path: impl Into<String>) -> Result<()> {
        let job = self.jobs.get_mut(&id).ok_or(Error::NotFound(id))?;
        job.destination = Some(path.into());
        Ok(())
    }

    /// `Queued` -> `Stopped`, so the job is never started
    ///
    /// Active jobs must be stopped through the controller; finished jobs
    /// cannot be cancelled.
    pub fn cancel(&mut self, id: JobId) -> Result<()> {
        let status = self.get(id).ok_or(Error::NotFound(id))?.status;
        if status != Status::Queued {
            return Err(Error::invalid_state("cancel", format!("job {id} is {status}")));
        }
        self.mark_terminal(id, Status::Stopped, None)
    }

    fn transition(&mut self, id: JobId, to: Status) -> Result<&mut Job> {
        let job = self.jobs.get_mut(&id).ok_or(Error::NotFound(id))?;
        if !job.status.can_transition_to(to) {
            tracing::warn!(
                job_id = id.get(),
                from = %job.status,
                to = %to,
                "Rejected job status transition"
            );
            return Err(Error::InvalidTransition {
                id,
                from: job.status,
                to,
            });
        }
        job.status = to;
        Ok(job)
    }
}

fn validate_spec(spec: &JobSpec) -> Result<()> {
    if spec.url.trim().is_empty() {
        return Err(Error::InvalidJob("url must not be empty".to_string()));
    }
    if !spec.output_dir.is_absolute() {
        return Err(Error::InvalidJob(format!(
            "output directory must be absolute: {}",
            spec.output_dir.display()
        )));
    }
    Ok(())
}

impl MediaDownloader {
    /// Add a job to the end of the queue
    ///
    /// Creates the output directory if it does not exist, assigns an id and
    /// emits [`Event::Queued`]. Enqueueing never starts a download; call
    /// [`start_next`](Self::start_next) for that.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader) -> Result<()> {
    /// let spec = JobSpec::new("https://example.com/watch?v=abc", "/home/me/Videos")
    ///     .with_quality("137")
    ///     .with_container(ContainerFormat::Mp4);
    /// let id = downloader.enqueue(spec).await?;
    /// downloader.start_next().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn enqueue(&self, spec: JobSpec) -> Result<JobId> {
        validate_spec(&spec)?;

        tokio::fs::create_dir_all(&spec.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        spec.output_dir.display(),
                        e
                    ),
                ))
            })?;

        let url = spec.url.clone();
        let id = self.queue.lock().await.enqueue(spec)?;

        tracing::info!(job_id = id.get(), url = %url, "Job queued");
        self.emit_event(Event::Queued { id, url });

        Ok(id)
    }
}
