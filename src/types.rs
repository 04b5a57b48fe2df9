//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a job
///
/// Assigned by the queue at enqueue time from a monotonic counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<JobId> for u64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the queue
    Queued,
    /// Fetcher process running and its output is being consumed
    Downloading,
    /// Fetcher still running, output buffered but not dispatched
    Paused,
    /// Fetcher exited with code 0
    Completed,
    /// Fetcher exited with a non-zero code
    Failed,
    /// Stopped by the user, or cancelled before it started
    Stopped,
}

impl Status {
    /// Whether the job has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Stopped)
    }

    /// Whether the job currently occupies the active slot
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Downloading | Status::Paused)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Queued, Downloading)
                | (Queued, Stopped)
                | (Downloading, Paused)
                | (Downloading, Completed)
                | (Downloading, Failed)
                | (Downloading, Stopped)
                | (Paused, Downloading)
                | (Paused, Stopped)
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Downloading => "downloading",
            Status::Paused => "paused",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// State of the download controller's single active slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    /// No job is active
    #[default]
    Idle,
    /// A job is active and its output is being dispatched
    Running,
    /// A job is active but its output is buffered
    Paused,
    /// The active job is being terminated
    Stopping,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Running => "running",
            ControllerState::Paused => "paused",
            ControllerState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// What kind of output the fetcher should produce
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Video with merged audio
    #[default]
    Video,
    /// Audio only, extracted after download
    Audio,
}

/// Output container requested from the fetcher
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// MPEG-4
    Mp4,
    /// Matroska
    Mkv,
    /// WebM
    Webm,
    /// MP3 audio
    Mp3,
    /// AAC audio in an MPEG-4 container
    M4a,
    /// FLAC audio
    Flac,
    /// Whatever the fetcher picks
    #[default]
    Best,
}

impl ContainerFormat {
    /// Token passed on the fetcher command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Webm => "webm",
            ContainerFormat::Mp3 => "mp3",
            ContainerFormat::M4a => "m4a",
            ContainerFormat::Flac => "flac",
            ContainerFormat::Best => "best",
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SponsorBlock segment removal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorBlockMode {
    /// Keep every segment
    #[default]
    None,
    /// Remove sponsor segments
    SponsorsOnly,
    /// Remove sponsor, intro and outro segments
    SponsorsIntrosOutros,
    /// Remove every known category
    AllSegments,
}

impl SponsorBlockMode {
    /// Categories for `--sponsorblock-remove`, or `None` when disabled
    pub fn categories(&self) -> Option<&'static str> {
        match self {
            SponsorBlockMode::None => None,
            SponsorBlockMode::SponsorsOnly => Some("sponsor"),
            SponsorBlockMode::SponsorsIntrosOutros => Some("sponsor,intro,outro"),
            SponsorBlockMode::AllSegments => Some("all"),
        }
    }
}

/// Post-processing switches forwarded to the fetcher
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessing {
    /// Write title/artist/etc. into the output file
    #[serde(default = "default_true")]
    pub embed_metadata: bool,
    /// Embed the thumbnail as cover art (video only)
    #[serde(default = "default_true")]
    pub embed_thumbnail: bool,
    /// SponsorBlock removal mode
    #[serde(default)]
    pub sponsor_block: SponsorBlockMode,
}

impl Default for PostProcessing {
    fn default() -> Self {
        Self {
            embed_metadata: true,
            embed_thumbnail: true,
            sponsor_block: SponsorBlockMode::None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Job submission
///
/// Everything the fetcher needs to run one download. The queue turns it into
/// a [`Job`] by assigning an id and initial status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source URL
    pub url: String,
    /// Video or audio
    #[serde(default)]
    pub media_type: MediaType,
    /// Format id token, or `best` / `worst`
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Requested container
    #[serde(default)]
    pub container: ContainerFormat,
    /// Absolute output directory
    pub output_dir: PathBuf,
    /// Netscape cookie jar passed to the fetcher
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    /// Post-processing switches
    #[serde(default)]
    pub post_processing: PostProcessing,
}

pub(crate) fn default_quality() -> String {
    "best".to_string()
}

impl JobSpec {
    /// Create a spec with default quality, container and post-processing
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            media_type: MediaType::default(),
            quality: default_quality(),
            container: ContainerFormat::default(),
            output_dir: output_dir.into(),
            cookie_file: None,
            post_processing: PostProcessing::default(),
        }
    }

    /// Request audio-only output in the given container
    pub fn audio(mut self, container: ContainerFormat) -> Self {
        self.media_type = MediaType::Audio;
        self.container = container;
        self
    }

    /// Set the quality token
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    /// Set the output container
    pub fn with_container(mut self, container: ContainerFormat) -> Self {
        self.container = container;
        self
    }

    /// Set the cookie jar path
    pub fn with_cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    /// Replace the post-processing switches
    pub fn with_post_processing(mut self, post_processing: PostProcessing) -> Self {
        self.post_processing = post_processing;
        self
    }
}

/// A queued, running or finished download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier
    pub id: JobId,
    /// Submission parameters
    #[serde(flatten)]
    pub spec: JobSpec,
    /// Current status
    pub status: Status,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f32,
    /// Output file reported by the fetcher
    pub destination: Option<String>,
    /// Failure detail for `Failed` jobs
    pub error: Option<String>,
    /// When the job was enqueued
    pub created_at: DateTime<Utc>,
    /// When the fetcher was first spawned for this job
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(id: JobId, spec: JobSpec) -> Self {
        Self {
            id,
            spec,
            status: Status::Queued,
            progress: 0.0,
            destination: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.spec.url
    }
}

/// Job counts per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total number of jobs ever enqueued
    pub total: usize,
    /// Jobs waiting to start
    pub queued: usize,
    /// Jobs currently downloading
    pub downloading: usize,
    /// Jobs currently paused
    pub paused: usize,
    /// Jobs that completed
    pub completed: usize,
    /// Jobs that failed
    pub failed: usize,
    /// Jobs stopped or cancelled
    pub stopped: usize,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job added to the queue
    Queued {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
    },

    /// Job status changed
    StatusChanged {
        /// Job ID
        id: JobId,
        /// New status
        status: Status,
        /// Failure detail when the new status is `Failed`
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Progress percentage advanced
    ProgressChanged {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// The fetcher reported the output file
    DestinationKnown {
        /// Job ID
        id: JobId,
        /// Output path as printed by the fetcher
        path: String,
    },

    /// Raw fetcher output line
    LogLine {
        /// Job ID
        id: JobId,
        /// The line, without its terminator
        line: String,
    },

    /// The fetcher could not be launched; the job stays `Queued`
    StartFailed {
        /// Job ID
        id: JobId,
        /// Spawn error message
        error: String,
    },

    /// Downloader is shutting down
    Shutdown,
}
