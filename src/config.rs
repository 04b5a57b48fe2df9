//! Configuration types for media-dl

use crate::error::{Error, Result};
use crate::types::{ContainerFormat, JobSpec, MediaType, PostProcessing, SponsorBlockMode};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Fetcher binary discovery and probe limits
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the fetcher executable (auto-detected if None)
    #[serde(default)]
    pub fetcher_path: Option<PathBuf>,

    /// Whether to search PATH for the fetcher if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Executable name looked up on PATH (default: "yt-dlp")
    #[serde(default = "default_fetcher_name")]
    pub fetcher_name: String,

    /// Upper bound for one metadata probe or format listing (default: 60 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetcher_path: None,
            search_path: true,
            fetcher_name: default_fetcher_name(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// Queue advancement and event delivery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Start the next queued job after one completes or fails (default: true)
    #[serde(default = "default_true")]
    pub auto_advance: bool,

    /// Pause between a job finishing and the next one starting (default: 1000 ms)
    #[serde(default = "default_settle_delay", with = "millis_serde")]
    pub settle_delay: Duration,

    /// Broadcast channel capacity (default: 1000)
    ///
    /// Subscribers that fall further behind than this miss events and
    /// receive `RecvError::Lagged`.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            auto_advance: true,
            settle_delay: default_settle_delay(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Values used to fill a [`JobSpec`] when the caller only has a URL
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobDefaults {
    /// Video or audio (default: video)
    #[serde(default)]
    pub media_type: MediaType,

    /// Output container (default: best)
    #[serde(default)]
    pub container: ContainerFormat,

    /// Quality token (default: "best")
    #[serde(default = "crate::types::default_quality")]
    pub quality: String,

    /// Output directory (default: `$HOME/Downloads`)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Embed metadata (default: true)
    #[serde(default = "default_true")]
    pub embed_metadata: bool,

    /// Embed thumbnail for video (default: true)
    #[serde(default = "default_true")]
    pub embed_thumbnail: bool,

    /// SponsorBlock removal (default: none)
    #[serde(default)]
    pub sponsor_block: SponsorBlockMode,

    /// Cookie jar applied to every job built from these defaults
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            media_type: MediaType::default(),
            container: ContainerFormat::default(),
            quality: crate::types::default_quality(),
            output_dir: default_output_dir(),
            embed_metadata: true,
            embed_thumbnail: true,
            sponsor_block: SponsorBlockMode::default(),
            cookie_file: None,
        }
    }
}

impl JobDefaults {
    /// Build a job submission for `url` from these defaults
    pub fn spec_for(&self, url: impl Into<String>) -> JobSpec {
        JobSpec {
            url: url.into(),
            media_type: self.media_type,
            quality: self.quality.clone(),
            container: self.container,
            output_dir: self.output_dir.clone(),
            cookie_file: self.cookie_file.clone(),
            post_processing: PostProcessing {
                embed_metadata: self.embed_metadata,
                embed_thumbnail: self.embed_thumbnail,
                sponsor_block: self.sponsor_block,
            },
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Every field has a default, so `Config::default()` and `{}` in JSON both
/// describe a working setup as long as the fetcher is on PATH.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetcher discovery
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Queue behaviour
    #[serde(default)]
    pub queue: QueueConfig,

    /// Defaults for new jobs
    #[serde(default)]
    pub defaults: JobDefaults,
}

impl Config {
    /// Check settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.queue.event_capacity == 0 {
            return Err(Error::Config {
                message: "event_capacity must be greater than zero".to_string(),
                key: Some("queue.event_capacity".to_string()),
            });
        }

        if self.tools.fetcher_path.is_none() && !self.tools.search_path {
            return Err(Error::Config {
                message: "no fetcher_path set and PATH search disabled".to_string(),
                key: Some("tools.fetcher_path".to_string()),
            });
        }

        if self.tools.fetcher_name.trim().is_empty() {
            return Err(Error::Config {
                message: "fetcher_name must not be empty".to_string(),
                key: Some("tools.fetcher_name".to_string()),
            });
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_fetcher_name() -> String {
    "yt-dlp".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_event_capacity() -> usize {
    1000
}

fn default_output_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_documented_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert!(config.tools.fetcher_path.is_none());
        assert!(config.tools.search_path);
        assert_eq!(config.tools.fetcher_name, "yt-dlp");
        assert_eq!(config.tools.probe_timeout, Duration::from_secs(60));
        assert!(config.queue.auto_advance);
        assert_eq!(config.queue.settle_delay, Duration::from_millis(1000));
        assert_eq!(config.queue.event_capacity, 1000);
        assert_eq!(config.defaults.media_type, MediaType::Video);
        assert_eq!(config.defaults.container, ContainerFormat::Best);
        assert_eq!(config.defaults.quality, "best");
        assert!(config.defaults.embed_metadata);
        assert!(config.defaults.embed_thumbnail);
        assert_eq!(config.defaults.sponsor_block, SponsorBlockMode::None);
    }

    #[test]
    fn durations_serialize_in_their_units() {
        let mut config = Config::default();
        config.queue.settle_delay = Duration::from_millis(250);
        config.tools.probe_timeout = Duration::from_secs(15);

        let json = serde_json::to_value(&config).expect("serialize failed");
        assert_eq!(json["queue"]["settle_delay"], 250);
        assert_eq!(json["tools"]["probe_timeout"], 15);

        let back: Config = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(back.queue.settle_delay, Duration::from_millis(250));
        assert_eq!(back.tools.probe_timeout, Duration::from_secs(15));
    }

    #[test]
    fn spec_for_copies_every_default() {
        let defaults = JobDefaults {
            media_type: MediaType::Audio,
            container: ContainerFormat::Flac,
            quality: "251".to_string(),
            output_dir: PathBuf::from("/music"),
            embed_metadata: false,
            embed_thumbnail: false,
            sponsor_block: SponsorBlockMode::AllSegments,
            cookie_file: Some(PathBuf::from("/cookies.txt")),
        };

        let spec = defaults.spec_for("https://example.com/track");

        assert_eq!(spec.url, "https://example.com/track");
        assert_eq!(spec.media_type, MediaType::Audio);
        assert_eq!(spec.container, ContainerFormat::Flac);
        assert_eq!(spec.quality, "251");
        assert_eq!(spec.output_dir, PathBuf::from("/music"));
        assert_eq!(spec.cookie_file, Some(PathBuf::from("/cookies.txt")));
        assert!(!spec.post_processing.embed_metadata);
        assert!(!spec.post_processing.embed_thumbnail);
        assert_eq!(
            spec.post_processing.sponsor_block,
            SponsorBlockMode::AllSegments
        );
    }

    #[test]
    fn validate_rejects_zero_event_capacity() {
        let mut config = Config::default();
        config.queue.event_capacity = 0;

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("queue.event_capacity"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_no_discovery_route() {
        let mut config = Config::default();
        config.tools.search_path = false;
        assert!(config.validate().is_err());

        config.tools.fetcher_path = Some(PathBuf::from("/usr/local/bin/yt-dlp"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
