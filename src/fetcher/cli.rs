//! CLI-based fetcher using an external yt-dlp compatible binary

use super::process::CliProcess;
use super::traits::{Fetcher, FetcherProcess};
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Fetcher that runs an external executable
///
/// # Examples
///
/// ```no_run
/// use media_dl::fetcher::CliFetcher;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let fetcher = CliFetcher::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let fetcher = CliFetcher::from_path().expect("yt-dlp not found in PATH");
/// ```
#[derive(Clone, Debug)]
pub struct CliFetcher {
    binary_path: PathBuf,
}

impl CliFetcher {
    /// Create a new CLI fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `yt-dlp` in PATH
    pub fn from_path() -> Option<Self> {
        Self::from_name("yt-dlp")
    }

    /// Attempt to find an executable called `name` in PATH
    pub fn from_name(name: &str) -> Option<Self> {
        which::which(name).ok().map(Self::new)
    }

    /// Resolve the fetcher from tool settings
    ///
    /// An explicit `fetcher_path` wins. Otherwise PATH is searched for
    /// `fetcher_name` when `search_path` is enabled.
    pub fn from_config(tools: &ToolsConfig) -> Result<Self> {
        if let Some(path) = &tools.fetcher_path {
            if !path.exists() {
                return Err(Error::Config {
                    message: format!("fetcher binary not found at {}", path.display()),
                    key: Some("tools.fetcher_path".to_string()),
                });
            }
            return Ok(Self::new(path.clone()));
        }

        if tools.search_path {
            return Self::from_name(&tools.fetcher_name).ok_or_else(|| Error::Config {
                message: format!("{} not found in PATH", tools.fetcher_name),
                key: Some("tools.fetcher_name".to_string()),
            });
        }

        Err(Error::Config {
            message: "no fetcher_path set and PATH search disabled".to_string(),
            key: Some("tools.fetcher_path".to_string()),
        })
    }

    /// Path of the executable this fetcher runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

impl Fetcher for CliFetcher {
    fn spawn(&self, args: &[String]) -> Result<Box<dyn FetcherProcess>> {
        let process = CliProcess::spawn(&self.binary_path, args)?;
        Ok(Box::new(process))
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
