//! One-shot fetcher runs that read metadata instead of downloading
//!
//! A presentation layer uses these to show what a URL points at and to offer
//! a quality selector before the job is enqueued. Probes never touch the
//! queue or the active slot; they spawn their own short-lived process.

use super::traits::{Fetcher, FetcherProcess};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Output lines kept for the error message of a failed probe
const ERROR_TAIL_LINES: usize = 5;

/// Metadata reported by `--dump-json`
///
/// Only the fields media-dl uses are kept; everything else in the fetcher's
/// JSON is ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Extractor-specific media id
    #[serde(default)]
    pub id: Option<String>,
    /// Media title
    #[serde(default)]
    pub title: Option<String>,
    /// Length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Thumbnail URL
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Channel or uploader name
    #[serde(default)]
    pub uploader: Option<String>,
    /// Canonical page URL
    #[serde(default)]
    pub webpage_url: Option<String>,
}

impl MediaInfo {
    /// Duration as `h:mm:ss` or `m:ss`, `None` when unknown or zero
    pub fn duration_text(&self) -> Option<String> {
        self.duration.and_then(format_duration)
    }
}

/// Format `seconds` as `h:mm:ss`, or `m:ss` below one hour
///
/// Fractional seconds are truncated. Zero, negative and non-finite inputs
/// yield `None`.
pub fn format_duration(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds < 1.0 {
        return None;
    }

    let total = seconds as u64;
    let (minutes, secs) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        Some(format!("{hours}:{minutes:02}:{secs:02}"))
    } else {
        Some(format!("{minutes}:{secs:02}"))
    }
}

/// One row of `--list-formats` output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatEntry {
    /// Value to use as a job's quality token
    pub format_id: String,
    /// File extension
    pub ext: String,
    /// Resolution column (`1920x1080`, `audio`, ...)
    pub resolution: String,
    /// Size column when the fetcher knows it (`12.34MiB`)
    pub filesize: Option<String>,
}

impl FormatEntry {
    /// Human-readable label for a selector, e.g. `137 - 1920x1080 - mp4 - 80.2MiB`
    pub fn label(&self) -> String {
        let mut label = format!("{} - {} - {}", self.format_id, self.resolution, self.ext);
        if let Some(size) = &self.filesize {
            label.push_str(" - ");
            label.push_str(size);
        }
        label
    }
}

/// Arguments for a metadata probe
pub fn probe_args(url: &str, cookie_file: Option<&Path>) -> Vec<String> {
    one_shot_args("--dump-json", url, cookie_file)
}

/// Arguments for a format listing
pub fn format_list_args(url: &str, cookie_file: Option<&Path>) -> Vec<String> {
    one_shot_args("--list-formats", url, cookie_file)
}

fn one_shot_args(mode: &str, url: &str, cookie_file: Option<&Path>) -> Vec<String> {
    let mut args = vec![mode.to_string(), "--no-warnings".to_string(), url.to_string()];
    if let Some(cookies) = cookie_file
        && !cookies.as_os_str().is_empty()
    {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }
    args
}

/// Extract the metadata object from probe output
///
/// The fetcher prints one JSON object per line; the first object wins.
pub fn parse_media_info(lines: &[String]) -> Result<MediaInfo> {
    let json = lines
        .iter()
        .map(|l| l.trim())
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| Error::ExternalTool("fetcher printed no metadata".to_string()))?;

    Ok(serde_json::from_str(json)?)
}

/// Extract format rows from `--list-formats` output
///
/// Informational lines (`[youtube] ...`), the column header, separator rules
/// and fetcher warnings are skipped. A row needs at least id, extension and
/// resolution.
pub fn parse_format_list(lines: &[String]) -> Vec<FormatEntry> {
    let mut formats = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('[')
            || trimmed.starts_with("WARNING:")
            || trimmed.starts_with("ERROR:")
            || trimmed.starts_with('-')
            || trimmed.starts_with('\u{2500}')
        {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 3 || parts[0] == "ID" || parts[0] == "format" {
            continue;
        }

        let filesize = parts
            .iter()
            .map(|p| p.trim_start_matches(['~', '\u{2248}']))
            .find(|p| p.ends_with("KiB") || p.ends_with("MiB") || p.ends_with("GiB"))
            .map(str::to_string);

        formats.push(FormatEntry {
            format_id: parts[0].to_string(),
            ext: parts[1].to_string(),
            resolution: parts[2].to_string(),
            filesize,
        });
    }

    formats
}

/// Read a URL's metadata
pub async fn probe_media(
    fetcher: &dyn Fetcher,
    url: &str,
    cookie_file: Option<&Path>,
    timeout: Duration,
) -> Result<MediaInfo> {
    let lines = run_to_completion(fetcher, &probe_args(url, cookie_file), timeout).await?;
    parse_media_info(&lines)
}

/// List the formats available for a URL
pub async fn list_formats(
    fetcher: &dyn Fetcher,
    url: &str,
    cookie_file: Option<&Path>,
    timeout: Duration,
) -> Result<Vec<FormatEntry>> {
    let lines = run_to_completion(fetcher, &format_list_args(url, cookie_file), timeout).await?;
    Ok(parse_format_list(&lines))
}

/// Spawn, collect every output line and require exit code 0
async fn run_to_completion(
    fetcher: &dyn Fetcher,
    args: &[String],
    timeout: Duration,
) -> Result<Vec<String>> {
    let mut process = fetcher.spawn(args)?;

    let collected = tokio::time::timeout(timeout, collect_lines(process.as_mut())).await;
    let lines = match collected {
        Ok(lines) => lines,
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "fetcher probe timed out");
            process.kill();
            let _ = process.wait().await;
            return Err(Error::ExternalTool(format!(
                "fetcher probe timed out after {}s",
                timeout.as_secs()
            )));
        }
    };

    let code = process.wait().await?;
    if code != 0 {
        let tail_start = lines.len().saturating_sub(ERROR_TAIL_LINES);
        return Err(Error::ExternalTool(format!(
            "fetcher exited with code {code}: {}",
            lines[tail_start..].join("\n")
        )));
    }

    Ok(lines)
}

async fn collect_lines(process: &mut dyn FetcherProcess) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = process.next_line().await {
        lines.push(line);
    }
    lines
}
