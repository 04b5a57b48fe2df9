//! Parser for fetcher progress output
//!
//! Each line is classified on its own; there is no state between lines.

use serde::{Deserialize, Serialize};

/// Marker that precedes the output path
const DESTINATION_MARKER: &str = "Destination:";

/// Marker on progress lines
const DOWNLOAD_MARKER: &str = "[download]";

/// Structured information recognised in one output line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineEvent {
    /// Completion percentage, always within `0.0..=100.0`
    Progress {
        /// Percentage reported by the fetcher
        percent: f32,
    },
    /// File the fetcher is writing to
    Destination {
        /// Path as printed by the fetcher
        path: String,
    },
}

/// Classify one line of fetcher output
///
/// Returns `None` for lines that carry nothing structured, including progress
/// lines whose percentage does not parse. Never panics.
///
/// # Examples
///
/// ```
/// use media_dl::fetcher::{LineEvent, parse_line};
///
/// assert_eq!(
///     parse_line("[download]  42.0% of 10.00MiB"),
///     Some(LineEvent::Progress { percent: 42.0 })
/// );
/// assert_eq!(
///     parse_line("[download] Destination: /tmp/video.mp4"),
///     Some(LineEvent::Destination { path: "/tmp/video.mp4".into() })
/// );
/// assert_eq!(parse_line("[youtube] Extracting URL"), None);
/// ```
pub fn parse_line(line: &str) -> Option<LineEvent> {
    if let Some((_, rest)) = line.split_once(DESTINATION_MARKER) {
        let path = rest.trim();
        if path.is_empty() {
            return None;
        }
        return Some(LineEvent::Destination {
            path: path.to_string(),
        });
    }

    if line.contains(DOWNLOAD_MARKER) && line.contains('%') {
        return parse_percent(line).map(|percent| LineEvent::Progress { percent });
    }

    None
}

/// Token immediately before the first `%`, as a clamped percentage
fn parse_percent(line: &str) -> Option<f32> {
    let before = line.split('%').next()?;
    let token = before.split_whitespace().last()?;
    let value: f32 = token.parse().ok()?;

    if !value.is_finite() {
        return None;
    }

    Some(value.clamp(0.0, 100.0))
}
