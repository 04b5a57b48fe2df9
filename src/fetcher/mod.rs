//! External fetcher integration
//!
//! media-dl never downloads anything itself. It launches a yt-dlp compatible
//! command-line tool, reads its text output and looks at its exit code.
//!
//! ## Architecture
//!
//! - [`Fetcher`] / [`FetcherProcess`]: launching a process and reading its
//!   merged stdout and stderr line by line
//! - [`CliFetcher`]: the real implementation, running an executable found on
//!   PATH or configured explicitly
//! - [`build_args`]: encoding a [`JobSpec`](crate::JobSpec) into argv
//! - [`parse_line`]: classifying output lines into progress and destination
//! - [`probe_media`] / [`list_formats`]: one-shot metadata runs
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::fetcher::{CliFetcher, Fetcher, LineEvent, build_args, parse_line};
//! use media_dl::JobSpec;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = CliFetcher::from_path().expect("yt-dlp not found in PATH");
//!     let spec = JobSpec::new("https://example.com/watch?v=abc", "/tmp/videos");
//!
//!     let mut process = fetcher.spawn(&build_args(&spec))?;
//!     while let Some(line) = process.next_line().await {
//!         if let Some(LineEvent::Progress { percent }) = parse_line(&line) {
//!             println!("{percent:.1}%");
//!         }
//!     }
//!     println!("exit code {}", process.wait().await?);
//!
//!     Ok(())
//! }
//! ```

mod args;
mod cli;
mod parser;
mod probe;
mod process;
mod traits;

pub use args::{OUTPUT_TEMPLATE, build_args};
pub use cli::CliFetcher;
pub use parser::{LineEvent, parse_line};
pub use probe::{
    FormatEntry, MediaInfo, format_duration, format_list_args, list_formats, parse_format_list,
    parse_media_info, probe_args, probe_media,
};
pub use process::CliProcess;
pub use traits::{Fetcher, FetcherProcess};
