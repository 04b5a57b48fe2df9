//! Traits for launching and driving a fetcher process

use async_trait::async_trait;

/// A running fetcher process
///
/// One instance exists per job execution. The line stream yields merged
/// stdout and stderr in arrival order and ends when both are closed. It
/// cannot be restarted; spawn a new process instead.
#[async_trait]
pub trait FetcherProcess: Send {
    /// Next output line without its terminator, or `None` at end of output
    ///
    /// Must be cancel-safe: dropping the future before it resolves never
    /// loses a line.
    async fn next_line(&mut self) -> Option<String>;

    /// Ask the process to exit (SIGTERM on Unix)
    ///
    /// Best effort and idempotent. Calling it after the process has exited
    /// does nothing.
    fn terminate(&mut self);

    /// Force the process down without waiting for it to clean up
    ///
    /// Used when a terminated process keeps its output open. Defaults to
    /// [`terminate`](Self::terminate).
    fn kill(&mut self) {
        self.terminate();
    }

    /// Wait for the process to exit and return its exit code
    ///
    /// A process ended by a signal reports `-1`.
    async fn wait(&mut self) -> crate::Result<i32>;
}

/// Something that can launch fetcher processes
///
/// The controller calls [`spawn`](Self::spawn) once per job with the argument
/// list produced by [`build_args`](super::build_args). Implementations other
/// than [`CliFetcher`](super::CliFetcher) are mostly useful for tests.
///
/// # Examples
///
/// ```no_run
/// use media_dl::fetcher::{CliFetcher, Fetcher};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = CliFetcher::from_path().expect("yt-dlp not found in PATH");
/// let mut process = fetcher.spawn(&["--version".to_string()])?;
/// while let Some(line) = process.next_line().await {
///     println!("{line}");
/// }
/// let code = process.wait().await?;
/// assert_eq!(code, 0);
/// # Ok(())
/// # }
/// ```
pub trait Fetcher: Send + Sync {
    /// Launch the fetcher with `args`
    ///
    /// Fails with [`Error::Spawn`](crate::Error::Spawn) when the executable
    /// cannot be started. Must be called from within a tokio runtime.
    fn spawn(&self, args: &[String]) -> crate::Result<Box<dyn FetcherProcess>>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}
