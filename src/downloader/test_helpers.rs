//! Shared test helpers: a scripted in-memory fetcher and downloader setup.

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, FetcherProcess};
use crate::types::{Event, JobSpec};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Test-side control over a running scripted process
///
/// Lines sent here show up on the process output in order. The output stays
/// open until [`finish`](Self::finish) is called or the handle is dropped.
pub(crate) struct LiveHandle {
    tx: Option<mpsc::UnboundedSender<String>>,
    exit_tx: watch::Sender<Option<i32>>,
    terminated: CancellationToken,
}

impl LiveHandle {
    /// Emit one output line
    pub(crate) fn line(&self, line: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(line.into());
        }
    }

    /// Close the output and exit with `code`
    pub(crate) fn finish(&mut self, code: i32) {
        self.tx = None;
        self.exit_tx.send_replace(Some(code));
    }

    /// Whether the controller asked the process to terminate
    pub(crate) fn was_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }
}

/// Script for one spawn of a [`ScriptedFetcher`]
pub(crate) struct ScriptedRun {
    rx: mpsc::UnboundedReceiver<String>,
    exit_rx: watch::Receiver<Option<i32>>,
    terminated: CancellationToken,
    own_handle: Option<LiveHandle>,
    exit_code: i32,
    hold_open: bool,
    spawn_error: bool,
}

impl ScriptedRun {
    /// A run whose lines are fixed up front; exits with 0 unless told otherwise
    pub(crate) fn new() -> Self {
        let (run, handle) = Self::live();
        Self {
            own_handle: Some(handle),
            ..run
        }
    }

    /// A run driven from the test through the returned handle
    pub(crate) fn live() -> (Self, LiveHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let terminated = CancellationToken::new();

        let run = Self {
            rx,
            exit_rx,
            terminated: terminated.clone(),
            own_handle: None,
            exit_code: 0,
            hold_open: false,
            spawn_error: false,
        };
        let handle = LiveHandle {
            tx: Some(tx),
            exit_tx,
            terminated,
        };
        (run, handle)
    }

    /// A spawn attempt that fails like a missing executable
    pub(crate) fn spawn_failure() -> Self {
        Self {
            spawn_error: true,
            ..Self::new()
        }
    }

    /// Append an output line
    pub(crate) fn line(self, line: impl Into<String>) -> Self {
        if let Some(handle) = &self.own_handle {
            handle.line(line);
        }
        self
    }

    /// Exit code reported after the last line
    pub(crate) fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Keep the output open after the scripted lines, until terminated
    pub(crate) fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

struct ScriptedProcess {
    rx: mpsc::UnboundedReceiver<String>,
    exit_rx: watch::Receiver<Option<i32>>,
    terminated: CancellationToken,
    _own_handle: Option<LiveHandle>,
}

#[async_trait]
impl FetcherProcess for ScriptedProcess {
    async fn next_line(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            _ = self.terminated.cancelled() => None,
            line = self.rx.recv() => line,
        }
    }

    fn terminate(&mut self) {
        self.terminated.cancel();
    }

    async fn wait(&mut self) -> Result<i32> {
        if self.terminated.is_cancelled() {
            return Ok(-1);
        }
        tokio::select! {
            biased;
            _ = self.terminated.cancelled() => Ok(-1),
            code = self.exit_rx.wait_for(Option::is_some) => {
                Ok(code.ok().and_then(|c| *c).unwrap_or(-1))
            }
        }
    }
}

/// In-memory fetcher replaying scripted runs, one per spawn
///
/// Spawns beyond the scripted runs produce no output and exit with 0.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    runs: Mutex<VecDeque<ScriptedRun>>,
    spawned: Mutex<Vec<Vec<String>>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue the behaviour of the next spawn
    pub(crate) fn push_run(&self, run: ScriptedRun) {
        self.runs.lock().unwrap().push_back(run);
    }

    /// Queue a live run and return its control handle
    pub(crate) fn push_live(&self) -> LiveHandle {
        let (run, handle) = ScriptedRun::live();
        self.push_run(run);
        handle
    }

    /// Argument lists of every spawn attempt, in order
    pub(crate) fn spawned_args(&self) -> Vec<Vec<String>> {
        self.spawned.lock().unwrap().clone()
    }

    /// URL (last argument) of every spawn attempt, in order
    pub(crate) fn spawned_urls(&self) -> Vec<String> {
        self.spawned_args()
            .into_iter()
            .filter_map(|args| args.last().cloned())
            .collect()
    }
}

impl Fetcher for ScriptedFetcher {
    fn spawn(&self, args: &[String]) -> Result<Box<dyn FetcherProcess>> {
        self.spawned.lock().unwrap().push(args.to_vec());

        let run = self
            .runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ScriptedRun::new);

        if run.spawn_error {
            return Err(Error::Spawn {
                program: PathBuf::from("scripted-fetcher"),
                reason: "No such file or directory (os error 2)".to_string(),
            });
        }

        let own_handle = match run.own_handle {
            Some(mut handle) if !run.hold_open => {
                handle.finish(run.exit_code);
                None
            }
            other => other,
        };

        Ok(Box::new(ScriptedProcess {
            rx: run.rx,
            exit_rx: run.exit_rx,
            terminated: run.terminated,
            _own_handle: own_handle,
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Config tuned for tests: no auto-advance, no settle delay
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.queue.auto_advance = false;
    config.queue.settle_delay = Duration::from_millis(0);
    config
}

/// Create a test MediaDownloader backed by a scripted fetcher.
/// Returns the downloader, the fetcher and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader() -> (MediaDownloader, Arc<ScriptedFetcher>, tempfile::TempDir)
{
    create_test_downloader_with(test_config())
}

pub(crate) fn create_test_downloader_with(
    config: Config,
) -> (MediaDownloader, Arc<ScriptedFetcher>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let downloader = MediaDownloader::with_fetcher(config, fetcher.clone()).unwrap();
    (downloader, fetcher, temp_dir)
}

/// Job spec writing into the test's temp dir
pub(crate) fn test_spec(temp_dir: &tempfile::TempDir, url: &str) -> JobSpec {
    JobSpec::new(url, temp_dir.path().join("downloads"))
}

/// Receive events until `pred` matches, failing the test after `timeout`
pub(crate) async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut pred: F,
) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    panic!("event receiver lagged by {n} events")
                }
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Drain every event currently buffered in `rx`
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait until the controller is idle again
pub(crate) async fn wait_until_idle(downloader: &MediaDownloader) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while downloader.active_job().await.is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("controller never became idle");
}
