//! Child process wrapper with a merged line stream

use super::traits::FetcherProcess;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Lines buffered between the pipe readers and the consumer
const LINE_BUFFER: usize = 256;

/// A fetcher child process
///
/// Two reader tasks forward stdout and stderr into one channel, so the
/// consumer sees a single stream without caring which pipe a line came from.
/// The child is killed if this value is dropped while it is still running.
pub struct CliProcess {
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl CliProcess {
    /// Spawn `program` with `args`, capturing both output pipes
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn {
                program: program.to_path_buf(),
                reason: e.to_string(),
            })?;

        let (tx, lines) = mpsc::channel(LINE_BUFFER);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        tracing::debug!(
            program = %program.display(),
            pid = child.id(),
            "fetcher process spawned"
        );

        Ok(Self { child, lines })
    }

    /// OS process id, `None` once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Read `reader` line by line into `tx` until EOF or the receiver goes away
///
/// Invalid UTF-8 is replaced rather than rejected; progress output from some
/// extractors contains raw title bytes.
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "fetcher output pipe closed with error");
                break;
            }
        }
    }
}

#[async_trait]
impl FetcherProcess for CliProcess {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    #[cfg(unix)]
    fn terminate(&mut self) {
        // `id()` is None once the child has been reaped, so a recycled pid is
        // never signalled.
        if let Some(pid) = self.child.id() {
            // SAFETY: `kill` has no memory-safety preconditions. The pid
            // belongs to our own unreaped child, so it still refers to that
            // process (possibly as a zombie, where the signal is a no-op).
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                tracing::debug!(
                    pid,
                    error = %std::io::Error::last_os_error(),
                    "SIGTERM delivery failed"
                );
            }
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "terminate on exited fetcher ignored");
        }
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "kill on exited fetcher ignored");
        }
    }

    async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }
}
