use crate::compile::EngineInvocation;
use crate::error::LaunchError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Succeeded,
    /// Non-zero exit. `code` is `None` when the process died from a signal.
    Failed { code: Option<i32> },
    Cancelled,
}

/// Terminal record of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    outcome: RunOutcome,
    elapsed: Duration,
}

impl RunResult {
    pub fn new(outcome: RunOutcome, elapsed: Duration) -> Self {
        Self { outcome, elapsed }
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == RunOutcome::Cancelled
    }

    /// Exit code of a process that ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            RunOutcome::Succeeded => Some(0),
            RunOutcome::Failed { code } => code,
            RunOutcome::Cancelled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessSupervisor
// ---------------------------------------------------------------------------

/// Launches the engine and hands back a handle to the live process.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    engine: PathBuf,
}

impl ProcessSupervisor {
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
        }
    }

    /// The engine path compiled invocations should use.
    pub fn engine(&self) -> &Path {
        &self.engine
    }

    /// Spawn the invocation. Must be called from within a tokio runtime.
    ///
    /// Standard output and standard error are drained on their own tasks, so
    /// the caller is free to do other work while the engine runs.
    pub fn launch(&self, invocation: &EngineInvocation) -> Result<ProcessHandle, LaunchError> {
        let mut child = Command::new(invocation.program())
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(invocation.program(), e))?;

        let pid = child.id();
        tracing::info!(pid, program = %invocation.program().display(), "engine started");

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, line_tx.clone(), cancel_rx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, line_tx, cancel_rx.clone());
        }

        let started = Instant::now();
        let waiter = tokio::spawn(supervise(child, cancel_rx, started));

        Ok(ProcessHandle {
            lines: line_rx,
            canceller: Canceller(Arc::new(cancel_tx)),
            waiter: Some(waiter),
            result: None,
            pid,
        })
    }

    /// Ask the engine for its version banner.
    ///
    /// Returns the first banner line, or `EngineNotFound` when nothing runs
    /// at the configured path.
    pub async fn check_engine(&self) -> Result<String, LaunchError> {
        let output = Command::new(&self.engine)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(&self.engine, e))?;

        if !output.status.success() {
            return Err(LaunchError::EngineFailed(self.engine.clone()));
        }

        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }
}

fn spawn_error(program: &Path, e: std::io::Error) -> LaunchError {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            LaunchError::EngineNotFound(program.to_path_buf())
        }
        _ => LaunchError::Io(e),
    }
}

/// Wait for the child to exit or for cancellation, whichever comes first.
async fn supervise(
    mut child: Child,
    mut cancel_rx: watch::Receiver<bool>,
    started: Instant,
) -> RunResult {
    // A dropped sender means the handle is gone; treat that as a cancel too.
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel_rx.wait_for(|cancelled| *cancelled) => None,
    };

    let outcome = match exited {
        Some(Ok(status)) if status.success() => RunOutcome::Succeeded,
        Some(Ok(status)) => RunOutcome::Failed {
            code: status.code(),
        },
        Some(Err(e)) => {
            tracing::warn!("failed to wait for engine: {e}");
            RunOutcome::Failed { code: None }
        }
        None => {
            if let Err(e) = child.start_kill() {
                tracing::warn!("engine could not be killed: {e}");
            }
            // Reap so no zombie outlives the run.
            if let Err(e) = child.wait().await {
                tracing::warn!("failed to reap cancelled engine: {e}");
            }
            tracing::info!("engine cancelled");
            RunOutcome::Cancelled
        }
    };

    let result = RunResult::new(outcome, started.elapsed());
    tracing::info!(outcome = ?result.outcome(), elapsed = ?result.elapsed(), "engine finished");
    result
}

fn spawn_reader<R>(
    stream: R,
    tx: mpsc::UnboundedSender<String>,
    mut cancel_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LineSplitter::new(BufReader::new(stream));
        loop {
            tokio::select! {
                biased;
                _ = cancel_rx.wait_for(|cancelled| *cancelled) => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!("engine output closed: {e}");
                        break;
                    }
                },
            }
        }
    });
}

// ---------------------------------------------------------------------------
// ProcessHandle
// ---------------------------------------------------------------------------

/// Cloneable cancellation capability for a running process.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<watch::Sender<bool>>);

impl Canceller {
    /// Request termination. Calling this again, or after exit, does nothing.
    pub fn cancel(&self) {
        let already = self.0.send_replace(true);
        if !already {
            tracing::debug!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// The live engine process.
///
/// Output lines arrive through [`ProcessHandle::next_line`] in the order they
/// were read; the terminal status through [`ProcessHandle::wait`].
pub struct ProcessHandle {
    lines: mpsc::UnboundedReceiver<String>,
    canceller: Canceller,
    waiter: Option<JoinHandle<RunResult>>,
    result: Option<RunResult>,
    pid: Option<u32>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next line of merged stdout/stderr, or `None` once the engine has
    /// closed both streams or cancellation stopped the readers.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Wait for the process to finish. Later calls return the same result.
    pub async fn wait(&mut self) -> RunResult {
        if let Some(result) = &self.result {
            return result.clone();
        }
        let result = match self.waiter.take() {
            Some(waiter) => waiter.await.unwrap_or_else(|e| {
                tracing::warn!("engine supervisor task failed: {e}");
                RunResult::new(RunOutcome::Failed { code: None }, Duration::ZERO)
            }),
            None => RunResult::new(RunOutcome::Failed { code: None }, Duration::ZERO),
        };
        self.result = Some(result.clone());
        result
    }
}

// ---------------------------------------------------------------------------
// LineSplitter
// ---------------------------------------------------------------------------

/// Splits a byte stream on `\n`, `\r` and `\r\n`.
///
/// ffmpeg redraws its status line with bare carriage returns; splitting on
/// them lets each update through as soon as it is written. Invalid UTF-8 is
/// replaced rather than treated as an error.
struct LineSplitter<R> {
    reader: R,
    buf: Vec<u8>,
    after_cr: bool,
}

impl<R: AsyncBufRead + Unpin> LineSplitter<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            after_cr: false,
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let (used, terminated) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    if self.buf.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.take_line()));
                }

                // The `\n` of a `\r\n` pair closes nothing.
                if self.after_cr && available[0] == b'\n' {
                    self.after_cr = false;
                    (1, false)
                } else {
                    self.after_cr = false;
                    match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                        Some(i) => {
                            self.buf.extend_from_slice(&available[..i]);
                            self.after_cr = available[i] == b'\r';
                            (i + 1, true)
                        }
                        None => {
                            self.buf.extend_from_slice(available);
                            (available.len(), false)
                        }
                    }
                }
            };
            self.reader.consume(used);
            if terminated {
                return Ok(Some(self.take_line()));
            }
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
