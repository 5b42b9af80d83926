//! Runs the external predictor on one input file.
//!
//! The pipeline only sees the [Predictor] trait; [ProcessPredictor] is the
//! implementation that spawns a child process. stdout and stderr are drained by
//! two tasks running alongside `wait()`, and the wait races a timer so a stuck
//! child is killed instead of holding the request open. Whichever of exit and
//! timer comes first decides the [Resolution]; the drains only get a short
//! grace period after that.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::PredictorConfig;
use crate::types::Resolution;

/// Read buffer size for the output drains.
const DRAIN_CHUNK: usize = 8 * 1024;

/// How long the drains may keep reading once the child has exited or been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Something that turns an input file into a [Resolution].
#[async_trait]
pub trait Predictor: Send + Sync {
  async fn predict(&self, input: &Path) -> Resolution;
}

/// Launches `<program> <args...> <input>` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessPredictor {
  program: String,
  args: Vec<String>,
  working_dir: Option<PathBuf>,
  timeout: Duration,
  max_output_bytes: usize,
}

impl ProcessPredictor {
  pub fn new(config: &PredictorConfig) -> Self {
    Self {
      program: config.program.clone(),
      args: config.args.clone(),
      working_dir: config.working_dir.clone(),
      timeout: config.timeout,
      max_output_bytes: config.max_output_bytes,
    }
  }

  fn command(&self, input: &Path) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd
      .args(&self.args)
      .arg(input)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(dir) = &self.working_dir {
      cmd.current_dir(dir);
    }
    cmd
  }
}

#[async_trait]
impl Predictor for ProcessPredictor {
  #[instrument(level = "debug", skip(self))]
  async fn predict(&self, input: &Path) -> Resolution {
    let started = Instant::now();
    let mut child = match self.command(input).spawn() {
      Ok(c) => c,
      Err(e) => {
        warn!(program = %self.program, error = %e, "failed to launch predictor");
        return Resolution::LaunchFailed(e.to_string());
      }
    };
    info!(program = %self.program, pid = ?child.id(), "predictor launched");

    let limit = self.max_output_bytes;
    let stdout_drain = Drain::spawn(child.stdout.take(), limit);
    let stderr_drain = Drain::spawn(child.stderr.take(), limit);

    let status = tokio::select! {
      status = child.wait() => status,
      _ = tokio::time::sleep(self.timeout) => {
        warn!(pid = ?child.id(), timeout = ?self.timeout, "predictor timed out, killing");
        if let Err(e) = child.start_kill() {
          warn!(error = %e, "failed to signal predictor");
        }
        if let Err(e) = child.wait().await {
          warn!(error = %e, "failed to reap predictor");
        }
        stdout_drain.stop();
        let stderr = stderr_drain.finish(DRAIN_GRACE).await;
        return Resolution::Timeout {
          after: self.timeout,
          stderr,
        };
      }
    };

    let status = match status {
      Ok(s) => s,
      Err(e) => {
        stdout_drain.stop();
        stderr_drain.stop();
        warn!(error = %e, "failed waiting on predictor");
        return Resolution::LaunchFailed(e.to_string());
      }
    };

    // A grandchild may still hold the pipes; the exit already decided the outcome.
    let (stdout, stderr) = tokio::join!(
      stdout_drain.finish(DRAIN_GRACE),
      stderr_drain.finish(DRAIN_GRACE)
    );

    debug!(
      exit_code = ?status.code(),
      stdout_bytes = stdout.len(),
      stderr_bytes = stderr.len(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "predictor finished"
    );
    Resolution::Completed {
      exit_code: status.code(),
      stdout,
      stderr,
    }
  }
}

/// Reads `stream` to EOF or until `stop` fires, keeping at most `limit` bytes.
///
/// Bytes past `limit` are still read so the child never blocks on a full pipe.
async fn drain<R: AsyncRead + Unpin>(
  mut stream: R,
  limit: usize,
  mut stop: oneshot::Receiver<()>,
) -> Vec<u8> {
  let mut kept = Vec::new();
  let mut buf = vec![0u8; DRAIN_CHUNK];
  let mut dropped = 0usize;
  loop {
    let read = tokio::select! {
      biased;
      _ = &mut stop => {
        debug!(kept = kept.len(), "output drain stopped before EOF");
        break;
      }
      read = stream.read(&mut buf) => read,
    };
    match read {
      Ok(0) => break,
      Ok(n) => {
        let room = limit.saturating_sub(kept.len());
        let take = room.min(n);
        kept.extend_from_slice(&buf[..take]);
        dropped += n - take;
      }
      Err(e) => {
        warn!(error = %e, "error reading predictor output");
        break;
      }
    }
  }
  if dropped > 0 {
    warn!(kept = kept.len(), dropped, "predictor output exceeded capture limit");
  }
  kept
}

/// One output stream being read by its own task.
struct Drain {
  task: JoinHandle<Vec<u8>>,
  stop: oneshot::Sender<()>,
}

impl Drain {
  fn spawn<R>(stream: Option<R>, limit: usize) -> Self
  where
    R: AsyncRead + Unpin + Send + 'static,
  {
    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
      match stream {
        Some(s) => drain(s, limit, stop_rx).await,
        None => Vec::new(),
      }
    });
    Self { task, stop }
  }

  /// Discards the stream without waiting for it.
  fn stop(self) {
    let _ = self.stop.send(());
  }

  /// Waits up to `grace` for EOF, then stops the drain and returns what it kept.
  async fn finish(mut self, grace: Duration) -> String {
    let within_grace = tokio::time::timeout(grace, &mut self.task).await;
    let bytes = match within_grace {
      Ok(joined) => joined.unwrap_or_default(),
      Err(_) => {
        warn!(?grace, "predictor output still open, keeping what was read");
        let _ = self.stop.send(());
        self.task.await.unwrap_or_default()
      }
    };
    String::from_utf8_lossy(&bytes).into_owned()
  }
}
