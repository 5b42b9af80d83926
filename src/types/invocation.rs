//! Terminal state of one predictor invocation.

use std::fmt;
use std::time::Duration;

/// How a single run of the external predictor settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// The process ran and exited on its own. `exit_code` is `None` when it was
  /// terminated by a signal.
  Completed {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
  },
  /// The process could not be started at all.
  LaunchFailed(String),
  /// The process outlived its deadline and was killed. `stderr` is whatever
  /// it wrote before that.
  Timeout { after: Duration, stderr: String },
}

impl fmt::Display for Resolution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resolution::Completed { exit_code: Some(code), .. } => write!(f, "exited with code {}", code),
      Resolution::Completed { exit_code: None, .. } => write!(f, "terminated by signal"),
      Resolution::LaunchFailed(cause) => write!(f, "launch failed: {}", cause),
      Resolution::Timeout { after, .. } => write!(f, "timed out after {:?}", after),
    }
  }
}
