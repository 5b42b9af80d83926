//! Failure kinds of the upload → predictor → result pipeline.
//!
//! Every variant maps to a fixed HTTP status and a stable public message.
//! `details` only ever carries text produced by the predictor or a JSON parser.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::FailureEnvelope;

/// Result alias used across the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
  /// No `file` field in the request.
  #[error("No file uploaded")]
  MissingInput,

  /// The upload is not a CSV file, or the multipart body could not be read.
  #[error("{0}")]
  Validation(String),

  /// The upload exceeds the configured ceiling.
  #[error("File too large (max {})", format_size(*.limit))]
  PayloadTooLarge { limit: u64 },

  /// The predictor process could not be started.
  #[error("Failed to start prediction process")]
  LaunchFailed { details: String },

  /// The predictor did not finish before its deadline.
  #[error("Prediction timed out after {} seconds", format_secs(*.after))]
  Timeout {
    after: Duration,
    details: Option<String>,
  },

  /// The predictor exited non-zero or was killed by a signal.
  #[error("Prediction failed")]
  ComputationFailed { details: Option<String> },

  /// The predictor exited 0 but printed nothing.
  #[error("No output from prediction script")]
  EmptyOutput,

  /// stdout was not valid JSON. `raw` is kept for logs only.
  #[error("Failed to parse prediction results")]
  MalformedOutput { message: String, raw: String },

  /// stdout was JSON but not an array of records.
  #[error("Invalid prediction format: expected a JSON array of records")]
  UnexpectedShape { found: String },

  /// Anything the pipeline did not anticipate (I/O on the upload directory, a panic).
  #[error("Internal server error")]
  Internal(String),
}

impl PipelineError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  /// Client-caused failures answer 400, everything else 500.
  pub fn status(&self) -> StatusCode {
    match self {
      PipelineError::MissingInput
      | PipelineError::Validation(_)
      | PipelineError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Diagnostic text safe to return to the caller.
  pub fn details(&self) -> Option<String> {
    match self {
      PipelineError::LaunchFailed { details } => Some(details.clone()),
      PipelineError::Timeout { details, .. } | PipelineError::ComputationFailed { details } => {
        details.clone()
      }
      PipelineError::MalformedOutput { message, .. } => Some(message.clone()),
      PipelineError::UnexpectedShape { found } => Some(found.clone()),
      _ => None,
    }
  }

  pub fn envelope(&self) -> FailureEnvelope {
    FailureEnvelope::new(self.to_string()).with_details(self.details())
  }
}

impl IntoResponse for PipelineError {
  fn into_response(self) -> Response {
    (self.status(), Json(self.envelope())).into_response()
  }
}

/// Human-readable byte size, e.g. `10 MiB` or `512 bytes`.
pub(crate) fn format_size(bytes: u64) -> String {
  const MIB: u64 = 1024 * 1024;
  const KIB: u64 = 1024;
  if bytes >= MIB && bytes % MIB == 0 {
    format!("{} MiB", bytes / MIB)
  } else if bytes >= KIB && bytes % KIB == 0 {
    format!("{} KiB", bytes / KIB)
  } else {
    format!("{} bytes", bytes)
  }
}

/// Whole seconds as an integer, anything finer as a decimal (`60`, `0.5`).
pub(crate) fn format_secs(d: Duration) -> String {
  if d.subsec_nanos() == 0 {
    d.as_secs().to_string()
  } else {
    d.as_secs_f64().to_string()
  }
}
