//! Turns a predictor [Resolution] into a [PredictionSet] or a typed failure.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::types::{PredictionRecord, PredictionSet, Resolution, UploadedArtifact};

/// Longest slice of raw stdout written to a log line.
const LOG_SNIPPET_BYTES: usize = 2048;

/// Interprets `resolution` for the upload it was run on.
///
/// Any text that reaches the caller has the artifact path replaced by the
/// upload's display name.
pub fn interpret(resolution: Resolution, artifact: &UploadedArtifact) -> Result<PredictionSet> {
  let redact = |s: &str| redact_path(s, artifact);
  match resolution {
    Resolution::LaunchFailed(cause) => Err(PipelineError::LaunchFailed {
      details: redact(&cause),
    }),
    Resolution::Timeout { after, stderr } => {
      let stderr = stderr.trim();
      Err(PipelineError::Timeout {
        after,
        details: (!stderr.is_empty()).then(|| redact(stderr)),
      })
    }
    Resolution::Completed {
      exit_code: Some(0),
      stdout,
      ..
    } => parse_predictions(&stdout).map_err(|e| match e {
      PipelineError::MalformedOutput { message, raw } => PipelineError::MalformedOutput {
        message: redact(&message),
        raw,
      },
      other => other,
    }),
    Resolution::Completed {
      exit_code,
      stdout,
      stderr,
    } => {
      warn!(exit_code = ?exit_code, stderr = %snippet(&stderr), "predictor failed");
      Err(PipelineError::ComputationFailed {
        details: failure_details(&stdout, &stderr).map(|d| redact(&d)),
      })
    }
  }
}

/// Parses predictor stdout: it must be a JSON array of objects.
pub fn parse_predictions(stdout: &str) -> Result<PredictionSet> {
  let text = stdout.trim();
  if text.is_empty() {
    warn!("predictor exited 0 without output");
    return Err(PipelineError::EmptyOutput);
  }
  let value: Value = serde_json::from_str(text).map_err(|e| {
    warn!(error = %e, stdout = %snippet(text), "predictor output is not JSON");
    PipelineError::MalformedOutput {
      message: e.to_string(),
      raw: stdout.to_string(),
    }
  })?;
  let items = match value {
    Value::Array(items) => items,
    other => {
      return Err(PipelineError::UnexpectedShape {
        found: format!("top-level value is {}", json_type(&other)),
      });
    }
  };
  let records = items
    .into_iter()
    .enumerate()
    .map(|(i, item)| match item {
      Value::Object(map) => Ok::<PredictionRecord, PipelineError>(map),
      other => Err(PipelineError::UnexpectedShape {
        found: format!("element {} is {}", i, json_type(&other)),
      }),
    })
    .collect::<Result<Vec<_>>>()?;
  debug!(count = records.len(), "parsed predictions");
  Ok(PredictionSet::new(records))
}

/// Diagnostics for a failed run: stderr if any, else the `error` field of a
/// `{"error": ..., "type": ...}` report printed on stdout.
fn failure_details(stdout: &str, stderr: &str) -> Option<String> {
  let stderr = stderr.trim();
  if !stderr.is_empty() {
    return Some(stderr.to_string());
  }
  serde_json::from_str::<Value>(stdout.trim())
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
}

fn redact_path(text: &str, artifact: &UploadedArtifact) -> String {
  match artifact.path().to_str() {
    Some(p) if !p.is_empty() => text.replace(p, artifact.display_name()),
    _ => text.to_string(),
  }
}

fn json_type(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

fn snippet(s: &str) -> &str {
  if s.len() <= LOG_SNIPPET_BYTES {
    return s;
  }
  let mut end = LOG_SNIPPET_BYTES;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  &s[..end]
}
