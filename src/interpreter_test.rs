//! Tests for the result interpreter.

use std::time::Duration;

use serde_json::json;

use crate::error::PipelineError;
use crate::interpreter::{interpret, parse_predictions};
use crate::types::{Resolution, UploadedArtifact};

async fn artifact(dir: &tempfile::TempDir) -> UploadedArtifact {
  UploadedArtifact::persist(dir.path(), None, Some("mols.csv".into()), b"SMILES\nC\n")
    .await
    .unwrap()
}

fn exited(code: i32, stdout: &str, stderr: &str) -> Resolution {
  Resolution::Completed {
    exit_code: Some(code),
    stdout: stdout.into(),
    stderr: stderr.into(),
  }
}

#[test]
fn parses_array_of_records() {
  let set = parse_predictions(r#"[{"a":1}]"#).unwrap();
  assert_eq!(set.count, 1);
  assert_eq!(
    serde_json::to_value(&set).unwrap(),
    json!({"success": true, "predictions": [{"a": 1}], "count": 1})
  );
}

#[test]
fn tolerates_surrounding_whitespace() {
  let set = parse_predictions("\n  [{\"a\":1},{\"b\":\"x\"}]\n").unwrap();
  assert_eq!(set.count, 2);
}

#[test]
fn empty_array_is_success() {
  assert_eq!(parse_predictions("[]").unwrap().count, 0);
}

#[test]
fn blank_output_is_empty_output() {
  assert!(matches!(parse_predictions(""), Err(PipelineError::EmptyOutput)));
  assert!(matches!(parse_predictions(" \n\t"), Err(PipelineError::EmptyOutput)));
}

#[test]
fn invalid_json_is_malformed_and_keeps_raw() {
  match parse_predictions("Loaded 3 rows\n[{") {
    Err(PipelineError::MalformedOutput { message, raw }) => {
      assert!(!message.is_empty());
      assert_eq!(raw, "Loaded 3 rows\n[{");
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn object_is_not_wrapped_into_a_list() {
  match parse_predictions(r#"{"a":1}"#) {
    Err(PipelineError::UnexpectedShape { found }) => assert!(found.contains("an object")),
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn scalar_is_unexpected_shape() {
  assert!(matches!(
    parse_predictions("42"),
    Err(PipelineError::UnexpectedShape { .. })
  ));
}

#[test]
fn non_object_element_is_unexpected_shape() {
  match parse_predictions(r#"[{"a":1}, 2]"#) {
    Err(PipelineError::UnexpectedShape { found }) => assert_eq!(found, "element 1 is a number"),
    other => panic!("unexpected {:?}", other),
  }
}

#[tokio::test]
async fn exit_zero_is_parsed() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  let set = interpret(exited(0, r#"[{"a":1}]"#, "INFO: done"), &a).unwrap();
  assert_eq!(set.count, 1);
}

#[tokio::test]
async fn nonzero_exit_is_computation_failed_with_stderr() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  let err = interpret(exited(1, "[]", "ValueError: no SMILES column\n"), &a).unwrap_err();
  match err {
    PipelineError::ComputationFailed { details } => {
      assert_eq!(details.as_deref(), Some("ValueError: no SMILES column"))
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[tokio::test]
async fn nonzero_exit_falls_back_to_stdout_error_report() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  let stdout = r#"{"error": "Input CSV is empty", "type": "ValueError"}"#;
  match interpret(exited(1, stdout, ""), &a).unwrap_err() {
    PipelineError::ComputationFailed { details } => {
      assert_eq!(details.as_deref(), Some("Input CSV is empty"))
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[tokio::test]
async fn nonzero_exit_without_diagnostics_has_no_details() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  match interpret(exited(2, "", ""), &a).unwrap_err() {
    PipelineError::ComputationFailed { details } => assert!(details.is_none()),
    other => panic!("unexpected {:?}", other),
  }
}

#[tokio::test]
async fn signal_kill_is_computation_failed() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  let r = Resolution::Completed {
    exit_code: None,
    stdout: r#"[{"a":1}]"#.into(),
    stderr: String::new(),
  };
  assert!(matches!(
    interpret(r, &a),
    Err(PipelineError::ComputationFailed { .. })
  ));
}

#[tokio::test]
async fn stderr_details_never_contain_artifact_path() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  let path = a.path().display().to_string();
  let stderr = format!("FileNotFoundError: Input file not found: {}", path);
  match interpret(exited(1, "", &stderr), &a).unwrap_err() {
    PipelineError::ComputationFailed { details } => {
      let d = details.unwrap();
      assert!(!d.contains(&path));
      assert_eq!(d, "FileNotFoundError: Input file not found: mols.csv");
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[tokio::test]
async fn launch_failure_and_timeout_short_circuit() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  assert!(matches!(
    interpret(Resolution::LaunchFailed("No such file or directory (os error 2)".into()), &a),
    Err(PipelineError::LaunchFailed { .. })
  ));
  assert!(matches!(
    interpret(
      Resolution::Timeout {
        after: Duration::from_secs(60),
        stderr: "  \n".into(),
      },
      &a
    ),
    Err(PipelineError::Timeout { details: None, .. })
  ));
}

#[tokio::test]
async fn timeout_keeps_stderr_with_path_redacted() {
  let dir = tempfile::tempdir().unwrap();
  let a = artifact(&dir).await;
  let stderr = format!("reading {}\nloading model...\n", a.path().display());
  match interpret(
    Resolution::Timeout {
      after: Duration::from_millis(500),
      stderr,
    },
    &a,
  ) {
    Err(e @ PipelineError::Timeout { .. }) => {
      assert_eq!(e.to_string(), "Prediction timed out after 0.5 seconds");
      assert_eq!(
        e.details().as_deref(),
        Some("reading mols.csv\nloading model...")
      );
    }
    other => panic!("unexpected {:?}", other),
  }
}
