//! Helpers shared by unit tests: hand-built multipart requests and fake predictors.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{Request, header};

use crate::supervisor::Predictor;
use crate::types::Resolution;

pub(crate) const BOUNDARY: &str = "predict-test-boundary";

/// One part of a multipart/form-data body.
pub(crate) struct Part<'a> {
  pub name: &'a str,
  pub file_name: Option<&'a str>,
  pub content_type: Option<&'a str>,
  pub body: &'a [u8],
}

impl<'a> Part<'a> {
  pub fn csv(file_name: &'a str, body: &'a [u8]) -> Self {
    Self {
      name: "file",
      file_name: Some(file_name),
      content_type: Some("text/csv"),
      body,
    }
  }
}

pub(crate) fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
  let mut out = Vec::new();
  for p in parts {
    out.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", p.name);
    if let Some(f) = p.file_name {
      disposition.push_str(&format!("; filename=\"{}\"", f));
    }
    out.extend_from_slice(disposition.as_bytes());
    out.extend_from_slice(b"\r\n");
    if let Some(ct) = p.content_type {
      out.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(p.body);
    out.extend_from_slice(b"\r\n");
  }
  out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
  out
}

pub(crate) fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={}", BOUNDARY),
    )
    .body(Body::from(multipart_body(parts)))
    .unwrap()
}

pub(crate) async fn multipart(parts: &[Part<'_>]) -> Multipart {
  Multipart::from_request(multipart_request("/predict", parts), &())
    .await
    .unwrap()
}

/// Predictor that returns a canned resolution and records the paths it was given,
/// along with whether the file existed at call time.
pub(crate) struct FakePredictor {
  resolution: Box<dyn Fn(&Path) -> Resolution + Send + Sync>,
  pub calls: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakePredictor {
  pub fn new(f: impl Fn(&Path) -> Resolution + Send + Sync + 'static) -> Self {
    Self {
      resolution: Box::new(f),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn stdout(stdout: &str) -> Self {
    let stdout = stdout.to_string();
    Self::new(move |_| Resolution::Completed {
      exit_code: Some(0),
      stdout: stdout.clone(),
      stderr: String::new(),
    })
  }

  pub fn calls(&self) -> Vec<(PathBuf, bool)> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Predictor for FakePredictor {
  async fn predict(&self, input: &Path) -> Resolution {
    self
      .calls
      .lock()
      .unwrap()
      .push((input.to_path_buf(), input.exists()));
    (self.resolution)(input)
  }
}
