//! HTTP surface: `GET /health` and `POST /predict`.
//!
//! `/predict` composes the upload guard, the predictor and the interpreter.
//! The uploaded artifact lives in [run_prediction]'s frame, so it is deleted
//! before the response is built on every path, panics included.

use std::any::Any;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{PipelineError, Result};
use crate::interpreter::interpret;
use crate::supervisor::{Predictor, ProcessPredictor};
use crate::types::{FailureEnvelope, PredictionSet};
use crate::upload_guard::accept_upload;

/// Room left above the upload ceiling for multipart boundaries and part headers.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Immutable per-process state shared by all requests.
pub struct AppState {
  pub upload_dir: PathBuf,
  pub max_upload_bytes: u64,
  pub predictor: Arc<dyn Predictor>,
}

impl AppState {
  pub fn new(upload_dir: PathBuf, max_upload_bytes: u64, predictor: Arc<dyn Predictor>) -> Self {
    Self {
      upload_dir,
      max_upload_bytes,
      predictor,
    }
  }

  /// State backed by a [ProcessPredictor] built from `config`.
  pub fn from_config(config: &ServerConfig) -> Self {
    Self::new(
      config.upload_dir.clone(),
      config.max_upload_bytes,
      Arc::new(ProcessPredictor::new(&config.predictor)),
    )
  }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
  pub status: &'static str,
  /// RFC 3339 UTC with millisecond precision.
  pub timestamp: String,
}

pub fn router(state: Arc<AppState>) -> Router {
  let body_limit = usize::try_from(state.max_upload_bytes)
    .unwrap_or(usize::MAX)
    .saturating_add(MULTIPART_OVERHEAD_BYTES);
  Router::new()
    .route("/health", get(health))
    .route("/predict", post(predict))
    .fallback(not_found)
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(CatchPanicLayer::custom(panic_response))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

async fn health() -> Json<HealthStatus> {
  Json(HealthStatus {
    status: "OK",
    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
  })
}

async fn predict(
  State(state): State<Arc<AppState>>,
  multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
  match run_prediction(&state, multipart).await {
    Ok(set) => {
      info!(count = set.count, "prediction succeeded");
      (StatusCode::OK, Json(set)).into_response()
    }
    Err(e) => {
      if e.status().is_server_error() {
        error!(error = %e, details = ?e.details(), "prediction request failed");
      } else {
        warn!(error = %e, "prediction request rejected");
      }
      e.into_response()
    }
  }
}

/// Validates the upload, runs the predictor on it and interprets the result.
///
/// The artifact is dropped, and so removed from disk, when this returns.
pub async fn run_prediction(
  state: &AppState,
  multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<PredictionSet> {
  let multipart = multipart.map_err(|e| {
    debug!(error = %e, "request is not multipart");
    PipelineError::MissingInput
  })?;
  let artifact = accept_upload(multipart, &state.upload_dir, state.max_upload_bytes).await?;
  info!(
    file_name = artifact.display_name(),
    media_type = artifact.media_type().unwrap_or("-"),
    size = artifact.size(),
    "running prediction"
  );
  let resolution = state.predictor.predict(artifact.path()).await;
  debug!(resolution = %resolution, "predictor settled");
  interpret(resolution, &artifact)
}

async fn not_found() -> Response {
  (StatusCode::NOT_FOUND, Json(FailureEnvelope::new("Not found"))).into_response()
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
  let message = err
    .downcast_ref::<String>()
    .map(String::as_str)
    .or_else(|| err.downcast_ref::<&str>().copied())
    .unwrap_or("unknown panic");
  error!(panic = message, "request handler panicked");
  PipelineError::Internal(message.to_string()).into_response()
}

/// Serves `state` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
  F: Future<Output = ()> + Send + 'static,
{
  if let Ok(addr) = listener.local_addr() {
    info!(%addr, "listening");
  }
  axum::serve(listener, router(state))
    .with_graceful_shutdown(shutdown)
    .await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(error = %e, "cannot listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        error!(error = %e, "cannot listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!("shutdown signal received, no longer accepting connections");
}
