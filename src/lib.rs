//! # solubility-gateway
//!
//! HTTP gateway in front of a single-shot prediction program.
//!
//! ## Pipeline
//!
//! `POST /predict` takes a multipart `file` field and runs it through:
//!
//! - [upload_guard]: CSV type and size checks, then persists an [UploadedArtifact].
//! - [supervisor]: runs the [Predictor] on the artifact path with a hard timeout,
//!   draining stdout and stderr concurrently.
//! - [interpreter]: stdout must be a JSON array of records.
//!
//! The artifact removes itself on drop, so cleanup happens on every path.
//! Failures are [PipelineError]s, rendered as `{error, details?}`.

pub mod config;
pub mod error;
pub mod interpreter;
#[cfg(test)]
mod interpreter_test;
pub mod server;
pub mod supervisor;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod upload_guard;

pub use config::{PredictorConfig, ServerConfig};
pub use error::PipelineError;
pub use server::{AppState, router, serve, shutdown_signal};
pub use supervisor::{Predictor, ProcessPredictor};
pub use types::{FailureEnvelope, PredictionRecord, PredictionSet, Resolution, UploadedArtifact};
