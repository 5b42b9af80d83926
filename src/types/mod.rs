//! Values that flow through one `/predict` request.
//!
//! An [UploadedArtifact] is created by the upload guard, handed to a
//! [Predictor](crate::supervisor::Predictor) which yields a [Resolution], and
//! the interpreter turns that into a [PredictionSet] or a
//! [PipelineError](crate::error::PipelineError) rendered as a [FailureEnvelope].

use serde_json::{Map, Value};

mod failure_envelope;
mod invocation;
mod prediction_set;
mod uploaded_artifact;

pub use failure_envelope::FailureEnvelope;
pub use invocation::Resolution;
pub use prediction_set::PredictionSet;
pub use uploaded_artifact::UploadedArtifact;

/// One output row of the predictor: an open field-name to value mapping.
pub type PredictionRecord = Map<String, Value>;
