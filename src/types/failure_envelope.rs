//! JSON body returned for every failed request.

use serde::{Deserialize, Serialize};

/// `{error, details?}`. `details` only carries the predictor's own diagnostics
/// or a parser message, never internal paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEnvelope {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub details: Option<String>,
}

impl FailureEnvelope {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }

  pub fn with_details(mut self, details: Option<String>) -> Self {
    self.details = details;
    self
  }
}
