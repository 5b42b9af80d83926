//! Successful `/predict` payload.

use serde::Serialize;

use super::PredictionRecord;

/// Records returned by the predictor, in the order it printed them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSet {
  pub success: bool,
  pub predictions: Vec<PredictionRecord>,
  pub count: usize,
}

impl PredictionSet {
  pub fn new(predictions: Vec<PredictionRecord>) -> Self {
    Self {
      success: true,
      count: predictions.len(),
      predictions,
    }
  }
}
