//! Server and predictor settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// Wall-clock limit for one predictor run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Per-stream cap on captured predictor output. Bytes past it are read and dropped.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 32 * 1024 * 1024;
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_PROGRAM: &str = "python3";
pub const DEFAULT_SCRIPT: &str = "predict.py";
/// Directory name under the system temp dir used when none is configured.
pub const DEFAULT_UPLOAD_SUBDIR: &str = "predict-uploads";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("predictor program must not be empty")]
  EmptyProgram,
  #[error("predictor timeout must be greater than zero")]
  ZeroTimeout,
  #[error("upload size limit must be greater than zero")]
  ZeroUploadLimit,
  #[error("invalid bind address {0:?}")]
  InvalidBind(String),
}

/// How to launch the external predictor.
#[derive(Debug, Clone)]
pub struct PredictorConfig {
  /// Executable, resolved through `PATH` when not absolute.
  pub program: String,
  /// Arguments placed before the input path.
  pub args: Vec<String>,
  /// Working directory of the child (the model files live next to the script).
  pub working_dir: Option<PathBuf>,
  pub timeout: Duration,
  pub max_output_bytes: usize,
}

impl Default for PredictorConfig {
  fn default() -> Self {
    Self {
      program: DEFAULT_PROGRAM.to_string(),
      args: vec![DEFAULT_SCRIPT.to_string()],
      working_dir: None,
      timeout: DEFAULT_TIMEOUT,
      max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
    }
  }
}

impl PredictorConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.program.trim().is_empty() {
      return Err(ConfigError::EmptyProgram);
    }
    if self.timeout.is_zero() {
      return Err(ConfigError::ZeroTimeout);
    }
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub bind: SocketAddr,
  /// Where uploads are materialized for the duration of a request.
  pub upload_dir: PathBuf,
  pub max_upload_bytes: u64,
  pub predictor: PredictorConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
      upload_dir: default_upload_dir(),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
      predictor: PredictorConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_upload_bytes == 0 {
      return Err(ConfigError::ZeroUploadLimit);
    }
    self.predictor.validate()
  }
}

pub fn default_upload_dir() -> PathBuf {
  std::env::temp_dir().join(DEFAULT_UPLOAD_SUBDIR)
}

/// Parses a `host:port` listen address.
pub fn parse_bind(s: &str) -> Result<SocketAddr, ConfigError> {
  s.trim()
    .parse()
    .map_err(|_| ConfigError::InvalidBind(s.to_string()))
}
