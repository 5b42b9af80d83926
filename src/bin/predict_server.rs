//! Server: accept CSV uploads on `POST /predict` and run the predictor on each.
//!
//! Usage: `predict_server [OPTIONS]`
//! Example: predict_server --bind 127.0.0.1:5000 --workdir backend
//!
//! Set RUST_LOG=solubility_gateway=debug for per-request pipeline events.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use solubility_gateway::config::{
  self, DEFAULT_BIND, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PROGRAM, DEFAULT_SCRIPT,
};
use solubility_gateway::{AppState, PredictorConfig, ServerConfig, serve, shutdown_signal};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Run the prediction upload server.
///
/// Every flag can also be set through the environment variable named in its help.
#[derive(Parser, Debug)]
#[command(name = "predict_server")]
#[command(after_help = r#"The predictor is launched as:
  <PREDICT_PROGRAM> <PREDICT_ARGS...> <absolute path of the uploaded CSV>
and must print a JSON array of objects on stdout and exit 0.

Examples:
  predict_server --workdir backend
  predict_server --predictor ./predict --predictor-arg= --timeout-secs 30"#)]
struct Args {
  /// Listen address.
  #[arg(long, env = "PREDICT_BIND", default_value = DEFAULT_BIND)]
  bind: String,

  /// Directory for temporary uploads. Default: <system temp>/predict-uploads
  #[arg(long, env = "PREDICT_UPLOAD_DIR", value_name = "DIR")]
  upload_dir: Option<PathBuf>,

  /// Predictor executable.
  #[arg(long, env = "PREDICT_PROGRAM", default_value = DEFAULT_PROGRAM)]
  predictor: String,

  /// Argument placed before the input path (repeatable). Empty values are dropped.
  #[arg(
    long = "predictor-arg",
    env = "PREDICT_ARGS",
    value_delimiter = ',',
    default_value = DEFAULT_SCRIPT
  )]
  predictor_args: Vec<String>,

  /// Working directory of the predictor (where its model files live).
  #[arg(long, env = "PREDICT_WORKDIR", value_name = "DIR")]
  workdir: Option<PathBuf>,

  /// Seconds before a running predictor is killed.
  #[arg(long, env = "PREDICT_TIMEOUT_SECS", default_value_t = 60)]
  timeout_secs: u64,

  /// Upload size ceiling in bytes.
  #[arg(long, env = "PREDICT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
  max_upload_bytes: u64,
}

impl Args {
  fn into_config(self) -> Result<ServerConfig, config::ConfigError> {
    let cfg = ServerConfig {
      bind: config::parse_bind(&self.bind)?,
      upload_dir: self.upload_dir.unwrap_or_else(config::default_upload_dir),
      max_upload_bytes: self.max_upload_bytes,
      predictor: PredictorConfig {
        program: self.predictor,
        args: self
          .predictor_args
          .into_iter()
          .filter(|a| !a.is_empty())
          .collect(),
        working_dir: self.workdir,
        timeout: Duration::from_secs(self.timeout_secs),
        ..PredictorConfig::default()
      },
    };
    cfg.validate()?;
    Ok(cfg)
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cfg = match Args::parse().into_config() {
    Ok(c) => c,
    Err(e) => {
      error!(error = %e, "invalid configuration");
      eprintln!("Error: {}", e);
      process::exit(1);
    }
  };
  info!(
    bind = %cfg.bind,
    upload_dir = %cfg.upload_dir.display(),
    program = %cfg.predictor.program,
    args = ?cfg.predictor.args,
    timeout_secs = cfg.predictor.timeout.as_secs(),
    max_upload_bytes = cfg.max_upload_bytes,
    "options (env or flags)"
  );

  let listener = match TcpListener::bind(cfg.bind).await {
    Ok(l) => l,
    Err(e) => {
      error!(bind = %cfg.bind, error = %e, "failed to bind");
      eprintln!("Error binding {}: {}", cfg.bind, e);
      process::exit(1);
    }
  };

  let state = Arc::new(AppState::from_config(&cfg));
  if let Err(e) = serve(listener, state, shutdown_signal()).await {
    error!(error = %e, "server error");
    process::exit(1);
  }
  info!("server stopped");
}
