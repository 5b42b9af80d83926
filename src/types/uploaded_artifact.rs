//! Temporary on-disk copy of one uploaded file.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension given to every persisted upload, whatever the client called it.
const ARTIFACT_EXTENSION: &str = "csv";

/// An uploaded file written to the upload directory for the lifetime of one request.
///
/// The file is removed when the value is dropped, so every exit path of the
/// request (including an unwinding panic) deletes it exactly once.
#[derive(Debug)]
pub struct UploadedArtifact {
  path: PathBuf,
  media_type: Option<String>,
  original_name: Option<String>,
  size: u64,
}

impl UploadedArtifact {
  /// Writes `bytes` to a freshly generated path under `dir`.
  ///
  /// The directory is created if missing. The file name is a random UUID so
  /// two uploads with the same client-side name never share a path.
  pub async fn persist(
    dir: &Path,
    media_type: Option<String>,
    original_name: Option<String>,
    bytes: &[u8],
  ) -> Result<Self, std::io::Error> {
    tokio::fs::create_dir_all(dir).await?;
    let dir = std::path::absolute(dir)?;
    let path = dir.join(format!("{}.{}", Uuid::new_v4(), ARTIFACT_EXTENSION));
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = options.open(&path).await?;
    // From here on the guard owns the file; a failed write still removes it.
    let artifact = Self {
      path,
      media_type,
      original_name,
      size: bytes.len() as u64,
    };
    file.write_all(bytes).await?;
    file.flush().await?;
    debug!(path = %artifact.path.display(), size = artifact.size, "upload persisted");
    Ok(artifact)
  }

  /// Absolute path of the persisted file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn media_type(&self) -> Option<&str> {
    self.media_type.as_deref()
  }

  pub fn original_name(&self) -> Option<&str> {
    self.original_name.as_deref()
  }

  /// Size in bytes of the persisted body.
  pub fn size(&self) -> u64 {
    self.size
  }

  /// Name safe to show to a client in place of [Self::path].
  pub fn display_name(&self) -> &str {
    self.original_name().unwrap_or("upload")
  }
}

impl Drop for UploadedArtifact {
  fn drop(&mut self) {
    // Blocking on purpose: a single unlink, and it must happen before the response is sent.
    match std::fs::remove_file(&self.path) {
      Ok(()) => debug!(path = %self.path.display(), "upload removed"),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove upload"),
    }
  }
}
