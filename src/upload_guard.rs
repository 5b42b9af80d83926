//! Validates the multipart `file` field and materializes it as an [UploadedArtifact].
//!
//! Type is checked from the part headers before any body byte is read; size is
//! checked while the body streams in. Nothing touches the disk until both pass.

use std::path::Path;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::BytesMut;
use tracing::{debug, error, warn};

use crate::error::{PipelineError, Result};
use crate::types::UploadedArtifact;

/// Multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";
pub const CSV_MEDIA_TYPE: &str = "text/csv";
pub const CSV_EXTENSION: &str = ".csv";
pub const NOT_CSV_MESSAGE: &str = "Only CSV files are allowed";

/// Accepts iff the declared media type is `text/csv` or the file name ends in `.csv`.
pub fn is_csv(media_type: Option<&str>, file_name: Option<&str>) -> bool {
  let type_ok = media_type
    .and_then(|t| t.split(';').next())
    .is_some_and(|t| t.trim().eq_ignore_ascii_case(CSV_MEDIA_TYPE));
  let name_ok = file_name.is_some_and(|n| n.to_ascii_lowercase().ends_with(CSV_EXTENSION));
  type_ok || name_ok
}

/// Strips any directory part a client put in the file name.
fn base_name(name: &str) -> String {
  name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

/// Reads the first `file` field of `multipart` and writes it under `upload_dir`.
///
/// Fails with [PipelineError::MissingInput] when no such field exists,
/// [PipelineError::Validation] for non-CSV uploads and
/// [PipelineError::PayloadTooLarge] once the body passes `max_bytes`.
pub async fn accept_upload(
  mut multipart: Multipart,
  upload_dir: &Path,
  max_bytes: u64,
) -> Result<UploadedArtifact> {
  let map_err = |e: MultipartError| multipart_error(e, max_bytes);
  while let Some(mut field) = multipart.next_field().await.map_err(map_err)? {
    if field.name() != Some(FILE_FIELD) {
      debug!(field = ?field.name(), "skipping multipart field");
      continue;
    }
    let media_type = field.content_type().map(str::to_string);
    let original_name = field.file_name().map(base_name);
    if !is_csv(media_type.as_deref(), original_name.as_deref()) {
      warn!(media_type = ?media_type, file_name = ?original_name, "rejected non-CSV upload");
      return Err(PipelineError::validation(NOT_CSV_MESSAGE));
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(map_err)? {
      if (body.len() + chunk.len()) as u64 > max_bytes {
        warn!(file_name = ?original_name, limit = max_bytes, "rejected oversized upload");
        return Err(PipelineError::PayloadTooLarge { limit: max_bytes });
      }
      body.extend_from_slice(&chunk);
    }

    return UploadedArtifact::persist(upload_dir, media_type, original_name, &body)
      .await
      .map_err(|e| {
        error!(error = %e, "failed to persist upload");
        PipelineError::Internal(e.to_string())
      });
  }
  Err(PipelineError::MissingInput)
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> PipelineError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    PipelineError::PayloadTooLarge { limit: max_bytes }
  } else {
    PipelineError::validation(format!("Invalid multipart body: {}", e.body_text()))
  }
}
