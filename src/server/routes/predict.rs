//! Image upload and prediction

use std::path::Path;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::inference::{is_allowed_extension, Label, ALLOWED_EXTENSIONS};
use crate::server::error::{Result, ServerError};
use crate::server::state::SharedState;
use crate::storage::PredictionRecord;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Label,
    /// Percentage, two decimals
    pub confidence: f64,
    pub filename: String,
}

/// Reduce a client supplied filename to a safe basename
///
/// Path components are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_` and leading dots are removed. May return an empty string.
pub fn sanitize_filename(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge
    } else {
        ServerError::Validation(format!("Malformed upload: {}", err.body_text()))
    }
}

/// Pull the `file` field out of the form and validate it
async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        if raw_name.trim().is_empty() {
            return Err(ServerError::Validation("No file selected".to_string()));
        }

        let filename = sanitize_filename(&raw_name);
        if filename.is_empty() {
            return Err(ServerError::Validation(format!("Invalid filename: {}", raw_name)));
        }
        if !is_allowed_extension(&filename) {
            return Err(ServerError::Validation(format!(
                "Invalid file type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(ServerError::Validation("Uploaded file is empty".to_string()));
        }

        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(ServerError::Validation("No file provided".to_string()))
}

async fn save_upload(dir: &Path, filename: &str, bytes: &[u8]) {
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join(filename), bytes).await
    }
    .await;

    if let Err(e) = result {
        warn!(dir = %dir.display(), filename, error = %e, "Could not save upload");
    }
}

/// POST /predict - multipart form with a `file` field
pub async fn predict(
    State(state): State<SharedState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>> {
    let multipart = multipart.map_err(|e| ServerError::Validation(e.body_text()))?;
    let upload = read_upload(multipart).await?;

    let predictor = state.predictor()?.clone();

    let Upload { filename, bytes } = upload;
    let (prediction, bytes) = tokio::task::spawn_blocking(move || {
        let prediction = predictor.predict_bytes(&bytes);
        (prediction, bytes)
    })
    .await
    .map_err(|e| ServerError::Processing(format!("inference task failed: {}", e)))?;
    let prediction = prediction?;

    if let Some(dir) = &state.config.upload_dir {
        save_upload(dir, &filename, &bytes).await;
    }

    if let Some(store) = state.store.clone() {
        // Timestamped here so history order follows request order even
        // though the writes complete in the background
        let record = PredictionRecord::new(filename.clone(), &prediction);
        tokio::spawn(async move {
            if let Err(e) = store.insert(&record).await {
                warn!(filename = %record.filename, error = %e, "Failed to store prediction");
            }
        });
    }

    info!(
        filename = %filename,
        prediction = %prediction.label,
        confidence = prediction.confidence_percent(),
        ms = prediction.inference_time_ms,
        "Prediction served"
    );

    Ok(Json(PredictResponse {
        prediction: prediction.label,
        confidence: prediction.confidence_percent(),
        filename,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd.png"), "passwd.png");
        assert_eq!(sanitize_filename("C:\\Users\\me\\scan.jpg"), "scan.jpg");
        assert_eq!(sanitize_filename("dir/"), "");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my scan (1).png"), "my_scan__1_.png");
        assert_eq!(sanitize_filename("röntgen.jpeg"), "r_ntgen.jpeg");
        assert_eq!(sanitize_filename("patient-01_a.JPG"), "patient-01_a.JPG");
    }

    #[test]
    fn test_sanitize_removes_leading_dots() {
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[tokio::test]
    async fn test_save_upload_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        save_upload(&target, "a.png", b"bytes").await;
        assert_eq!(std::fs::read(target.join("a.png")).unwrap(), b"bytes");

        // A file where the directory should be: logged, not raised
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        save_upload(&blocker, "b.png", b"bytes").await;
    }
}
