//! Submission, status, result and report endpoints.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use deckscore::service::JobStatusView;
use deckscore::{AnalysisResult, IncomingDocument, Submission, SubmitReceipt};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Name used when a file part carries no file name.
const UNNAMED_UPLOAD: &str = "upload";

/// POST /analyze - accepts `files` parts plus a `startup_name` (or `label`) field.
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SubmitReceipt>> {
    let mut label = None;
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" | "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| UNNAMED_UPLOAD.to_string());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read file '{}': {}", filename, e))
                })?;

                tracing::debug!("Received file {} ({} bytes)", filename, bytes.len());
                documents.push(IncomingDocument::new(
                    filename,
                    content_type.as_deref(),
                    bytes.to_vec(),
                ));
            }
            "startup_name" | "label" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                label = Some(text);
            }
            other => tracing::debug!("Ignoring unknown multipart field '{}'", other),
        }
    }

    let submission = Submission {
        label: label.unwrap_or_default(),
        documents,
    };

    // Writes the uploads and takes the database lock, so keep it off the async workers.
    let service = state.service.clone();
    let receipt = tokio::task::spawn_blocking(move || service.submit(submission))
        .await
        .map_err(|e| ApiError::internal(format!("Submission task failed: {}", e)))??;
    Ok(Json(receipt))
}

/// GET /analysis/:job_id/status
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    Ok(Json(state.service.status(&job_id)?))
}

/// GET /analysis/:job_id/result
pub async fn result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<AnalysisResult>> {
    Ok(Json(state.service.result(&job_id)?))
}

/// GET /analysis/:job_id/report - plain-text download.
pub async fn report(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let export = state.service.report(&job_id)?;

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.filename),
        ),
    ];

    Ok((headers, export.body))
}
