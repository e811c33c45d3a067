//! Axum route handlers for batch submission.

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::batch::{BatchResult, JobRequest};
use super::processor::ResumeUpload;
use crate::errors::AppError;
use crate::models::JobStatus;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Multipart parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BatchForm {
    job: JobRequest,
    files: Vec<ResumeUpload>,
}

/// Reads `job_name`, `job_description`, `job_id` and any number of `files`
/// (or `file`) parts. Unknown parts are ignored.
async fn read_batch_form(mut data: Multipart) -> Result<BatchForm, AppError> {
    let mut form = BatchForm::default();

    while let Some(field) = data.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "job_name" => form.job.name = field.text().await?,
            "job_description" => {
                let text = field.text().await?;
                form.job.description = (!text.trim().is_empty()).then_some(text);
            }
            "job_id" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    let id = Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::Validation(format!("invalid job_id '{raw}'")))?;
                    form.job.job_id = Some(id);
                }
            }
            "files" | "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.files.push(ResumeUpload::new(file_name, bytes));
            }
            _ => {}
        }
    }

    Ok(form)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/batches
///
/// Screens every uploaded file against one job, reusing it by id or name or
/// creating it. Per-file failures are reported in the body, not as an error status.
pub async fn handle_run_batch(
    State(state): State<AppState>,
    data: Multipart,
) -> Result<Json<BatchResult>, AppError> {
    let form = read_batch_form(data).await?;
    if form.job.job_id.is_none() && form.job.name.trim().is_empty() {
        return Err(AppError::Validation(
            "job_name or job_id is required".to_string(),
        ));
    }

    info!(
        "Batch request: {} file(s) for job '{}'",
        form.files.len(),
        form.job.name.trim()
    );
    let result = state.batches.run_batch(form.files, &form.job).await?;
    Ok(Json(result))
}

/// POST /api/v1/batches/matrix
///
/// Screens every uploaded file against every active job.
pub async fn handle_run_matrix(
    State(state): State<AppState>,
    data: Multipart,
) -> Result<Json<BatchResult>, AppError> {
    let form = read_batch_form(data).await?;

    let jobs: Vec<_> = state
        .store
        .get_jobs()
        .await?
        .into_iter()
        .filter(|job| job.status == JobStatus::Active)
        .collect();

    let result = state.batches.run_matrix(form.files, jobs).await?;
    Ok(Json(result))
}
