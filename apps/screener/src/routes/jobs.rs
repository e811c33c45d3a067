//! Job, résumé, analysis and statistics endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{job::clean_job_name, Analysis, Job, JobUpdate, ResumeSummary};
use crate::screening::JobRequest;
use crate::state::AppState;
use crate::store::{DeletionCounts, StoreStats};

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteJobResponse {
    pub job_id: Uuid,
    pub deleted: DeletionCounts,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub backend: &'static str,
    #[serde(flatten)]
    pub counts: StoreStats,
}

async fn find_job(state: &AppState, id: Uuid) -> Result<Job, AppError> {
    state
        .store
        .get_job_details(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(state.store.get_jobs().await?))
}

/// POST /api/v1/jobs
///
/// 201 with the new job, or 200 with the existing job of the same
/// (normalized) name.
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let name = clean_job_name(&request.name)?;
    if let Some(existing) = state.store.get_job_by_name(&name).await? {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let job = state
        .batches
        .resolve_job(&JobRequest {
            name,
            description: request.description,
            job_id: None,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(find_job(&state, id).await?))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<Job>, AppError> {
    let update = update.validated()?;
    if update.is_empty() {
        return Err(AppError::Validation(
            "nothing to update: send name, description or status".to_string(),
        ));
    }
    state
        .store
        .update_job(id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))
}

/// DELETE /api/v1/jobs/:id
///
/// Removes the job with its analyses, file records and résumé summaries.
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteJobResponse>, AppError> {
    find_job(&state, id).await?;
    let deleted = state.store.delete_job_and_related(id).await?;
    Ok(Json(DeleteJobResponse {
        job_id: id,
        deleted,
    }))
}

/// GET /api/v1/jobs/:id/resumes
///
/// Highest score first, as ordered by the store.
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResumeSummary>>, AppError> {
    find_job(&state, id).await?;
    Ok(Json(state.store.get_resumes_by_job_id(id).await?))
}

/// GET /api/v1/jobs/:id/analyses
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Analysis>>, AppError> {
    find_job(&state, id).await?;
    Ok(Json(state.store.get_analyses_by_job_id(id).await?))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeSummary>, AppError> {
    state
        .store
        .get_resume_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("résumé {id} not found")))
}

/// GET /api/v1/stats
pub async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(StatsResponse {
        backend: state.store.backend(),
        counts: state.store.stats().await?,
    }))
}
