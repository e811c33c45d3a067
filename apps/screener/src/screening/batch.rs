//! Batch Runner: fans résumé processing out over a bounded worker pool.
//!
//! Each (job, file) pair runs in its own task, gated by a semaphore sized to
//! the worker count. Outcomes come back over an mpsc channel in completion
//! order; one failure never stops the rest.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::processor::{
    CandidateProcessor, FailureKind, ProcessOutcome, ResumeUpload, SkipReason,
};
use super::uploads::{prepare_uploads, PreparedUploads};
use crate::models::{job::clean_job_name, Job, JobValidationError};
use crate::store::StoreError;

pub const DEFAULT_WORKERS: usize = 4;

/// Which job a batch is screened against.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub name: String,
    pub description: Option<String>,
    /// Reused as-is when it names an existing job.
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_files: Vec<String>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[ProcessOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                ProcessOutcome::Processed { .. } => summary.succeeded += 1,
                ProcessOutcome::Skipped { .. } => summary.skipped += 1,
                ProcessOutcome::Failed { file, .. } => {
                    summary.failed += 1;
                    summary.failed_files.push(file.clone());
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Jobs the files were screened against.
    pub jobs: Vec<Job>,
    /// True when at least one file was processed; skips do not count.
    pub any_success: bool,
    pub results: Vec<ProcessOutcome>,
    pub summary: BatchSummary,
}

impl BatchResult {
    fn new(jobs: Vec<Job>, results: Vec<ProcessOutcome>) -> Self {
        let summary = BatchSummary::from_outcomes(&results);
        Self {
            jobs,
            any_success: summary.succeeded > 0,
            results,
            summary,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid job: {0}")]
    InvalidJob(#[from] JobValidationError),

    #[error("store error while resolving job: {0}")]
    Store(#[from] StoreError),

    #[error("batch has no files")]
    NoFiles,

    #[error("no jobs to screen against")]
    NoJobs,
}

#[derive(Clone)]
pub struct BatchRunner {
    processor: CandidateProcessor,
    workers: usize,
}

impl BatchRunner {
    pub fn new(processor: CandidateProcessor, workers: usize) -> Self {
        Self {
            processor,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Existing id → that job; else existing name → that job; else a new job.
    pub async fn resolve_job(&self, request: &JobRequest) -> Result<Job, BatchError> {
        let store = self.processor.store();

        if let Some(id) = request.job_id {
            if let Some(job) = store.get_job_details(id).await? {
                return Ok(job);
            }
            warn!("Job {id} not found, resolving by name instead");
        }

        let name = clean_job_name(&request.name)?;
        if let Some(job) = store.get_job_by_name(&name).await? {
            return Ok(job);
        }

        let job = Job::new(&name, request.description.as_deref())?;
        match store.insert_job(&job).await {
            Ok(()) => {
                info!("Created job '{}' ({})", job.name, job.id);
                Ok(job)
            }
            // Lost a creation race against another request; use the winner.
            Err(StoreError::Conflict { .. }) => store
                .get_job_by_name(&name)
                .await?
                .ok_or(BatchError::Store(StoreError::Conflict {
                    table: crate::store::JOBS_TABLE,
                    key: name,
                })),
            Err(e) => Err(e.into()),
        }
    }

    /// Screens every file against one job.
    pub async fn run_batch(
        &self,
        files: Vec<ResumeUpload>,
        request: &JobRequest,
    ) -> Result<BatchResult, BatchError> {
        if files.is_empty() {
            return Err(BatchError::NoFiles);
        }
        let job = self.resolve_job(request).await?;
        self.run_matrix(files, vec![job]).await
    }

    /// Screens every file against every job.
    pub async fn run_matrix(
        &self,
        files: Vec<ResumeUpload>,
        jobs: Vec<Job>,
    ) -> Result<BatchResult, BatchError> {
        if files.is_empty() {
            return Err(BatchError::NoFiles);
        }
        if jobs.is_empty() {
            return Err(BatchError::NoJobs);
        }

        let PreparedUploads {
            uploads,
            duplicates,
        } = prepare_uploads(files);

        let shared_jobs: Vec<Arc<Job>> = jobs.iter().cloned().map(Arc::new).collect();
        let pairs: Vec<(Arc<Job>, ResumeUpload)> = shared_jobs
            .iter()
            .flat_map(|job| uploads.iter().map(move |u| (job.clone(), u.clone())))
            .collect();

        info!(
            "Running {} task(s): {} file(s) x {} job(s), {} worker(s)",
            pairs.len(),
            uploads.len(),
            jobs.len(),
            self.workers
        );

        let mut results = self.dispatch(pairs).await;

        for job in &jobs {
            results.extend(duplicates.iter().map(|dup| ProcessOutcome::Skipped {
                file: dup.file_name.clone(),
                job_id: job.id,
                resum_id: None,
                reason: SkipReason::DuplicateUpload,
            }));
        }

        let result = BatchResult::new(jobs, results);
        info!(
            "Batch finished: {} processed, {} skipped, {} failed",
            result.summary.succeeded, result.summary.skipped, result.summary.failed
        );
        Ok(result)
    }

    async fn dispatch(&self, pairs: Vec<(Arc<Job>, ResumeUpload)>) -> Vec<ProcessOutcome> {
        let expected = pairs.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel::<ProcessOutcome>(self.workers * 2);

        for (job, upload) in pairs {
            let semaphore = semaphore.clone();
            let processor = self.processor.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let file = upload.file_name.clone();
                let job_id = job.id;

                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        // Inner task so a panic in the pipeline is contained.
                        let work = tokio::spawn(async move { processor.process(&job, &upload).await });
                        match work.await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                error!("Worker for {file} crashed: {e}");
                                internal_failure(&file, job_id, format!("worker crashed: {e}"))
                            }
                        }
                    }
                    Err(_) => internal_failure(&file, job_id, "worker pool closed".to_string()),
                };

                if tx.send(outcome).await.is_err() {
                    warn!("Batch receiver dropped before {file} reported");
                }
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(expected);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn internal_failure(file: &str, job_id: Uuid, message: String) -> ProcessOutcome {
    ProcessOutcome::Failed {
        file: file.to_string(),
        job_id,
        kind: FailureKind::Internal,
        message,
    }
}
