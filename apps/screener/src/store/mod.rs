//! Store: the remote relational store holding jobs, résumé summaries,
//! analyses and file records.
//!
//! Every consumer holds an `Arc<dyn Store>` built once at startup. Upserts are
//! keyed by the conflict column of each table (`id`, `resum_id`, `file_path`)
//! so a retried write is harmless.

pub mod memory;
pub mod postgres;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Analysis, FileRecord, Job, JobUpdate, ResumeSummary};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use supabase::SupabaseStore;

pub const JOBS_TABLE: &str = "jobs";
pub const RESUMS_TABLE: &str = "resums";
pub const ANALYSIS_TABLE: &str = "analysis";
pub const FILES_TABLE: &str = "files";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode store payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("duplicate key in {table}: {key}")]
    Conflict { table: &'static str, key: String },

    #[error("job deletion stopped after {counts}: {source}")]
    PartialDelete {
        counts: DeletionCounts,
        #[source]
        source: Box<StoreError>,
    },
}

/// Rows removed by a cascading job delete, per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionCounts {
    pub analysis: u64,
    pub files: u64,
    pub resums: u64,
    pub jobs: u64,
}

impl std::fmt::Display for DeletionCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "analysis={} files={} resums={} jobs={}",
            self.analysis, self.files, self.resums, self.jobs
        )
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub jobs: u64,
    pub resums: u64,
    pub analysis: u64,
    pub files: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend label for logs.
    fn backend(&self) -> &'static str;

    // Jobs
    async fn insert_job(&self, job: &Job) -> Result<(), StoreError>;
    async fn get_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError>;
    async fn get_jobs(&self) -> Result<Vec<Job>, StoreError>;
    async fn get_job_details(&self, id: Uuid) -> Result<Option<Job>, StoreError>;
    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, StoreError>;

    // Résumé summaries
    async fn upsert_resume(&self, resume: &ResumeSummary) -> Result<(), StoreError>;
    async fn get_resume_by_id(&self, id: Uuid) -> Result<Option<ResumeSummary>, StoreError>;
    async fn get_resumes_by_job_id(&self, job_id: Uuid)
        -> Result<Vec<ResumeSummary>, StoreError>;

    // Analyses
    async fn upsert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError>;
    async fn get_analyses_by_job_id(&self, job_id: Uuid) -> Result<Vec<Analysis>, StoreError>;

    // Files
    async fn upsert_file(&self, file: &FileRecord) -> Result<(), StoreError>;
    async fn find_files_by_original_name(
        &self,
        original_name: &str,
    ) -> Result<Vec<FileRecord>, StoreError>;

    // Per-table deletes used by the cascade. Each returns the number of rows removed.
    async fn delete_analyses_by_job(&self, job_id: Uuid) -> Result<u64, StoreError>;
    async fn delete_files_by_job(&self, job_id: Uuid) -> Result<u64, StoreError>;
    async fn delete_resumes_by_job(&self, job_id: Uuid) -> Result<u64, StoreError>;
    async fn delete_job(&self, job_id: Uuid) -> Result<u64, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Deletes a job and everything referencing it: analyses and files first,
    /// then résumé summaries, then the job row.
    ///
    /// Not transactional. When a step fails the error carries the counts of
    /// the steps that already ran; the remaining rows are left as orphans.
    async fn delete_job_and_related(&self, job_id: Uuid) -> Result<DeletionCounts, StoreError> {
        let mut counts = DeletionCounts::default();

        counts.analysis = self
            .delete_analyses_by_job(job_id)
            .await
            .map_err(|e| partial_delete(ANALYSIS_TABLE, job_id, counts, e))?;
        counts.files = self
            .delete_files_by_job(job_id)
            .await
            .map_err(|e| partial_delete(FILES_TABLE, job_id, counts, e))?;
        counts.resums = self
            .delete_resumes_by_job(job_id)
            .await
            .map_err(|e| partial_delete(RESUMS_TABLE, job_id, counts, e))?;
        counts.jobs = self
            .delete_job(job_id)
            .await
            .map_err(|e| partial_delete(JOBS_TABLE, job_id, counts, e))?;

        info!("Deleted job {job_id} and related rows ({counts})");
        Ok(counts)
    }
}

fn partial_delete(
    table: &str,
    job_id: Uuid,
    counts: DeletionCounts,
    source: StoreError,
) -> StoreError {
    error!("Deleting {table} rows for job {job_id} failed after {counts}: {source}");
    StoreError::PartialDelete {
        counts,
        source: Box::new(source),
    }
}
