//! Candidate Processor: one résumé against one job.
//!
//! Pipeline: dedup check → text extraction → name/email detection →
//! LLM analysis → persistence (summary, then analysis, then file record).
//! Every failure becomes a tagged `ProcessOutcome::Failed`; nothing here
//! aborts a batch.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::extractor::{DocumentKind, TextExtractor};
use super::identity;
use super::profile::CandidateProfile;
use crate::llm_client::{CandidateAnalyzer, LlmError};
use crate::models::{Analysis, FileRecord, Job, ResumeSummary, Score};
use crate::store::{Store, StoreError, ANALYSIS_TABLE, FILES_TABLE, RESUMS_TABLE};

/// Extracted text shorter than this (trimmed, in chars) counts as empty.
pub const MIN_TEXT_CHARS: usize = 50;

/// An uploaded document. `bytes` is shared, so cloning is cheap.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl ResumeUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyDocument,
    UnsupportedFormat,
    InvalidScore,
    TransientApi,
    Llm,
    Persistence,
    Store,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A file record for this (job, file name) already exists.
    AlreadyProcessed,
    /// Byte-identical to another upload in the same batch.
    DuplicateUpload,
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("document has too little text ({chars} chars, need {MIN_TEXT_CHARS})")]
    EmptyDocument { chars: usize },

    #[error("model reply carried no usable score")]
    InvalidScore,

    #[error("LLM unavailable: {0}")]
    TransientApi(#[source] LlmError),

    #[error("LLM call failed: {0}")]
    Llm(#[source] LlmError),

    #[error("file lookup failed: {0}")]
    Store(#[source] StoreError),

    #[error("failed to write {table}: {source}")]
    Persistence {
        table: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProcessingError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            ProcessingError::EmptyDocument { .. } => FailureKind::EmptyDocument,
            ProcessingError::InvalidScore => FailureKind::InvalidScore,
            ProcessingError::TransientApi(_) => FailureKind::TransientApi,
            ProcessingError::Llm(_) => FailureKind::Llm,
            ProcessingError::Store(_) => FailureKind::Store,
            ProcessingError::Persistence { .. } => FailureKind::Persistence,
            ProcessingError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<LlmError> for ProcessingError {
    fn from(e: LlmError) -> Self {
        if e.is_timeout() {
            ProcessingError::TransientApi(e)
        } else {
            ProcessingError::Llm(e)
        }
    }
}

/// Result of processing one file against one job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Processed {
        file: String,
        job_id: Uuid,
        resum_id: Uuid,
        candidate_name: String,
        score: Score,
    },
    Skipped {
        file: String,
        job_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        resum_id: Option<Uuid>,
        reason: SkipReason,
    },
    Failed {
        file: String,
        job_id: Uuid,
        kind: FailureKind,
        message: String,
    },
}

impl ProcessOutcome {
    pub fn failed(file: &str, job_id: Uuid, error: &ProcessingError) -> Self {
        ProcessOutcome::Failed {
            file: file.to_string(),
            job_id,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Processed { .. })
    }
}

/// Runs the screening pipeline for single (job, file) pairs. Cheap to clone;
/// all collaborators are shared.
#[derive(Clone)]
pub struct CandidateProcessor {
    store: Arc<dyn Store>,
    analyzer: Arc<dyn CandidateAnalyzer>,
    extractor: TextExtractor,
}

impl CandidateProcessor {
    pub fn new(store: Arc<dyn Store>, analyzer: Arc<dyn CandidateAnalyzer>) -> Self {
        Self {
            store,
            analyzer,
            extractor: TextExtractor::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn process(&self, job: &Job, upload: &ResumeUpload) -> ProcessOutcome {
        match self.try_process(job, upload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Processing {} for job '{}' failed ({:?}): {e}",
                    upload.file_name,
                    job.name,
                    e.kind()
                );
                ProcessOutcome::failed(&upload.file_name, job.id, &e)
            }
        }
    }

    async fn try_process(
        &self,
        job: &Job,
        upload: &ResumeUpload,
    ) -> Result<ProcessOutcome, ProcessingError> {
        let file_name = upload.file_name.as_str();

        // 1. Dedup by (file name, job)
        let existing = self
            .store
            .find_files_by_original_name(file_name)
            .await
            .map_err(ProcessingError::Store)?;
        if let Some(record) = existing.iter().find(|f| f.job_id == job.id) {
            info!("{file_name} already processed for job '{}', skipping", job.name);
            return Ok(ProcessOutcome::Skipped {
                file: file_name.to_string(),
                job_id: job.id,
                resum_id: Some(record.resum_id),
                reason: SkipReason::AlreadyProcessed,
            });
        }

        // 2. Extraction
        if DocumentKind::from_file_name(file_name).is_none() {
            return Err(ProcessingError::UnsupportedFormat(file_name.to_string()));
        }
        let text = self.extract(upload).await?;
        let chars = text.trim().chars().count();
        if chars < MIN_TEXT_CHARS {
            return Err(ProcessingError::EmptyDocument { chars });
        }

        // 3. LLM analysis
        let report = self.analyzer.analyze(&text, job).await?;
        let score = report
            .score
            .and_then(|raw| Score::new(raw).ok())
            .ok_or(ProcessingError::InvalidScore)?;

        // 4. Identity
        let candidate_name = identity::name_from_file_name(file_name)
            .or_else(|| identity::labelled_name(&report.summary))
            .unwrap_or_else(|| identity::name_from_content(&text));
        let email = identity::extract_email(&text);
        debug!("{file_name}: candidate '{candidate_name}', score {score}");

        // 5. Persistence, in dependency order. No rollback on failure.
        let now = Utc::now();
        let summary = ResumeSummary {
            id: Uuid::new_v4(),
            job_id: job.id,
            content: report.summary,
            opinion: report.opinion,
            file: file_name.to_string(),
            candidate_name: candidate_name.clone(),
            email: email.clone(),
            score,
            processed_at: now,
        };
        self.store
            .upsert_resume(&summary)
            .await
            .map_err(|source| ProcessingError::Persistence {
                table: RESUMS_TABLE,
                source,
            })?;

        let profile = CandidateProfile::from_summary(&summary.content);
        let analysis = Analysis {
            id: Uuid::new_v4(),
            resum_id: summary.id,
            job_id: job.id,
            name: candidate_name.clone(),
            email,
            score,
            skills: profile.skills,
            education: profile.education,
            language: profile.languages,
            created_at: now,
        };
        self.store
            .upsert_analysis(&analysis)
            .await
            .map_err(|source| ProcessingError::Persistence {
                table: ANALYSIS_TABLE,
                source,
            })?;

        self.store
            .upsert_file(&FileRecord::new(job.id, summary.id, file_name))
            .await
            .map_err(|source| ProcessingError::Persistence {
                table: FILES_TABLE,
                source,
            })?;

        info!(
            "Processed {file_name} for job '{}': {candidate_name} scored {score}",
            job.name
        );
        Ok(ProcessOutcome::Processed {
            file: file_name.to_string(),
            job_id: job.id,
            resum_id: summary.id,
            candidate_name,
            score,
        })
    }

    /// Runs the extractor on the blocking pool; PDF parsing is CPU-bound.
    async fn extract(&self, upload: &ResumeUpload) -> Result<String, ProcessingError> {
        let extractor = self.extractor;
        let bytes = upload.bytes.clone();
        let file_name = upload.file_name.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&bytes, &file_name))
            .await
            .map_err(|e| ProcessingError::Internal(format!("extraction task failed: {e}")))
    }
}
