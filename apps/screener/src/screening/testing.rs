//! Test doubles shared by the screening, batch and route tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::llm_client::{AnalysisReport, CandidateAnalyzer, LlmError};
use crate::models::{Analysis, FileRecord, Job, JobUpdate, ResumeSummary};
use crate::store::{MemoryStore, Store, StoreError, StoreStats};

/// Plain-text résumé long enough to pass the empty-document check.
pub fn resume_text(name: &str) -> String {
    let email = name.to_lowercase().replace(' ', ".");
    format!(
        "{name}\n{email}@example.com\n\nExperiência\nAnalista de Dados @ Empresa Y (2021 - 2024)\n\
         Habilidades: Python, SQL, Power BI\nFormação: Bacharelado em Estatística"
    )
}

#[derive(Clone, Copy)]
enum Script {
    Score(f64),
    NoScore,
    Timeout,
}

/// `CandidateAnalyzer` that answers from a fixed script and counts calls.
pub struct ScriptedAnalyzer {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAnalyzer {
    pub fn scoring(score: f64) -> Self {
        Self::with(Script::Score(score))
    }

    pub fn without_score() -> Self {
        Self::with(Script::NoScore)
    }

    pub fn timing_out() -> Self {
        Self::with(Script::Timeout)
    }

    fn with(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl CandidateAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _resume_text: &str, job: &Job) -> Result<AnalysisReport, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = match self.script {
            Script::Score(s) => Some(s),
            Script::NoScore => None,
            Script::Timeout => return Err(LlmError::Timeout { attempts: 5 }),
        };
        Ok(AnalysisReport {
            summary: "## Nome Completo\nMaria Souza\n\n## Habilidades Técnicas\n- Python, SQL\n\n\
                      ## Idiomas\n- Inglês (Avançado)"
                .to_string(),
            opinion: format!("Recomendação Final para {}: Sim", job.name),
            score,
        })
    }
}

/// Delegates to a `MemoryStore` but fails chosen operations.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_analysis_upsert: bool,
    fail_files_delete: bool,
}

impl FlakyStore {
    pub fn failing_analysis(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_analysis_upsert: true,
            fail_files_delete: false,
        }
    }

    pub fn failing_file_delete(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_analysis_upsert: false,
            fail_files_delete: true,
        }
    }

    fn injected() -> StoreError {
        StoreError::Api {
            status: 503,
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.insert_job(job).await
    }

    async fn get_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        self.inner.get_job_by_name(name).await
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StoreError> {
        self.inner.get_jobs().await
    }

    async fn get_job_details(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.inner.get_job_details(id).await
    }

    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        self.inner.update_job(id, update).await
    }

    async fn upsert_resume(&self, resume: &ResumeSummary) -> Result<(), StoreError> {
        self.inner.upsert_resume(resume).await
    }

    async fn get_resume_by_id(&self, id: Uuid) -> Result<Option<ResumeSummary>, StoreError> {
        self.inner.get_resume_by_id(id).await
    }

    async fn get_resumes_by_job_id(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ResumeSummary>, StoreError> {
        self.inner.get_resumes_by_job_id(job_id).await
    }

    async fn upsert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        if self.fail_analysis_upsert {
            return Err(Self::injected());
        }
        self.inner.upsert_analysis(analysis).await
    }

    async fn get_analyses_by_job_id(&self, job_id: Uuid) -> Result<Vec<Analysis>, StoreError> {
        self.inner.get_analyses_by_job_id(job_id).await
    }

    async fn upsert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        self.inner.upsert_file(file).await
    }

    async fn find_files_by_original_name(
        &self,
        original_name: &str,
    ) -> Result<Vec<FileRecord>, StoreError> {
        self.inner.find_files_by_original_name(original_name).await
    }

    async fn delete_analyses_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete_analyses_by_job(job_id).await
    }

    async fn delete_files_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        if self.fail_files_delete {
            return Err(Self::injected());
        }
        self.inner.delete_files_by_job(job_id).await
    }

    async fn delete_resumes_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete_resumes_by_job(job_id).await
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete_job(job_id).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats().await
    }
}
