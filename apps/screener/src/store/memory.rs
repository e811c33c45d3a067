use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreStats, JOBS_TABLE};
use crate::models::{Analysis, FileRecord, Job, JobUpdate, ResumeSummary, Score};

#[derive(Default)]
struct Tables {
    jobs: HashMap<Uuid, Job>,
    resums: HashMap<Uuid, ResumeSummary>,
    /// Keyed by `resum_id`.
    analysis: HashMap<Uuid, Analysis>,
    /// Keyed by `file_path`.
    files: HashMap<String, FileRecord>,
}

/// In-process store with the same upsert keys as the relational backends.
/// Used for local runs (`STORE_BACKEND=memory`) and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.jobs.contains_key(&job.id) || t.jobs.values().any(|j| j.name == job.name) {
            return Err(StoreError::Conflict {
                table: JOBS_TABLE,
                key: job.name.clone(),
            });
        }
        t.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.jobs.values().find(|j| j.name == name).cloned())
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let t = self.tables.read().await;
        let mut jobs: Vec<Job> = t.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn get_job_details(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        let mut t = self.tables.write().await;
        if !t.jobs.contains_key(&id) {
            return Ok(None);
        }
        if let Some(name) = &update.name {
            if t.jobs.values().any(|j| j.id != id && &j.name == name) {
                return Err(StoreError::Conflict {
                    table: JOBS_TABLE,
                    key: name.clone(),
                });
            }
        }
        let Some(job) = t.jobs.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(job);
        Ok(Some(job.clone()))
    }

    async fn upsert_resume(&self, resume: &ResumeSummary) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .resums
            .insert(resume.id, resume.clone());
        Ok(())
    }

    async fn get_resume_by_id(&self, id: Uuid) -> Result<Option<ResumeSummary>, StoreError> {
        Ok(self.tables.read().await.resums.get(&id).cloned())
    }

    async fn get_resumes_by_job_id(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ResumeSummary>, StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<ResumeSummary> = t
            .resums
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            Score::rank_desc(&a.score, &b.score).then(a.processed_at.cmp(&b.processed_at))
        });
        Ok(rows)
    }

    async fn upsert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let row = match t.analysis.get(&analysis.resum_id) {
            // Keep the original row identity on conflict.
            Some(existing) => Analysis {
                id: existing.id,
                created_at: existing.created_at,
                ..analysis.clone()
            },
            None => analysis.clone(),
        };
        t.analysis.insert(analysis.resum_id, row);
        Ok(())
    }

    async fn get_analyses_by_job_id(&self, job_id: Uuid) -> Result<Vec<Analysis>, StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Analysis> = t
            .analysis
            .values()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| Score::rank_desc(&a.score, &b.score));
        Ok(rows)
    }

    async fn upsert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let row = match t.files.get(&file.file_path) {
            Some(existing) => FileRecord {
                id: existing.id,
                created_at: existing.created_at,
                ..file.clone()
            },
            None => file.clone(),
        };
        t.files.insert(file.file_path.clone(), row);
        Ok(())
    }

    async fn find_files_by_original_name(
        &self,
        original_name: &str,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.files
            .values()
            .filter(|f| f.original_name == original_name)
            .cloned()
            .collect())
    }

    async fn delete_analyses_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let mut t = self.tables.write().await;
        let before = t.analysis.len();
        t.analysis.retain(|_, a| a.job_id != job_id);
        Ok((before - t.analysis.len()) as u64)
    }

    async fn delete_files_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let mut t = self.tables.write().await;
        let before = t.files.len();
        t.files.retain(|_, f| f.job_id != job_id);
        Ok((before - t.files.len()) as u64)
    }

    async fn delete_resumes_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let mut t = self.tables.write().await;
        let before = t.resums.len();
        t.resums.retain(|_, r| r.job_id != job_id);
        Ok((before - t.resums.len()) as u64)
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .tables
            .write()
            .await
            .jobs
            .remove(&job_id)
            .map_or(0, |_| 1))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let t = self.tables.read().await;
        Ok(StoreStats {
            jobs: t.jobs.len() as u64,
            resums: t.resums.len() as u64,
            analysis: t.analysis.len() as u64,
            files: t.files.len() as u64,
        })
    }
}
