use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError, StoreStats, JOBS_TABLE};
use crate::models::{Analysis, FileRecord, Job, JobUpdate, ResumeSummary};

/// Direct PostgreSQL backend over the schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        // Table names come from the module constants, never from input.
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, name, description, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.description)
        .bind(job.status.as_str())
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict {
                    table: JOBS_TABLE,
                    key: job.name.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        Ok(sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE name = $1 LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(
            sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_job_details(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        let result = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(job) => Ok(job),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict {
                    table: JOBS_TABLE,
                    key: update.name.clone().unwrap_or_default(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert_resume(&self, resume: &ResumeSummary) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO resums
                (id, job_id, content, opinion, file, candidate_name, email, score, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                opinion = EXCLUDED.opinion,
                file = EXCLUDED.file,
                candidate_name = EXCLUDED.candidate_name,
                email = EXCLUDED.email,
                score = EXCLUDED.score,
                processed_at = EXCLUDED.processed_at
            "#,
        )
        .bind(resume.id)
        .bind(resume.job_id)
        .bind(&resume.content)
        .bind(&resume.opinion)
        .bind(&resume.file)
        .bind(&resume.candidate_name)
        .bind(&resume.email)
        .bind(resume.score.value())
        .bind(resume.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_resume_by_id(&self, id: Uuid) -> Result<Option<ResumeSummary>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeSummary>("SELECT * FROM resums WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_resumes_by_job_id(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ResumeSummary>, StoreError> {
        Ok(sqlx::query_as::<_, ResumeSummary>(
            "SELECT * FROM resums WHERE job_id = $1 ORDER BY score DESC, processed_at ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO analysis
                (id, resum_id, job_id, name, email, score, skills, education, language, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (resum_id) DO UPDATE SET
                job_id = EXCLUDED.job_id,
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                score = EXCLUDED.score,
                skills = EXCLUDED.skills,
                education = EXCLUDED.education,
                language = EXCLUDED.language
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.resum_id)
        .bind(analysis.job_id)
        .bind(&analysis.name)
        .bind(&analysis.email)
        .bind(analysis.score.value())
        .bind(&analysis.skills)
        .bind(&analysis.education)
        .bind(&analysis.language)
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_analyses_by_job_id(&self, job_id: Uuid) -> Result<Vec<Analysis>, StoreError> {
        Ok(sqlx::query_as::<_, Analysis>(
            "SELECT * FROM analysis WHERE job_id = $1 ORDER BY score DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO files (id, job_id, resum_id, original_name, file_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (file_path) DO UPDATE SET
                job_id = EXCLUDED.job_id,
                resum_id = EXCLUDED.resum_id,
                original_name = EXCLUDED.original_name
            "#,
        )
        .bind(file.id)
        .bind(file.job_id)
        .bind(file.resum_id)
        .bind(&file.original_name)
        .bind(&file.file_path)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_files_by_original_name(
        &self,
        original_name: &str,
    ) -> Result<Vec<FileRecord>, StoreError> {
        Ok(
            sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE original_name = $1")
                .bind(original_name)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn delete_analyses_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM analysis WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete_files_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM files WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete_resumes_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM resums WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            jobs: self.count(super::JOBS_TABLE).await?,
            resums: self.count(super::RESUMS_TABLE).await?,
            analysis: self.count(super::ANALYSIS_TABLE).await?,
            files: self.count(super::FILES_TABLE).await?,
        })
    }
}
