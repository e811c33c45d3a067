use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::score::Score;

/// LLM summary and opinion for one résumé screened against one job (`resums` table).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeSummary {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Markdown summary produced by the model.
    pub content: String,
    pub opinion: String,
    /// Original upload file name.
    pub file: String,
    pub candidate_name: String,
    pub email: Option<String>,
    #[sqlx(try_from = "f64")]
    pub score: Score,
    pub processed_at: DateTime<Utc>,
}

/// Structured candidate data derived from a summary (`analysis` table).
/// At most one per résumé; shares the résumé's score.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Analysis {
    pub id: Uuid,
    pub resum_id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    #[sqlx(try_from = "f64")]
    pub score: Score,
    pub skills: Vec<String>,
    pub education: Vec<String>,
    pub language: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Upload bookkeeping row (`files` table). `file_path` is the upsert key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub resum_id: Uuid,
    pub original_name: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(job_id: Uuid, resum_id: Uuid, original_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            resum_id,
            original_name: original_name.to_string(),
            file_path: Self::path_for(job_id, original_name),
            created_at: Utc::now(),
        }
    }

    /// Natural key of an upload: one record per (job, file name).
    pub fn path_for(job_id: Uuid, original_name: &str) -> String {
        format!("{job_id}/{original_name}")
    }
}
