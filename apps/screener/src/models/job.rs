use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Error)]
pub enum JobValidationError {
    #[error("job name must not be empty")]
    EmptyName,

    #[error("unknown job status '{0}' (expected 'active' or 'inactive')")]
    UnknownStatus(String),
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Inactive => "inactive",
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = JobValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "active" => Ok(JobStatus::Active),
            "inactive" => Ok(JobStatus::Inactive),
            _ => Err(JobValidationError::UnknownStatus(value)),
        }
    }
}

/// A job posting used as scoring context for résumés.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(name: &str, description: Option<&str>) -> Result<Self, JobValidationError> {
        Self::with_id(Uuid::new_v4(), name, description)
    }

    pub fn with_id(
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Self, JobValidationError> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: clean_job_name(name)?,
            description: clean_description(description),
            status: JobStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Text handed to the LLM as the job context.
    pub fn prompt_context(&self) -> String {
        match self.description.as_deref() {
            Some(desc) => format!("{}\n\n{}", self.name, desc),
            None => self.name.clone(),
        }
    }
}

/// Editable job fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl JobUpdate {
    pub fn validated(self) -> Result<Self, JobValidationError> {
        let name = self.name.as_deref().map(clean_job_name).transpose()?;
        Ok(Self {
            name,
            description: self
                .description
                .map(|d| clean_description(Some(&d)).unwrap_or_default()),
            status: self.status,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }

    /// Applies the update in place and bumps `updated_at`.
    pub fn apply_to(&self, job: &mut Job) {
        if let Some(name) = &self.name {
            job.name = name.clone();
        }
        if let Some(description) = &self.description {
            job.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        job.updated_at = Utc::now();
    }
}

/// Trims and collapses internal whitespace; rejects empty names.
pub fn clean_job_name(name: &str) -> Result<String, JobValidationError> {
    let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(JobValidationError::EmptyName);
    }
    Ok(cleaned)
}

fn clean_description(description: Option<&str>) -> Option<String> {
    let text = description?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}
