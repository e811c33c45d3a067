use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{
    Store, StoreError, StoreStats, ANALYSIS_TABLE, FILES_TABLE, JOBS_TABLE, RESUMS_TABLE,
};
use crate::models::{Analysis, FileRecord, Job, JobUpdate, ResumeSummary};

const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Supabase backend speaking PostgREST over HTTP.
#[derive(Clone)]
pub struct SupabaseStore {
    http: Client,
    rest_url: String,
}

impl SupabaseStore {
    /// `base_url` is the project URL (`https://<ref>.supabase.co`); `key` is
    /// sent both as `apikey` and as a bearer token.
    pub fn new(base_url: &str, key: &str) -> Result<Self, StoreError> {
        let invalid_key =
            |_| StoreError::Config("Supabase key contains invalid header characters".to_string());
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(key).map_err(invalid_key)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid_key)?;
        headers.insert("apikey", api_key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let request = self
            .http
            .get(self.table(table))
            .query(&[("select", "*")])
            .query(filters);
        let response = send(request).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn upsert<T: Serialize + Sync>(
        &self,
        table: &str,
        conflict_column: &str,
        row: &T,
    ) -> Result<(), StoreError> {
        let request = self
            .http
            .post(self.table(table))
            .query(&[("on_conflict", conflict_column)])
            .header("Prefer", MERGE_DUPLICATES)
            .json(row);
        send(request).await?;
        debug!("Upserted row into {table} (on_conflict={conflict_column})");
        Ok(())
    }

    async fn delete_where(&self, table: &str, column: &str, id: Uuid) -> Result<u64, StoreError> {
        let request = self
            .http
            .delete(self.table(table))
            .query(&[(column, format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION);
        let deleted: Vec<serde_json::Value> = send(request).await?.json().await?;
        Ok(deleted.len() as u64)
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        let request = self
            .http
            .head(self.table(table))
            .query(&[("select", "id")])
            .header("Prefer", "count=exact");
        let response = send(request).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range_total(range).ok_or_else(|| StoreError::Api {
            status: response.status().as_u16(),
            message: format!("missing or malformed Content-Range for {table}: '{range}'"),
        })
    }
}

/// Sends a request and turns non-2xx replies into `StoreError::Api`.
async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

/// `"0-24/3573"` → 3573, `"*/0"` → 0.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl Store for SupabaseStore {
    fn backend(&self) -> &'static str {
        "supabase"
    }

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let request = self.http.post(self.table(JOBS_TABLE)).json(job);
        match send(request).await {
            Ok(_) => Ok(()),
            Err(StoreError::Api { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                Err(StoreError::Conflict {
                    table: JOBS_TABLE,
                    key: job.name.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn get_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        let rows: Vec<Job> = self
            .select(
                JOBS_TABLE,
                &[("name", format!("eq.{name}")), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StoreError> {
        self.select(JOBS_TABLE, &[("order", "created_at.desc".to_string())])
            .await
    }

    async fn get_job_details(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let rows: Vec<Job> = self
            .select(JOBS_TABLE, &[("id", format!("eq.{id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_job(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        let mut body = serde_json::to_value(update)?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("updated_at".to_string(), json!(Utc::now()));
        }
        let request = self
            .http
            .patch(self.table(JOBS_TABLE))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body);
        let response = match send(request).await {
            Ok(response) => response,
            Err(StoreError::Api { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                return Err(StoreError::Conflict {
                    table: JOBS_TABLE,
                    key: update.name.clone().unwrap_or_default(),
                })
            }
            Err(e) => return Err(e),
        };
        let rows: Vec<Job> = response.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_resume(&self, resume: &ResumeSummary) -> Result<(), StoreError> {
        self.upsert(RESUMS_TABLE, "id", resume).await
    }

    async fn get_resume_by_id(&self, id: Uuid) -> Result<Option<ResumeSummary>, StoreError> {
        let rows: Vec<ResumeSummary> = self
            .select(RESUMS_TABLE, &[("id", format!("eq.{id}"))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_resumes_by_job_id(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ResumeSummary>, StoreError> {
        self.select(
            RESUMS_TABLE,
            &[
                ("job_id", format!("eq.{job_id}")),
                ("order", "score.desc,processed_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn upsert_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        self.upsert(ANALYSIS_TABLE, "resum_id", analysis).await
    }

    async fn get_analyses_by_job_id(&self, job_id: Uuid) -> Result<Vec<Analysis>, StoreError> {
        self.select(
            ANALYSIS_TABLE,
            &[
                ("job_id", format!("eq.{job_id}")),
                ("order", "score.desc".to_string()),
            ],
        )
        .await
    }

    async fn upsert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        self.upsert(FILES_TABLE, "file_path", file).await
    }

    async fn find_files_by_original_name(
        &self,
        original_name: &str,
    ) -> Result<Vec<FileRecord>, StoreError> {
        self.select(
            FILES_TABLE,
            &[("original_name", format!("eq.{original_name}"))],
        )
        .await
    }

    async fn delete_analyses_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.delete_where(ANALYSIS_TABLE, "job_id", job_id).await
    }

    async fn delete_files_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.delete_where(FILES_TABLE, "job_id", job_id).await
    }

    async fn delete_resumes_by_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.delete_where(RESUMS_TABLE, "job_id", job_id).await
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<u64, StoreError> {
        self.delete_where(JOBS_TABLE, "id", job_id).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            jobs: self.count(JOBS_TABLE).await?,
            resums: self.count(RESUMS_TABLE).await?,
            analysis: self.count(ANALYSIS_TABLE).await?,
            files: self.count(FILES_TABLE).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeletionCounts;
    use httpmock::prelude::*;
    use httpmock::Method::{HEAD, PATCH};

    fn store(server: &MockServer) -> SupabaseStore {
        SupabaseStore::new(&server.base_url(), "service-key").unwrap()
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24"), None);
    }

    #[tokio::test]
    async fn test_select_sends_auth_headers_and_filter() {
        let server = MockServer::start_async().await;
        let job = Job::new("Dev Rust", None).unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/jobs")
                    .query_param("name", "eq.Dev Rust")
                    .header("apikey", "service-key")
                    .header("authorization", "Bearer service-key");
                then.status(200).json_body(json!([job]));
            })
            .await;

        let found = store(&server).get_job_by_name("Dev Rust").await.unwrap();
        mock.assert_async().await;
        assert_eq!(found.map(|j| j.id), Some(job.id));
    }

    #[tokio::test]
    async fn test_upsert_file_uses_conflict_column() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/files")
                    .query_param("on_conflict", "file_path")
                    .header("prefer", MERGE_DUPLICATES);
                then.status(201);
            })
            .await;

        let record = FileRecord::new(Uuid::new_v4(), Uuid::new_v4(), "cv.pdf");
        store(&server).upsert_file(&record).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_insert_job_conflict_maps_to_conflict() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/jobs");
                then.status(409)
                    .json_body(json!({"code": "23505", "message": "duplicate key"}));
            })
            .await;

        let err = store(&server)
            .insert_job(&Job::new("Dev", None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_rename_conflict_maps_to_conflict() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/jobs");
                then.status(409)
                    .json_body(json!({"code": "23505", "message": "duplicate key"}));
            })
            .await;

        let rename = JobUpdate {
            name: Some("Analista".to_string()),
            ..Default::default()
        };
        let err = store(&server)
            .update_job(Uuid::new_v4(), &rename)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { key, .. } if key == "Analista"));
    }

    #[tokio::test]
    async fn test_cascade_counts_returned_rows() {
        let server = MockServer::start_async().await;
        let job_id = Uuid::new_v4();
        let two_rows = json!([{"id": 1}, {"id": 2}]);
        for table in ["analysis", "files", "resums"] {
            let body = two_rows.clone();
            server
                .mock_async(move |when, then| {
                    when.method(DELETE)
                        .path(format!("/rest/v1/{table}"))
                        .query_param("job_id", format!("eq.{job_id}"));
                    then.status(200).json_body(body);
                })
                .await;
        }
        server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/rest/v1/jobs")
                    .query_param("id", format!("eq.{job_id}"));
                then.status(200).json_body(json!([{"id": job_id}]));
            })
            .await;

        let counts = store(&server).delete_job_and_related(job_id).await.unwrap();
        assert_eq!(
            counts,
            DeletionCounts {
                analysis: 2,
                files: 2,
                resums: 2,
                jobs: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_cascade_failure_reports_partial_counts() {
        let server = MockServer::start_async().await;
        let job_id = Uuid::new_v4();
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/rest/v1/analysis");
                then.status(200).json_body(json!([{"id": 1}]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/rest/v1/files");
                then.status(500).body("boom");
            })
            .await;

        let err = store(&server)
            .delete_job_and_related(job_id)
            .await
            .unwrap_err();
        match err {
            StoreError::PartialDelete { counts, .. } => {
                assert_eq!(counts.analysis, 1);
                assert_eq!(counts.files, 0);
                assert_eq!(counts.jobs, 0);
            }
            other => panic!("expected PartialDelete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stats_reads_content_range() {
        let server = MockServer::start_async().await;
        for (table, total) in [("jobs", 2), ("resums", 5), ("analysis", 5), ("files", 6)] {
            server
                .mock_async(move |when, then| {
                    when.method(HEAD)
                        .path(format!("/rest/v1/{table}"))
                        .header("prefer", "count=exact");
                    then.status(200)
                        .header("content-range", format!("*/{total}"));
                })
                .await;
        }

        let stats = store(&server).stats().await.unwrap();
        assert_eq!(
            stats,
            StoreStats {
                jobs: 2,
                resums: 5,
                analysis: 5,
                files: 6,
            }
        );
    }
}
