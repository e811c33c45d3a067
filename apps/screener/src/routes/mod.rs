pub mod health;
pub mod jobs;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get_job)
                .patch(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/api/v1/jobs/:id/resumes", get(jobs::handle_list_resumes))
        .route("/api/v1/jobs/:id/analyses", get(jobs::handle_list_analyses))
        // Résumés
        .route("/api/v1/resumes/:id", get(jobs::handle_get_resume))
        .route("/api/v1/stats", get(jobs::handle_stats))
        // Batches
        .route("/api/v1/batches", post(handlers::handle_run_batch))
        .route("/api/v1/batches/matrix", post(handlers::handle_run_matrix))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, StoreConfig};
    use crate::screening::testing::{resume_text, FlakyStore, ScriptedAnalyzer};
    use crate::screening::{BatchRunner, CandidateProcessor};
    use crate::store::{MemoryStore, Store};

    const BOUNDARY: &str = "screener-test-boundary";

    fn test_config() -> Config {
        Config {
            deepseek_api_key: None,
            llm_base_url: "http://localhost".to_string(),
            llm_model: "test-model".to_string(),
            llm_connect_timeout_secs: 1,
            llm_request_timeout_secs: 1,
            llm_retry_backoff_ms: 1,
            store: StoreConfig::Memory,
            batch_workers: 2,
            max_upload_mb: 5,
            port: 0,
            rust_log: "info".to_string(),
        }
    }

    fn app_with_store(store: Arc<dyn Store>, score: f64) -> Router {
        let processor =
            CandidateProcessor::new(store.clone(), Arc::new(ScriptedAnalyzer::scoring(score)));
        build_router(AppState {
            store,
            batches: BatchRunner::new(processor, 2),
            config: test_config(),
        })
    }

    fn test_app(score: f64) -> (Router, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        (app_with_store(memory.clone(), score), memory)
    }

    /// Builds a multipart body from text fields and `(file_name, content)` files.
    fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (file_name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; \
                 filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn multipart_request(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_store_backend() {
        let (app, _) = test_app(7.0);
        let (status, body) = send(&app, empty_request(Method::GET, "/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_create_job_reuses_existing_name() {
        let (app, _) = test_app(7.0);
        let payload = json!({ "name": "  Analista   de Dados ", "description": "SQL e Python" });

        let (status, first) = send(
            &app,
            json_request(Method::POST, "/api/v1/jobs", payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["name"], "Analista de Dados");

        let (status, second) =
            send(&app, json_request(Method::POST, "/api/v1/jobs", payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["id"], second["id"]);

        let (_, listed) = send(&app, empty_request(Method::GET, "/api/v1/jobs")).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_create_job_rejects_blank_name() {
        let (app, _) = test_app(7.0);
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/jobs", json!({ "name": "   " })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_job_status_and_reject_empty_patch() {
        let (app, _) = test_app(7.0);
        let (_, job) = send(
            &app,
            json_request(Method::POST, "/api/v1/jobs", json!({ "name": "Engenheiro" })),
        )
        .await;
        let uri = format!("/api/v1/jobs/{}", job["id"].as_str().unwrap());

        let (status, _) = send(&app, json_request(Method::PATCH, &uri, json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, updated) = send(
            &app,
            json_request(Method::PATCH, &uri, json!({ "status": "inactive" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "inactive");
        assert_eq!(updated["name"], "Engenheiro");
    }

    #[tokio::test]
    async fn test_rename_to_taken_name_conflicts() {
        let (app, _) = test_app(7.0);
        for name in ["Analista", "Engenheiro"] {
            send(
                &app,
                json_request(Method::POST, "/api/v1/jobs", json!({ "name": name })),
            )
            .await;
        }
        let (_, jobs) = send(&app, empty_request(Method::GET, "/api/v1/jobs")).await;
        let engineer = jobs
            .as_array()
            .unwrap()
            .iter()
            .find(|j| j["name"] == "Engenheiro")
            .unwrap();
        let uri = format!("/api/v1/jobs/{}", engineer["id"].as_str().unwrap());

        let (status, body) = send(
            &app,
            json_request(Method::PATCH, &uri, json!({ "name": " Analista " })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (_, jobs) = send(&app, empty_request(Method::GET, "/api/v1/jobs")).await;
        let mut names: Vec<&str> = jobs
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|j| j["name"].as_str())
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Analista", "Engenheiro"]);

        let (status, _) = send(
            &app,
            json_request(Method::PATCH, &uri, json!({ "name": "Engenheiro" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (app, _) = test_app(7.0);
        let uri = format!("/api/v1/jobs/{}", uuid::Uuid::new_v4());

        let (status, body) = send(&app, empty_request(Method::GET, &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = send(&app, empty_request(Method::DELETE, &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_reports_per_file_outcomes() {
        let (app, _) = test_app(8.25);
        let body = multipart_body(
            &[("job_name", "Analista de Dados"), ("job_description", "Python")],
            &[
                ("ana_lima.txt", &resume_text("Ana Lima")),
                ("vazio.txt", ""),
            ],
        );

        let (status, result) = send(&app, multipart_request("/api/v1/batches", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["any_success"], true);
        assert_eq!(result["summary"]["succeeded"], 1);
        assert_eq!(result["summary"]["failed"], 1);
        assert_eq!(result["summary"]["failed_files"], json!(["vazio.txt"]));

        let job_id = result["jobs"][0]["id"].as_str().unwrap().to_string();
        let (status, resumes) = send(
            &app,
            empty_request(Method::GET, &format!("/api/v1/jobs/{job_id}/resumes")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resumes.as_array().map(Vec::len), Some(1));
        assert_eq!(resumes[0]["score"], 8.3);

        let resume_id = resumes[0]["id"].as_str().unwrap();
        let (status, resume) = send(
            &app,
            empty_request(Method::GET, &format!("/api/v1/resumes/{resume_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resume["job_id"], job_id.as_str());
    }

    #[tokio::test]
    async fn test_batch_requires_job_and_files() {
        let (app, _) = test_app(7.0);

        let no_job = multipart_body(&[], &[("a.txt", &resume_text("Ana Lima"))]);
        let (status, _) = send(&app, multipart_request("/api/v1/batches", no_job)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let no_files = multipart_body(&[("job_name", "Analista")], &[]);
        let (status, body) = send(&app, multipart_request("/api/v1/batches", no_files)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_matrix_runs_against_active_jobs_only() {
        let (app, memory) = test_app(6.0);
        for name in ["Analista", "Engenheiro"] {
            send(
                &app,
                json_request(Method::POST, "/api/v1/jobs", json!({ "name": name })),
            )
            .await;
        }
        let (_, inactive) = send(
            &app,
            json_request(Method::POST, "/api/v1/jobs", json!({ "name": "Arquivada" })),
        )
        .await;
        let uri = format!("/api/v1/jobs/{}", inactive["id"].as_str().unwrap());
        send(&app, json_request(Method::PATCH, &uri, json!({ "status": "inactive" }))).await;

        let body = multipart_body(&[], &[("ana_lima.txt", &resume_text("Ana Lima"))]);
        let (status, result) = send(&app, multipart_request("/api/v1/batches/matrix", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["jobs"].as_array().map(Vec::len), Some(2));
        assert_eq!(result["summary"]["succeeded"], 2);
        assert_eq!(memory.stats().await.unwrap().resums, 2);
    }

    #[tokio::test]
    async fn test_matrix_without_active_jobs_is_rejected() {
        let (app, _) = test_app(6.0);
        let body = multipart_body(&[], &[("ana_lima.txt", &resume_text("Ana Lima"))]);

        let (status, _) = send(&app, multipart_request("/api/v1/batches/matrix", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_job_returns_counts_and_stats_follow() {
        let (app, _) = test_app(7.0);
        let body = multipart_body(
            &[("job_name", "Analista")],
            &[
                ("ana_lima.txt", &resume_text("Ana Lima")),
                ("bruno_costa.txt", &resume_text("Bruno Costa")),
            ],
        );
        let (_, result) = send(&app, multipart_request("/api/v1/batches", body)).await;
        let job_id = result["jobs"][0]["id"].as_str().unwrap().to_string();

        let (_, stats) = send(&app, empty_request(Method::GET, "/api/v1/stats")).await;
        assert_eq!(stats["backend"], "memory");
        assert_eq!(stats["resums"], 2);
        assert_eq!(stats["files"], 2);

        let (status, deleted) = send(
            &app,
            empty_request(Method::DELETE, &format!("/api/v1/jobs/{job_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            deleted["deleted"],
            json!({ "analysis": 2, "files": 2, "resums": 2, "jobs": 1 })
        );

        let (_, stats) = send(&app, empty_request(Method::GET, "/api/v1/stats")).await;
        assert_eq!(stats["jobs"], 0);
        assert_eq!(stats["analysis"], 0);
    }

    #[tokio::test]
    async fn test_failed_delete_reports_partial_counts() {
        let memory = Arc::new(MemoryStore::new());
        let app = app_with_store(Arc::new(FlakyStore::failing_file_delete(memory.clone())), 7.0);
        let body = multipart_body(
            &[("job_name", "Analista")],
            &[("ana_lima.txt", &resume_text("Ana Lima"))],
        );
        let (_, result) = send(&app, multipart_request("/api/v1/batches", body)).await;
        let job_id = result["jobs"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            empty_request(Method::DELETE, &format!("/api/v1/jobs/{job_id}")),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "PARTIAL_DELETE");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("analysis=1 files=0 resums=0 jobs=0"));

        let stats = memory.stats().await.unwrap();
        assert_eq!((stats.analysis, stats.files, stats.jobs), (0, 1, 1));
    }
}
