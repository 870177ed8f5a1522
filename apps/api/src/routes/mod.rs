pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::jobs::handlers as jobs;
use crate::pipeline::handlers as pipeline;
use crate::settings::handlers as settings;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Searches run in the background
        .route("/api/search", post(pipeline::handle_start_search))
        .route("/api/search/:id", get(pipeline::handle_get_search))
        .route(
            "/api/search/:id/cancel",
            post(pipeline::handle_cancel_search),
        )
        .route("/api/pipeline", post(pipeline::handle_run_single))
        // Stand-alone steps over pasted text
        .route("/api/score", post(pipeline::handle_score))
        .route("/api/tailor", post(pipeline::handle_tailor))
        .route("/api/send-email", post(pipeline::handle_send_email))
        // Job records
        .route("/api/jobs", get(jobs::handle_list_jobs))
        .route("/api/jobs/:id", get(jobs::handle_get_job))
        .route("/api/jobs/:id/notify", post(jobs::handle_notify_job))
        // Runtime settings
        .route(
            "/api/config",
            get(settings::handle_get_config).patch(settings::handle_patch_config),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::jobs::{JobStore, MemoryJobStore};
    use crate::llm_client::retry::RetryPolicy;
    use crate::llm_client::testing::ScriptedModel;
    use crate::llm_client::CompletionRequest;
    use crate::models::job::JobStatus;
    use crate::models::resume::ResumeProfile;
    use crate::notify::testing::RecordingMailer;
    use crate::notify::Notifier;
    use crate::pipeline::{Pipeline, PipelineOptions, SearchRegistry};
    use crate::settings::{PipelineSettings, SettingsHandle};
    use crate::sources::testing::{listing, StaticSource};
    use crate::sources::SourceSet;

    const TAILORED: &str =
        "## Suggestions\n1. Mention Tokio\n\n## Cover Letter\nDear Hiring Manager,\nHello.";

    fn responder(req: &CompletionRequest<'_>) -> Result<String, crate::llm_client::LlmError> {
        if req.prompt.contains("## Suggestions") {
            return Ok(TAILORED.to_string());
        }
        Ok(r#"{"match_score": 88, "reasoning": "strong overlap", "missing_skills": []}"#.to_string())
    }

    struct TestApp {
        router: Router,
        store: Arc<MemoryJobStore>,
        mailer: Arc<RecordingMailer>,
    }

    fn app() -> TestApp {
        let store = Arc::new(MemoryJobStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let settings = Arc::new(SettingsHandle::new(PipelineSettings {
            match_threshold: 75,
            model: "claude-test".to_string(),
        }));
        let sources = SourceSet::new().with(StaticSource::ok(
            "indeed",
            vec![listing("indeed", "a1", "Rust Engineer")],
        ));
        let pipeline = Pipeline::new(
            store.clone(),
            sources,
            Arc::new(ScriptedModel::responding(responder)),
            RetryPolicy::new(2, Duration::from_millis(5), Duration::from_millis(10), 0.0),
            settings.clone(),
            PipelineOptions::default(),
        )
        .with_notifier(Some(Notifier::new(
            mailer.clone(),
            Some("candidate@example.com".to_string()),
        )))
        .with_resume(Some(ResumeProfile::new("Ada Lovelace", "Rust, Postgres")));

        let state = AppState {
            store: store.clone(),
            pipeline: Arc::new(pipeline),
            searches: Arc::new(SearchRegistry::new()),
            settings,
        };
        TestApp {
            router: build_router(state),
            store,
            mailer,
        }
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let app = app();
        let (status, body) = call(&app.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "resumeflow-api");
        assert_eq!(body["notifications"], true);
    }

    #[tokio::test]
    async fn test_config_get_and_patch() {
        let app = app();
        let (status, body) = call(&app.router, Method::GET, "/api/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["match_threshold"], 75);

        let (status, body) = call(
            &app.router,
            Method::PATCH,
            "/api/config",
            Some(json!({ "match_threshold": 60 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["match_threshold"], 60);
        assert_eq!(body["model"], "claude-test");

        let (status, body) = call(
            &app.router,
            Method::PATCH,
            "/api/config",
            Some(json!({ "match_threshold": 150 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        // Past u8 range still gets the validation error, not a body rejection.
        let (status, body) = call(
            &app.router,
            Method::PATCH,
            "/api/config",
            Some(json!({ "match_threshold": 300 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_score_and_tailor_pasted_description() {
        let app = app();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/score",
            Some(json!({ "job_description": "Rust and Postgres services" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 88);
        assert_eq!(body["rationale"], "strong overlap");

        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/tailor",
            Some(json!({
                "resume": "Rust engineer",
                "job_description": "Rust and Postgres services",
                "missing_skills": ["Kafka"],
                "company_name": "Initech"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"][0], "Mention Tokio");
        assert!(body["cover_letter"].as_str().unwrap().starts_with("Dear Hiring Manager"));

        let jobs = app.store.list(&Default::default()).await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_score_requires_description() {
        let app = app();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/score",
            Some(json!({ "job_description": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_send_email_mails_supplied_documents() {
        let app = app();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/send-email",
            Some(json!({
                "recipient_email": "hr@initech.example",
                "job_title": "Platform Engineer",
                "company_name": "Initech",
                "resume_suggestions": ["Mention Tokio"],
                "cover_letter": "Dear Hiring Manager,",
                "match_score": 88
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "sent");
        assert_eq!(body["recipient"], "hr@initech.example");

        let sent = app.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "hr@initech.example");
        assert!(sent[0].subject.contains("Initech"));
    }

    #[tokio::test]
    async fn test_run_single_then_list_and_get() {
        let app = app();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/pipeline",
            Some(json!({
                "title": "Platform Engineer",
                "company": "Initech",
                "description": "Rust and Postgres services"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "notified");
        assert_eq!(body["score"], 88);
        assert_eq!(app.mailer.sent_count(), 1);

        let id = body["job_id"].as_str().unwrap().to_string();
        let (status, list) = call(&app.router, Method::GET, "/api/jobs?status=notified", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, job) = call(&app.router, Method::GET, &format!("/api/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["company"], "Initech");
    }

    #[tokio::test]
    async fn test_unknown_job_and_search_are_404() {
        let app = app();
        let (status, body) = call(&app.router, Method::GET, "/api/jobs/indeed:nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let uri = format!("/api/search/{}", uuid::Uuid::new_v4());
        let (status, _) = call(&app.router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_request() {
        let app = app();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/search",
            Some(json!({ "keywords": "rust", "results_per_site": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_search_runs_in_background() {
        let app = app();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/search",
            Some(json!({ "keywords": "rust engineer", "platforms": ["indeed"] })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let id = body["search_id"].as_str().unwrap().to_string();

        let mut report = Value::Null;
        for _ in 0..100 {
            let (_, status_body) =
                call(&app.router, Method::GET, &format!("/api/search/{id}"), None).await;
            if status_body["report"].is_object() {
                report = status_body["report"].clone();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(report["state"], "completed");
        assert_eq!(report["new_jobs"], 1);
        assert_eq!(report["notified"], 1);

        let (status, _) = call(
            &app.router,
            Method::POST,
            &format!("/api/search/{id}/cancel"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_notify_requires_tailored_job() {
        let app = app();
        app.store
            .upsert(listing("indeed", "p1", "Backend Engineer"))
            .await
            .unwrap();
        let (status, body) = call(
            &app.router,
            Method::POST,
            "/api/jobs/indeed:p1/notify",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
        let job = app.store.get("indeed:p1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }
}
