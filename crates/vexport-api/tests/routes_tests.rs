//! HTTP route tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use vexport_api::{create_router, ApiConfig, AppState};
use vexport_models::{JobInputs, MediaSource, ProcessingParams, Template};
use vexport_queue::JobQueue;

fn test_app(queue: Arc<JobQueue>) -> Router {
    let config = ApiConfig {
        metrics_enabled: false,
        ..ApiConfig::default()
    };
    create_router(AppState::new(config, queue), None)
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn healthz_is_an_alias() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_lists_endpoints() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let endpoints: Vec<&str> = json["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(endpoints.contains(&"/ws"));
    assert!(!endpoints.contains(&"/metrics"));
}

#[tokio::test]
async fn queue_status_reflects_connections_and_jobs() {
    let queue = Arc::new(JobQueue::new());
    let (owner, _rx) = queue.register().await;
    let (_other, _rx2) = queue.register().await;
    queue
        .submit(
            &owner,
            JobInputs::video_only(MediaSource::url("https://example.com/a.mp4")),
            ProcessingParams::default(),
        )
        .await
        .unwrap();

    let response = get(test_app(queue), "/api/queue").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["connected_users"], 2);
    assert_eq!(json["queue_length"], 1);
    assert_eq!(json["processing"], false);
    assert!(json.get("your_position").is_none());
}

#[tokio::test]
async fn job_lookup_reports_state_and_position() {
    let queue = Arc::new(JobQueue::new());
    let (owner, _rx) = queue.register().await;
    let job_id = queue
        .submit(
            &owner,
            JobInputs::video_only(MediaSource::url("https://example.com/a.mp4")),
            ProcessingParams::default(),
        )
        .await
        .unwrap();

    let response = get(test_app(Arc::clone(&queue)), &format!("/api/jobs/{}", job_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["job_id"], job_id.as_str());
    assert_eq!(json["state"], "queued");
    assert_eq!(json["position"], 1);

    queue.try_next_job().await.unwrap();
    let json = body_json(get(test_app(queue), &format!("/api/jobs/{}", job_id)).await).await;
    assert_eq!(json["state"], "processing");
    assert_eq!(json["position"], 0);
}

#[tokio::test]
async fn templates_list_valid_presets() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/api/templates").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let templates: Vec<Template> = serde_json::from_value(json["templates"].clone()).unwrap();
    let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Original",
            "Black & White",
            "Red Tint",
            "Blue Tint",
            "Bright & Vibrant",
            "Dark & Moody",
            "Fast & Energetic",
            "Slow & Smooth",
            "Cinematic",
        ]
    );
    for template in &templates {
        assert!(
            template.params.violations().is_empty(),
            "template {} is invalid",
            template.name
        );
    }
    assert_eq!(json["templates"][1]["params"]["saturation"], 0.0);
}

#[tokio::test]
async fn unknown_job_returns_404_with_detail() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/api/jobs/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_route_absent_when_disabled() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let response = get(test_app(Arc::new(JobQueue::new())), "/health").await;
    let headers = response.headers();

    let request_id = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(request_id.len(), 36);
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let app = test_app(Arc::new(JobQueue::new()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
}
