//! HTTP server & routing integration tests
//!
//! Every request goes through `build_router` with a stub engine writing into
//! a temporary output directory.

mod helpers;

use af_common::events::EventBus;
use af_dl::services::{DownloadPipeline, MetadataEnhancer};
use af_dl::{build_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use helpers::{StubBehavior, StubEngine};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;
use uuid::Uuid;

const URL: &str = "https://www.youtube.com/watch?v=abc123";

struct TestApp {
    router: Router,
    state: AppState,
    dir: TempDir,
}

fn test_app(engine: StubEngine) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = DownloadPipeline::new(
        Arc::new(engine),
        dir.path(),
        MetadataEnhancer::new("YouTube Download"),
    );
    let state = AppState::new(pipeline, EventBus::new(100), Duration::from_secs(3600));
    TestApp {
        router: build_router(state.clone()),
        state,
        dir,
    }
}

fn form_body(pairs: &[(&str, &str)]) -> Body {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    Body::from(serializer.finish())
}

fn form_request(pairs: &[(&str, &str)], json: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if json {
        builder = builder.header(header::ACCEPT, "application/json");
    }
    builder.body(form_body(pairs)).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_root_serves_form() {
    let app = test_app(StubEngine::producing());

    let response = app.router.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.contains("text/html"));
    let html = body_text(response).await;
    assert!(html.contains(r#"name="youtube_url""#));
    assert!(html.contains(r#"<option value="192" selected>"#));
    assert!(html.contains("/static/download.js"));
}

#[tokio::test]
async fn test_root_renders_escaped_flash() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(get("/?flash=%3Cscript%3Ebad%3C%2Fscript%3E&level=error"))
        .await
        .unwrap();

    let html = body_text(response).await;
    assert!(html.contains("&lt;script&gt;bad&lt;/script&gt;"));
    assert!(!html.contains("<script>bad"));
}

#[tokio::test]
async fn test_static_script_served() {
    let app = test_app(StubEngine::producing());

    let response = app.router.oneshot(get("/static/download.js")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
    assert!(body_text(response).await.contains("/progress/"));
}

#[tokio::test]
async fn test_health() {
    let app = test_app(StubEngine::producing());

    let response = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "af-dl");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["active_jobs"], 0);
}

#[tokio::test]
async fn test_progress_is_idle_before_any_job() {
    let app = test_app(StubEngine::producing());

    let response = app.router.oneshot(get("/progress")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "idle");
    assert_eq!(json["progress"], 0.0);
    assert!(json["filename"].is_null());
    assert!(json["error"].is_null());
}

#[tokio::test]
async fn test_unknown_job_progress_is_404() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(get(&format!("/progress/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_empty_url_rejected_as_json() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(form_request(&[("youtube_url", "   ")], true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Please enter a YouTube URL");
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn test_invalid_url_redirects_with_flash() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(form_request(&[("youtube_url", "https://vimeo.com/123")], false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("/?flash=Invalid+YouTube+URL"));
    assert!(location.contains("level=error"));
}

#[tokio::test]
async fn test_out_of_range_quality_rejected() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(form_request(&[("youtube_url", URL), ("quality", "999")], true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("between 32 and 320"));
}

#[tokio::test]
async fn test_form_download_then_fetch_file() {
    let app = test_app(StubEngine::producing());
    let job_id = Uuid::new_v4();

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            &[
                ("youtube_url", URL),
                ("quality", "256"),
                ("job_id", &job_id.to_string()),
            ],
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["job_id"], job_id.to_string());
    assert_eq!(json["filename"], "Video abc123.mp3");

    // Per-job and latest progress both show the finished job
    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/progress/{}", job_id)))
        .await
        .unwrap();
    let record = body_json(response).await;
    assert_eq!(record["status"], "complete");
    assert_eq!(record["progress"], 100.0);
    assert_eq!(record["filename"], "Video abc123.mp3");

    let response = app.router.clone().oneshot(get("/progress")).await.unwrap();
    assert_eq!(body_json(response).await["status"], "complete");

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/downloads/{}", job_id)))
        .await
        .unwrap();
    let details = body_json(response).await;
    assert_eq!(details["url"], URL);
    assert_eq!(details["quality_kbps"], 256);
    assert_eq!(details["status"], "complete");

    let response = app
        .router
        .oneshot(get("/downloads/Video%20abc123.mp3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("Video abc123.mp3"));
    let bytes = body_bytes(response).await;
    let on_disk = std::fs::read(app.dir.path().join("Video abc123.mp3")).unwrap();
    assert_eq!(bytes, on_disk);
}

#[tokio::test]
async fn test_form_download_redirects_with_link() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(form_request(&[("youtube_url", "https://youtu.be/xyz789")], false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("level=success"));
    assert!(location.contains("file=Video+xyz789.mp3"));
}

#[tokio::test]
async fn test_playlist_reported_as_failure() {
    let app = test_app(StubEngine::new(StubBehavior::Collection { entries: 5 }));
    let job_id = Uuid::new_v4();

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            &[("youtube_url", URL), ("job_id", &job_id.to_string())],
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("playlist"));

    let response = app
        .router
        .oneshot(get(&format!("/progress/{}", job_id)))
        .await
        .unwrap();
    let record = body_json(response).await;
    assert_eq!(record["status"], "error");
    assert!(record["error"].as_str().unwrap().contains("playlist"));
}

#[tokio::test]
async fn test_duplicate_job_id_conflicts() {
    let app = test_app(StubEngine::producing());
    let job_id = Uuid::new_v4().to_string();

    let first = app
        .router
        .clone()
        .oneshot(form_request(&[("youtube_url", URL), ("job_id", &job_id)], true))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .oneshot(form_request(&[("youtube_url", URL), ("job_id", &job_id)], true))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["success"], false);
}

#[tokio::test]
async fn test_malformed_job_id_rejected() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(form_request(&[("youtube_url", URL), ("job_id", "not-a-uuid")], true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn wait_for_status(router: &Router, job_id: &str, status: &str) -> Value {
    for _ in 0..200 {
        let response = router
            .clone()
            .oneshot(get(&format!("/progress/{}", job_id)))
            .await
            .unwrap();
        let record = body_json(response).await;
        if record["status"] == status {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached status {}", job_id, status);
}

fn api_submit(url: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/downloads")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "url": url, "quality": 128 }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_api_submission_runs_in_background() {
    let app = test_app(StubEngine::producing());

    let response = app.router.clone().oneshot(api_submit(URL)).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "idle");
    let job_id = json["job_id"].as_str().unwrap().to_string();

    let record = wait_for_status(&app.router, &job_id, "complete").await;
    assert_eq!(record["filename"], "Video abc123.mp3");
}

#[tokio::test]
async fn test_concurrent_jobs_have_independent_records() {
    let gate = Arc::new(Semaphore::new(0));
    let app = test_app(StubEngine::producing().with_gate(gate.clone()));

    let first = body_json(
        app.router
            .clone()
            .oneshot(api_submit("https://youtu.be/first1"))
            .await
            .unwrap(),
    )
    .await["job_id"]
        .as_str()
        .unwrap()
        .to_string();
    let second = body_json(
        app.router
            .clone()
            .oneshot(api_submit("https://youtu.be/second2"))
            .await
            .unwrap(),
    )
    .await["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Both are held inside the engine
    wait_for_status(&app.router, &first, "downloading").await;
    wait_for_status(&app.router, &second, "downloading").await;
    let health = body_json(app.router.clone().oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["active_jobs"], 2);

    gate.add_permits(2);

    let first_record = wait_for_status(&app.router, &first, "complete").await;
    let second_record = wait_for_status(&app.router, &second, "complete").await;
    assert_eq!(first_record["filename"], "Video first1.mp3");
    assert_eq!(second_record["filename"], "Video second2.mp3");
}

#[tokio::test]
async fn test_api_rejects_invalid_url() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(api_submit("https://example.com/video"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["message"], "Invalid YouTube URL");
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(get("/downloads/..%2F..%2Fetc%2Fpasswd"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_title_ending_in_dots_is_downloadable() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .clone()
        .oneshot(form_request(&[("youtube_url", "https://youtu.be/Wait...")], true))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["filename"], "Video Wait....mp3");

    let response = app
        .router
        .oneshot(get("/downloads/Video%20Wait....mp3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let bytes = body_bytes(response).await;
    let on_disk = std::fs::read(app.dir.path().join("Video Wait....mp3")).unwrap();
    assert_eq!(bytes, on_disk);
}

#[tokio::test]
async fn test_download_rejects_dot_names() {
    let app = test_app(StubEngine::producing());

    for uri in ["/downloads/..", "/downloads/%2E%2E", "/downloads/."] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_ne!(response.status(), StatusCode::OK, "{} was served", uri);
    }
}

#[tokio::test]
async fn test_form_render_resets_latest_progress() {
    let app = test_app(StubEngine::new(StubBehavior::SkipOutput));
    let job_id = Uuid::new_v4();

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            &[("youtube_url", URL), ("job_id", &job_id.to_string())],
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Audio file was not created: Video abc123.mp3");

    let response = app.router.clone().oneshot(get("/progress")).await.unwrap();
    assert_eq!(body_json(response).await["status"], "error");

    let response = app.router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.router.clone().oneshot(get("/progress")).await.unwrap();
    let record = body_json(response).await;
    assert_eq!(record["status"], "idle");
    assert_eq!(record["progress"], 0.0);
    assert!(record["error"].is_null());

    // The failed job is still reachable by id
    let response = app
        .router
        .oneshot(get(&format!("/progress/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn test_download_missing_file_is_404() {
    let app = test_app(StubEngine::producing());

    let response = app.router.oneshot(get("/downloads/nothing.mp3")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stream_is_sse() {
    let app = test_app(StubEngine::producing());

    let response = app
        .router
        .oneshot(get(&format!("/events?job_id={}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}
