//! Integration tests for the bb-server HTTP API
//!
//! The router runs against an in-memory database, an in-memory object store
//! and a provider double that finishes every job on the first status check.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bb_common::api::auth::issue_token;
use bb_common::db::{init_memory_database, RuntimeSettings};
use bb_common::events::EventBus;
use bb_server::providers::{
    GenerationProvider, PollConfig, ProviderError, ProviderJobRequest, ProviderKind,
    ProviderRegistry, ProviderStatus,
};
use bb_server::services::GenerationRunner;
use bb_server::storage::AssetStorage;
use bb_server::{build_router, AppState};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];
const BOUNDARY: &str = "bb-test-boundary";

/// Replicate stand-in whose jobs succeed with a single PNG output
struct InstantProvider;

#[async_trait]
impl GenerationProvider for InstantProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Replicate
    }

    async fn submit(&self, _request: &ProviderJobRequest) -> Result<String, ProviderError> {
        Ok(format!("pred-{}", uuid::Uuid::new_v4()))
    }

    async fn status(&self, _job_id: &str) -> Result<ProviderStatus, ProviderError> {
        Ok(ProviderStatus::Succeeded {
            outputs: vec!["https://cdn.example.com/out.png".to_string()],
        })
    }

    async fn cancel(&self, _job_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn download_output(&self, _url: &str, max_bytes: u64) -> Result<Bytes, ProviderError> {
        if PNG.len() as u64 > max_bytes {
            return Err(ProviderError::TooLarge { limit: max_bytes });
        }
        Ok(Bytes::from_static(PNG))
    }
}

/// Test helper: application state with the given secret and upload cap
async fn setup_state(shared_secret: i64, max_upload_bytes: u64) -> AppState {
    let db = init_memory_database().await.expect("Should create in-memory database");
    let storage = AssetStorage::in_memory();
    let event_bus = EventBus::new(64);

    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(InstantProvider));

    let settings = RuntimeSettings {
        max_upload_bytes,
        ..RuntimeSettings::default()
    };
    let poll_config = PollConfig {
        interval: Duration::from_millis(20),
        max_attempts: 20,
    };
    let generations = GenerationRunner::new(
        db.clone(),
        storage.clone(),
        providers,
        event_bus.clone(),
        poll_config,
        settings.max_download_bytes,
    );

    AppState::new(db, storage, generations, event_bus, shared_secret, settings)
}

/// Test helper: development-mode app (auth disabled, caller named by header)
async fn setup_app() -> AppState {
    setup_state(0, 1024 * 1024).await
}

fn app(state: &AppState) -> Router {
    build_router(state.clone())
}

fn request(method: &str, uri: &str, user: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user);
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let response = app(state).oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file {
            Some((file_name, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    name, file_name, content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(user: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/assets/upload")
        .header("x-user-id", user)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn wait_for_generation(state: &AppState, user: &str, id: &str) -> Value {
    for _ in 0..200 {
        let (_, job) = send(state, request("GET", &format!("/api/generations/{}", id), user, None)).await;
        if job["status"] != "pending" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation {} never finished", id);
}

// =============================================================================
// Health, build info and authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let state = setup_state(42, 1024).await;

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&state, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "bb-server");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_buildinfo_is_public() {
    let state = setup_state(42, 1024).await;

    let req = Request::builder().uri("/api/buildinfo").body(Body::empty()).unwrap();
    let (status, body) = send(&state, req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["git_hash"].is_string());
    assert!(body["build_profile"].is_string());
}

#[tokio::test]
async fn test_bearer_token_required_when_secret_set() {
    let state = setup_state(42, 1024).await;

    let req = Request::builder().uri("/api/projects").body(Body::empty()).unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // The development header is ignored once a secret is configured
    let (status, _) = send(&state, request("GET", "/api/projects", "alice", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = issue_token("alice", Duration::from_secs(60), 43).unwrap();
    let req = Request::builder()
        .uri("/api/projects")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = issue_token("alice", Duration::from_secs(60), 42).unwrap();
    let req = Request::builder()
        .uri("/api/projects")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_development_mode_requires_user_header() {
    let state = setup_app().await;

    let req = Request::builder().uri("/api/assets").body(Body::empty()).unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, request("GET", "/api/assets", "alice", None)).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Projects and folders
// =============================================================================

#[tokio::test]
async fn test_project_lifecycle_and_isolation() {
    let state = setup_app().await;

    let (status, project) = send(
        &state,
        request("POST", "/api/projects", "alice", Some(json!({"name": "  Launch  ", "description": "Q3"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["name"], "Launch");
    let id = project["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        request("POST", "/api/projects", "alice", Some(json!({"name": "Launch"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Same name for another user is fine; their view excludes alice's project
    let (status, _) = send(&state, request("POST", "/api/projects", "bob", Some(json!({"name": "Launch"})))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&state, request("GET", &format!("/api/projects/{}", id), "bob", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) = send(
        &state,
        request("PATCH", &format!("/api/projects/{}", id), "alice", Some(json!({"description": null}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], Value::Null);
    assert_eq!(updated["name"], "Launch");

    let (status, summary) = send(&state, request("GET", &format!("/api/projects/{}", id), "alice", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["folder_count"], 0);

    let (status, _) = send(&state, request("DELETE", &format!("/api/projects/{}", id), "alice", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&state, request("GET", &format!("/api/projects/{}", id), "alice", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let state = setup_app().await;

    let (status, body) = send(&state, request("GET", "/api/projects/not-a-uuid", "alice", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(
        &state,
        request("DELETE", &format!("/api/experiments/{}/assets/nope", uuid::Uuid::new_v4()), "alice", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let req = Request::builder()
        .method("POST")
        .uri("/api/assets/upload")
        .header("x-user-id", "alice")
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(PNG))
        .unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_project_list_pagination() {
    let state = setup_app().await;
    for i in 0..5 {
        send(&state, request("POST", "/api/projects", "alice", Some(json!({"name": format!("P{}", i)})))).await;
    }

    let (status, page) = send(&state, request("GET", "/api/projects?page=2&page_size=2", "alice", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 5);
    assert_eq!(page["page"], 2);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let (status, body) = send(&state, request("GET", "/api/projects?page=abc", "alice", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_folder_move_rewrites_subtree() {
    let state = setup_app().await;
    let (_, project) = send(&state, request("POST", "/api/projects", "alice", Some(json!({"name": "P"})))).await;
    let folders_uri = format!("/api/projects/{}/folders", project["id"].as_str().unwrap());

    let (status, renders) = send(&state, request("POST", &folders_uri, "alice", Some(json!({"name": "renders"})))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(renders["path"], "/renders");

    let (_, finals) = send(
        &state,
        request("POST", &folders_uri, "alice", Some(json!({"name": "final", "parent_id": renders["id"]}))),
    )
    .await;
    assert_eq!(finals["path"], "/renders/final");

    let (status, body) = send(&state, request("POST", &folders_uri, "alice", Some(json!({"name": "renders"})))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"].as_str().unwrap().contains("renders"));

    let (_, archive) = send(&state, request("POST", &folders_uri, "alice", Some(json!({"name": "archive"})))).await;
    let (status, moved) = send(
        &state,
        request(
            "PATCH",
            &format!("/api/folders/{}", renders["id"].as_str().unwrap()),
            "alice",
            Some(json!({"name": "old-renders", "parent_id": archive["id"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["path"], "/archive/old-renders");

    let (_, child) = send(
        &state,
        request("GET", &format!("/api/folders/{}", finals["id"].as_str().unwrap()), "alice", None),
    )
    .await;
    assert_eq!(child["path"], "/archive/old-renders/final");

    // Into its own subtree
    let (status, _) = send(
        &state,
        request(
            "PATCH",
            &format!("/api/folders/{}", archive["id"].as_str().unwrap()),
            "alice",
            Some(json!({"parent_id": finals["id"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = send(&state, request("GET", &folders_uri, "alice", None)).await;
    let paths: Vec<&str> = listed.as_array().unwrap().iter().map(|f| f["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["/archive", "/archive/old-renders", "/archive/old-renders/final"]);
}

// =============================================================================
// Assets
// =============================================================================

#[tokio::test]
async fn test_text_asset_content_and_delete() {
    let state = setup_app().await;
    let mut events = state.event_bus.subscribe();

    let (status, asset) = send(
        &state,
        request(
            "POST",
            "/api/assets",
            "alice",
            Some(json!({"title": "Script", "content": "INT. STUDIO - NIGHT", "tags": ["draft", " draft "]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(asset["kind"], "text");
    assert_eq!(asset["mime_type"], "text/plain");
    assert_eq!(asset["tags"], json!(["draft"]));
    let id = asset["id"].as_str().unwrap().to_string();
    assert_eq!(events.try_recv().unwrap().event_type(), "AssetCreated");

    let response = app(&state)
        .oneshot(request("GET", &format!("/api/assets/{}/content", id), "alice", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"INT. STUDIO - NIGHT");

    let (_, found) = send(&state, request("GET", "/api/assets?q=scr&tag=draft", "alice", None)).await;
    assert_eq!(found["total"], 1);
    let (_, none) = send(&state, request("GET", "/api/assets?kind=image", "alice", None)).await;
    assert_eq!(none["total"], 0);

    let (status, _) = send(&state, request("DELETE", &format!("/api/assets/{}", id), "bob", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&state, request("DELETE", &format!("/api/assets/{}", id), "alice", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(events.try_recv().unwrap().event_type(), "AssetDeleted");

    let (status, _) = send(&state, request("GET", &format!("/api/assets/{}/content", id), "alice", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_multipart_upload_sniffs_kind() {
    let state = setup_app().await;
    let (_, project) = send(&state, request("POST", "/api/projects", "alice", Some(json!({"name": "P"})))).await;
    let project_id = project["id"].as_str().unwrap();

    let body = multipart_body(&[
        ("file", Some(("dot.bin", "application/octet-stream")), PNG),
        ("project_id", None, project_id.as_bytes()),
        ("tags", None, b"hero, sky"),
    ]);
    let (status, asset) = send(&state, upload_request("alice", body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(asset["kind"], "image");
    assert_eq!(asset["mime_type"], "image/png");
    assert_eq!(asset["title"], "dot");
    assert_eq!(asset["size_bytes"], PNG.len());
    assert_eq!(asset["project_id"], project_id);
    assert_eq!(asset["tags"], json!(["hero", "sky"]));
}

#[tokio::test]
async fn test_upload_rejections() {
    let state = setup_state(0, 64).await;

    let pdf = b"%PDF-1.4\n%binary";
    let body = multipart_body(&[("file", Some(("doc.pdf", "application/pdf")), pdf)]);
    let (status, body) = send(&state, upload_request("alice", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("application/pdf"));

    let big = vec![b'a'; 65];
    let body = multipart_body(&[("file", Some(("notes.txt", "text/plain")), &big)]);
    let (status, body) = send(&state, upload_request("alice", body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    let body = multipart_body(&[("title", None, b"no file")]);
    let (status, _) = send(&state, upload_request("alice", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Prompts, experiments, comparisons, workflows
// =============================================================================

#[tokio::test]
async fn test_prompt_use_counter() {
    let state = setup_app().await;
    let (status, prompt) = send(
        &state,
        request("POST", "/api/prompts", "alice", Some(json!({"title": "Fox", "text": "a red fox at dawn", "category": "animals"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = prompt["id"].as_str().unwrap();

    let (_, used) = send(&state, request("POST", &format!("/api/prompts/{}/use", id), "alice", None)).await;
    assert_eq!(used["use_count"], 1);
    assert!(used["last_used_at"].is_string());

    let (_, listed) = send(&state, request("GET", "/api/prompts?category=animals", "alice", None)).await;
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_experiment_links_assets() {
    let state = setup_app().await;
    let (_, experiment) = send(&state, request("POST", "/api/experiments", "alice", Some(json!({"name": "Seeds"})))).await;
    let (_, asset) = send(
        &state,
        request("POST", "/api/assets", "alice", Some(json!({"title": "Notes", "content": "seed 42 wins"}))),
    )
    .await;
    let exp_uri = format!("/api/experiments/{}", experiment["id"].as_str().unwrap());

    let (status, detail) = send(
        &state,
        request("POST", &format!("{}/assets", exp_uri), "alice", Some(json!({"asset_id": asset["id"], "note": "baseline"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["assets"][0]["note"], "baseline");

    let (_, completed) = send(&state, request("PATCH", &exp_uri, "alice", Some(json!({"status": "completed"})))).await;
    assert!(completed["concluded_at"].is_string());

    let (status, _) = send(
        &state,
        request("DELETE", &format!("{}/assets/{}", exp_uri, asset["id"].as_str().unwrap()), "alice", None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, detail) = send(&state, request("GET", &exp_uri, "alice", None)).await;
    assert_eq!(detail["assets"], json!([]));
}

#[tokio::test]
async fn test_comparison_results_pick_winner() {
    let state = setup_app().await;
    let (status, comparison) = send(
        &state,
        request(
            "POST",
            "/api/comparisons",
            "alice",
            Some(json!({"name": "Foxes", "prompt": "a red fox", "provider": "replicate", "models": ["a/one", "b/two"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comparison["winner"], Value::Null);
    let entries_uri = format!("/api/comparisons/{}/entries", comparison["id"].as_str().unwrap());

    send(&state, request("PUT", &entries_uri, "alice", Some(json!({"model": "a/one", "rating": 3})))).await;
    let (status, rated) = send(&state, request("PUT", &entries_uri, "alice", Some(json!({"model": "b/two", "rating": 5})))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rated["winner"], "b/two");

    let (status, _) = send(&state, request("PUT", &entries_uri, "alice", Some(json!({"model": "c/three", "rating": 1})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_workflow_validation_and_use() {
    let state = setup_app().await;
    let (status, _) = send(
        &state,
        request("POST", "/api/workflows", "alice", Some(json!({"name": "Bad", "steps": [{"name": "x", "provider": "akool", "kind": "image"}]}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, workflow) = send(
        &state,
        request(
            "POST",
            "/api/workflows",
            "alice",
            Some(json!({"name": "Portrait", "steps": [{"name": "still", "provider": "replicate", "kind": "image", "model": "a/b"}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, used) = send(
        &state,
        request("POST", &format!("/api/workflows/{}/use", workflow["id"].as_str().unwrap()), "alice", None),
    )
    .await;
    assert_eq!(used["use_count"], 1);
}

// =============================================================================
// Generations
// =============================================================================

#[tokio::test]
async fn test_generation_produces_asset() {
    let state = setup_app().await;
    let (_, project) = send(&state, request("POST", "/api/projects", "alice", Some(json!({"name": "P"})))).await;

    let (status, job) = send(
        &state,
        request(
            "POST",
            "/api/generations",
            "alice",
            Some(json!({
                "provider": "replicate",
                "kind": "image",
                "model": "black-forest-labs/flux-schnell",
                "prompt": "a red fox at dawn",
                "project_id": project["id"]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(job["status"], "pending");

    let done = wait_for_generation(&state, "alice", job["id"].as_str().unwrap()).await;
    assert_eq!(done["status"], "succeeded");
    assert_eq!(done["asset_ids"].as_array().unwrap().len(), 1);

    let asset_id = done["asset_ids"][0].as_str().unwrap();
    let (_, asset) = send(&state, request("GET", &format!("/api/assets/{}", asset_id), "alice", None)).await;
    assert_eq!(asset["kind"], "image");
    assert_eq!(asset["title"], "a red fox at dawn");
    assert_eq!(asset["generation_id"], job["id"]);
    assert_eq!(asset["project_id"], project["id"]);

    // Finished jobs cannot be cancelled
    let (status, _) = send(
        &state,
        request("POST", &format!("/api/generations/{}/cancel", job["id"].as_str().unwrap()), "alice", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = send(&state, request("GET", "/api/generations?status=succeeded", "alice", None)).await;
    assert_eq!(listed["total"], 1);
    let (_, others) = send(&state, request("GET", "/api/generations", "bob", None)).await;
    assert_eq!(others["total"], 0);
}

#[tokio::test]
async fn test_generation_requires_configured_provider() {
    let state = setup_app().await;
    let (status, body) = send(
        &state,
        request(
            "POST",
            "/api/generations",
            "alice",
            Some(json!({"provider": "runway", "kind": "video", "inputs": {"image_url": "https://cdn.example.com/in.png"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("not configured"));

    let (status, _) = send(
        &state,
        request("POST", "/api/generations", "alice", Some(json!({"provider": "replicate", "kind": "image", "model": "a/b"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comparison_run_fills_entries() {
    let state = setup_app().await;
    let (_, comparison) = send(
        &state,
        request(
            "POST",
            "/api/comparisons",
            "alice",
            Some(json!({"name": "Foxes", "prompt": "a red fox", "provider": "replicate", "models": ["a/one", "b/two"]})),
        ),
    )
    .await;
    let uri = format!("/api/comparisons/{}", comparison["id"].as_str().unwrap());

    let req = Request::builder()
        .method("POST")
        .uri(format!("{}/run", uri))
        .header("x-user-id", "alice")
        .body(Body::empty())
        .unwrap();
    let (status, jobs) = send(&state, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let jobs = jobs.as_array().unwrap().clone();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["model"], "a/one");

    for job in &jobs {
        let done = wait_for_generation(&state, "alice", job["id"].as_str().unwrap()).await;
        assert_eq!(done["status"], "succeeded");
    }

    let (_, filled) = send(&state, request("GET", &uri, "alice", None)).await;
    for (entry, job) in filled["entries"].as_array().unwrap().iter().zip(&jobs) {
        assert_eq!(entry["generation_id"], job["id"]);
        assert!(entry["asset_id"].is_string());
    }
}
