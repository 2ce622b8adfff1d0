//! Local HTTP server standing in for a provider API
//!
//! Records every request it receives and answers from a fixed table of
//! `(method, path) -> (status, json)` replies; anything else is a 404.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Reply = (Method, String, StatusCode, Value);

#[derive(Clone)]
struct Upstream {
    replies: Arc<Vec<Reply>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub(crate) struct MockUpstream {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub async fn start(replies: Vec<(Method, &str, StatusCode, Value)>) -> Self {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let state = Upstream {
            replies: Arc::new(
                replies
                    .into_iter()
                    .map(|(method, path, status, body)| (method, path.to_string(), status, body))
                    .collect(),
            ),
            recorded: recorded.clone(),
        };
        let app = Router::new().fallback(reply).with_state(state);
        Self {
            base_url: serve(app).await,
            recorded,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    /// The single request received so far
    pub fn only_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request, got {:?}", requests);
        requests[0].clone()
    }
}

/// Serve `app` on an ephemeral local port, returning its base URL
pub(crate) async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn reply(
    State(upstream): State<Upstream>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    upstream.recorded.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let found = upstream
        .replies
        .iter()
        .find(|(m, path, _, _)| *m == method && path == uri.path());
    match found {
        Some((_, _, status, Value::Null)) => (*status).into_response(),
        Some((_, _, status, body)) => (*status, Json(body.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found"}))).into_response(),
    }
}
