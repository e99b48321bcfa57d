#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

pub const API_KEY: &str = "test-key";
pub const FAKE_QR: &str = "data:image/png;base64,RkFLRQ==";

/// Session names with scripted misbehavior
pub const BROKEN_SESSION: &str = "broken";
pub const GARBLED_SESSION: &str = "garbled";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub api_key: Option<String>,
}

#[derive(Default)]
pub struct FakeState {
    pub sessions: HashMap<String, Value>,
    pub requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<FakeState>>;

/// In-process stand-in for the WAHA gateway
pub struct FakeWaha {
    pub port: u16,
    pub base_url: String,
    pub state: Shared,
}

impl FakeWaha {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));

        let app = Router::new()
            .route("/api/sessions", get(list_sessions))
            .route("/api/sessions/", post(create_session))
            .route("/api/sessions/start", post(start_session))
            .route("/api/sessions/:name", get(get_session).delete(delete_session))
            .route("/api/sessions/:name/auth/qr", get(get_auth_qr))
            .route("/api/sessions/:name/qr", get(get_qr))
            .route("/api/sessions/:name/stop", post(stop_session))
            .route("/api/sessions/:name/restart", post(restart_session))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind fake gateway")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self { port, base_url, state };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            // Any HTTP answer means the listener is up
            if client.get(format!("{}/api/sessions/ping", self.base_url)).send().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("fake gateway did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn put_session(&self, name: &str, session: Value) {
        self.state.lock().unwrap().sessions.insert(name.to_string(), session);
    }

    pub fn has_session(&self, name: &str) -> bool {
        self.state.lock().unwrap().sessions.contains_key(name)
    }

    /// Requests seen so far, minus readiness checks
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.path != "/api/sessions/ping")
            .cloned()
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

fn record(state: &Shared, method: &str, path: String, headers: &HeaderMap) -> Result<(), Response> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let authorized = api_key.as_deref() == Some(API_KEY);
    state.lock().unwrap().requests.push(RecordedRequest {
        method: method.to_string(),
        path,
        api_key,
    });

    if authorized {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response())
    }
}

fn misbehave(name: &str) -> Option<Response> {
    match name {
        BROKEN_SESSION => Some(
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "engine crashed" }))).into_response(),
        ),
        GARBLED_SESSION => Some((StatusCode::OK, "<html>gateway</html>").into_response()),
        _ => None,
    }
}

async fn list_sessions(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "GET", "/api/sessions".to_string(), &headers) {
        return denied;
    }

    let sessions: Vec<Value> = state.lock().unwrap().sessions.values().cloned().collect();
    Json(sessions).into_response()
}

async fn get_session(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "GET", format!("/api/sessions/{}", name), &headers) {
        return denied;
    }
    if let Some(response) = misbehave(&name) {
        return response;
    }

    match state.lock().unwrap().sessions.get(&name) {
        Some(session) => Json(session.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Session not found" }))).into_response(),
    }
}

async fn start_session(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = record(&state, "POST", "/api/sessions/start".to_string(), &headers) {
        return denied;
    }

    let name = body.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    if let Some(response) = misbehave(&name) {
        return response;
    }

    let session = json!({ "name": name, "status": "SCAN_QR_CODE" });
    state.lock().unwrap().sessions.insert(name, session.clone());
    Json(session).into_response()
}

async fn create_session(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(denied) = record(&state, "POST", "/api/sessions/".to_string(), &headers) {
        return denied;
    }

    let name = body.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    let session = json!({ "name": name, "status": "STARTING" });
    state.lock().unwrap().sessions.insert(name, session.clone());
    (StatusCode::CREATED, Json(session)).into_response()
}

/// Newer path; this fake has no QR there yet
async fn get_auth_qr(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "GET", format!("/api/sessions/{}/auth/qr", name), &headers) {
        return denied;
    }
    Json(json!({ "qr": "" })).into_response()
}

async fn get_qr(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "GET", format!("/api/sessions/{}/qr", name), &headers) {
        return denied;
    }
    Json(json!({ "qr": FAKE_QR })).into_response()
}

async fn stop_session(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "POST", format!("/api/sessions/{}/stop", name), &headers) {
        return denied;
    }

    let mut guard = state.lock().unwrap();
    match guard.sessions.get_mut(&name) {
        Some(session) => {
            session["status"] = json!("STOPPED");
            StatusCode::CREATED.into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Session not found" }))).into_response(),
    }
}

async fn restart_session(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "POST", format!("/api/sessions/{}/restart", name), &headers) {
        return denied;
    }

    let mut guard = state.lock().unwrap();
    match guard.sessions.get_mut(&name) {
        Some(session) => {
            session["status"] = json!("WORKING");
            StatusCode::CREATED.into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Session not found" }))).into_response(),
    }
}

async fn delete_session(State(state): State<Shared>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    if let Err(denied) = record(&state, "DELETE", format!("/api/sessions/{}", name), &headers) {
        return denied;
    }
    if let Some(response) = misbehave(&name) {
        return response;
    }

    match state.lock().unwrap().sessions.remove(&name) {
        Some(_) => StatusCode::OK.into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Session not found" }))).into_response(),
    }
}
