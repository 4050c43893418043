//! Test utilities for duc-client
//!
//! [`MockDuc`] emulates the controller's login and JSON-RPC endpoints and
//! records every RPC request it receives. [`TestServer`] serves it on an
//! ephemeral port.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::hash::compute_hash;
use crate::types::{Point, Salts, ValuePoint, SESSION_COOKIE};

/// One JSON-RPC request as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub id: u64,
    pub method: String,
    pub params: Vec<Vec<String>>,
    pub envelope: Value,
    pub cookie: Option<String>,
}

#[derive(Debug)]
struct MockState {
    username: String,
    password: String,
    salts: Salts,
    session_id: Option<String>,
    user_id: String,
    devid: String,
    points: Vec<Point>,
    values: BTreeMap<String, f64>,
    rpc_error: Option<String>,
    rpc_status: Option<u16>,
    rpc_body: Option<String>,
    login_status: Option<u16>,
    login_body: Option<String>,
    calls: Vec<RecordedCall>,
}

/// Scriptable stand-in for a DUC
#[derive(Debug, Clone)]
pub struct MockDuc {
    state: Arc<Mutex<MockState>>,
}

impl MockDuc {
    /// A controller accepting `username`/`password` and issuing `session_id`
    pub fn new(username: &str, password: &str, session_id: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                username: username.to_uppercase(),
                password: password.to_string(),
                salts: Salts {
                    salt_a: b"mock-salt-a".to_vec(),
                    salt_b: b"mock-salt-b".to_vec(),
                },
                session_id: Some(session_id.to_string()),
                user_id: "1".to_string(),
                devid: "MOCK-DUC".to_string(),
                points: Vec::new(),
                values: BTreeMap::new(),
                rpc_error: None,
                rpc_status: None,
                rpc_body: None,
                login_status: None,
                login_body: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Device id reported by `pdb.browse`
    pub fn with_devid(self, devid: &str) -> Self {
        self.state.lock().devid = devid.to_string();
        self
    }

    /// Add a point to the browse result
    pub fn with_point(self, pid: &str, desc: &str, point_type: &str, attr: Option<&str>) -> Self {
        self.state.lock().points.push(Point {
            pid: pid.to_string(),
            desc: desc.to_string(),
            acc: "r".to_string(),
            point_type: point_type.to_string(),
            attr: attr.map(String::from),
        });
        self
    }

    /// Set the value `pdb.getvalue` reports for `pid`
    pub fn with_value(self, pid: &str, value: f64) -> Self {
        self.set_value(pid, value);
        self
    }

    /// Issue logins without a `SESSION_ID` cookie
    pub fn without_session_cookie(self) -> Self {
        self.state.lock().session_id = None;
        self
    }

    /// User id returned on successful login (empty means rejected)
    pub fn with_user_id(self, user_id: &str) -> Self {
        self.state.lock().user_id = user_id.to_string();
        self
    }

    pub fn set_value(&self, pid: &str, value: f64) {
        self.state.lock().values.insert(pid.to_string(), value);
    }

    /// Answer every RPC with `"error": message` (HTTP 200)
    pub fn set_rpc_error(&self, message: Option<&str>) {
        self.state.lock().rpc_error = message.map(String::from);
    }

    /// Answer every RPC with this HTTP status
    pub fn set_rpc_status(&self, status: Option<u16>) {
        self.state.lock().rpc_status = status;
    }

    /// Answer every RPC with this raw body (HTTP 200)
    pub fn set_rpc_body(&self, body: Option<&str>) {
        self.state.lock().rpc_body = body.map(String::from);
    }

    /// Answer every login request with this HTTP status
    pub fn set_login_status(&self, status: Option<u16>) {
        self.state.lock().login_status = status;
    }

    /// Answer every login request with this raw body (HTTP 200)
    pub fn set_login_body(&self, body: Option<&str>) {
        self.state.lock().login_body = body.map(String::from);
    }

    /// Every RPC request received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Build the axum router serving this mock
    pub fn router(&self) -> Router {
        Router::new()
            .route("/if/login.js", get(login))
            .route("/if/json_rpc.js", post(json_rpc))
            .with_state(self.state.clone())
    }
}

async fn login(
    State(state): State<Arc<Mutex<MockState>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock();
    if let Some(status) = state.login_status {
        return status_response(status);
    }
    if let Some(body) = &state.login_body {
        return raw_json(body);
    }

    let Some(username) = query.get("username") else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let Some(hash) = query.get("hash") else {
        return Json(&state.salts).into_response();
    };

    let accepted = *username == state.username
        && *hash == compute_hash(&state.password, &state.salts);
    if !accepted {
        return Json(json!({ "userid": "" })).into_response();
    }

    let identity = json!({
        "name": "Mock Operator",
        "userid": state.user_id,
        "company": "Mock Facilities",
        "city": "Testville",
    });
    match &state.session_id {
        Some(token) => (
            [(
                header::SET_COOKIE,
                format!("{}={}; Path=/", SESSION_COOKIE, token),
            )],
            Json(identity),
        )
            .into_response(),
        None => Json(identity).into_response(),
    }
}

async fn json_rpc(
    State(state): State<Arc<Mutex<MockState>>>,
    headers: HeaderMap,
    Json(envelope): Json<Value>,
) -> Response {
    let mut state = state.lock();

    let method = envelope["method"].as_str().unwrap_or_default().to_string();
    let params: Vec<Vec<String>> =
        serde_json::from_value(envelope["params"].clone()).unwrap_or_default();
    let id = envelope["id"].as_u64().unwrap_or_default();
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    state.calls.push(RecordedCall {
        id,
        method: method.clone(),
        params: params.clone(),
        envelope: envelope.clone(),
        cookie: cookie.clone(),
    });

    if let Some(status) = state.rpc_status {
        return status_response(status);
    }
    if let Some(body) = &state.rpc_body {
        return raw_json(body);
    }

    let expected = state
        .session_id
        .as_ref()
        .map(|token| format!("{}={}", SESSION_COOKIE, token));
    if expected.is_none() || cookie != expected {
        return StatusCode::FORBIDDEN.into_response();
    }

    if let Some(message) = &state.rpc_error {
        return Json(json!({ "json-rpc": "2.0", "error": message, "id": id })).into_response();
    }

    let result = match method.as_str() {
        "pdb.browse" => json!({ "devid": state.devid, "points": state.points }),
        "pdb.getvalue" => {
            let points: Vec<ValuePoint> = params
                .first()
                .into_iter()
                .flatten()
                .filter_map(|pid| {
                    state.values.get(pid).map(|value| ValuePoint {
                        pid: pid.clone(),
                        value: *value,
                        decimals: Some(1),
                        decimals_shown: Some(1),
                    })
                })
                .collect();
            json!({ "timet": 1_700_000_000_i64, "times": "2023-11-14 22:13:20", "points": points })
        }
        "pdb.version" => json!({ "version": "mock-1.0" }),
        other => {
            return Json(json!({
                "json-rpc": "2.0",
                "error": format!("unknown method {}", other),
                "id": id,
            }))
            .into_response()
        }
    };

    Json(json!({ "json-rpc": "2.0", "result": result, "error": "", "id": id })).into_response()
}

fn status_response(status: u16) -> Response {
    StatusCode::from_u16(status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

/// Body sent verbatim, labelled as JSON
fn raw_json(body: &str) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on an ephemeral local port
    pub async fn start(router: Router) -> std::io::Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Base URL without credentials
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Connection URL with `username:password` embedded
    pub fn connection_url(&self, username: &str, password: &str) -> String {
        format!("http://{}:{}@{}", username, password, self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_urls() {
        let server = TestServer::start(Router::new()).await.unwrap();
        assert_eq!(server.base_url(), format!("http://{}", server.addr));
        assert_eq!(
            server.connection_url("admin", "pw"),
            format!("http://admin:pw@{}", server.addr)
        );
        server.shutdown().await;
    }

    #[test]
    fn test_builder_records_points() {
        let duc = MockDuc::new("admin", "pw", "tok")
            .with_point("A1", "High Temp Alarm", "enum", None)
            .with_value("A1", 1.0);
        let state = duc.state.lock();
        assert_eq!(state.points.len(), 1);
        assert_eq!(state.values.get("A1"), Some(&1.0));
        assert_eq!(state.username, "ADMIN");
    }
}
