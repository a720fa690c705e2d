//! In-process mock of the F5XC configuration API.
//!
//! Objects are stored as JSON keyed by their full API path. Tests can
//! pre-populate objects, inject error responses for exact paths, register
//! regex-matched custom handlers, add latency and inspect every request the
//! server received.
pub mod fixtures;
mod server;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::{F5xcError, Result};

pub use server::{extract_resource_info, list_path, resource_path, ResourceInfo};

/// Request as seen by custom handlers
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body parsed as JSON, `Null` when empty or invalid
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Status plus JSON body returned by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: Value,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// F5XC style error body `{"code": .., "message": ..}`
    pub fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::json(status, json!({"code": code, "message": message.into()}))
    }
}

/// One request received by the mock
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RequestRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Closure answering requests whose path matches a registered pattern
pub type CustomHandler = Arc<dyn Fn(&MockRequest) -> MockResponse + Send + Sync>;

#[derive(Default)]
pub(crate) struct MockState {
    resources: HashMap<String, Value>,
    // first match wins, in registration order
    handlers: Vec<(Regex, CustomHandler)>,
    errors: HashMap<String, MockResponse>,
    delay: Duration,
    request_log: Vec<RequestRecord>,
}

pub(crate) type SharedState = Arc<RwLock<MockState>>;

fn read(state: &SharedState) -> RwLockReadGuard<'_, MockState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(state: &SharedState) -> RwLockWriteGuard<'_, MockState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Running mock server; stops when dropped
pub struct MockServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Start on an ephemeral localhost port
    pub async fn start() -> Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    /// Start on a specific address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| F5xcError::wrap(e, "mock_server", "bind"))?;
        let addr = listener
            .local_addr()
            .map_err(|e| F5xcError::wrap(e, "mock_server", "bind"))?;

        let state: SharedState = Arc::new(RwLock::new(MockState::default()));
        let app = server::router(Arc::clone(&state));
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!("Mock server stopped with error: {}", e);
            }
        });

        info!("Mock F5XC API listening on {}", addr);
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
        })
    }

    /// Base URL to hand to a client
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Delay applied to every response
    pub fn set_response_delay(&self, delay: Duration) {
        write(&self.state).delay = delay;
    }

    /// Register a handler for paths matching `pattern`
    pub fn set_handler<F>(&self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        let regex = Regex::new(pattern).map_err(|e| {
            F5xcError::validation("mock_handler", "pattern", &e.to_string())
        })?;
        write(&self.state).handlers.push((regex, Arc::new(handler)));
        Ok(())
    }

    /// Answer every request to exactly `path` with `status` and `body`
    pub fn set_error_response(&self, path: &str, status: u16, body: Value) {
        write(&self.state)
            .errors
            .insert(path.to_string(), MockResponse::json(status, body));
    }

    pub fn clear_error_response(&self, path: &str) {
        write(&self.state).errors.remove(path);
    }

    pub fn set_resource(&self, path: &str, resource: Value) {
        write(&self.state)
            .resources
            .insert(path.to_string(), resource);
    }

    pub fn get_resource(&self, path: &str) -> Option<Value> {
        read(&self.state).resources.get(path).cloned()
    }

    pub fn delete_resource(&self, path: &str) {
        write(&self.state).resources.remove(path);
    }

    /// Stored paths, sorted
    pub fn resource_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = read(&self.state).resources.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn request_log(&self) -> Vec<RequestRecord> {
        read(&self.state).request_log.clone()
    }

    pub fn clear_request_log(&self) {
        write(&self.state).request_log.clear();
    }

    /// Drop all objects, handlers, injected errors, the request log and delay
    pub fn reset(&self) {
        *write(&self.state) = MockState::default();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer").field("addr", &self.addr).finish()
    }
}
