//! Common test utilities: a scripted stand-in for the package index and
//! helpers for building clients and stores against it.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::ACCEPT, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use pydeps_crawler::config::IndexConfig;
use pydeps_crawler::{IndexClient, NoopObserver, RetryPolicy, SqliteStore};

#[derive(Clone)]
struct Scripted {
    status: StatusCode,
    body: String,
}

#[derive(Default)]
struct MockState {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    hits: Mutex<HashMap<String, usize>>,
    accepts: Mutex<HashMap<String, String>>,
}

/// HTTP server on an ephemeral local port that answers each path from a
/// queue of scripted responses. The last response queued for a path is
/// repeated once the queue is down to it; unscripted paths answer 404.
pub struct MockIndex {
    pub base_url: String,
    state: Arc<MockState>,
}

async fn answer(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    *state.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    if let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) {
        state
            .accepts
            .lock()
            .unwrap()
            .insert(path.clone(), accept.to_string());
    }

    let mut responses = state.responses.lock().unwrap();
    let scripted = match responses.get_mut(&path) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
    };

    match scripted {
        Some(Scripted { status, body }) => {
            (status, [("content-type", "application/json")], body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

impl MockIndex {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(answer).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock index");
        let addr = listener.local_addr().expect("Failed to read mock address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) -> &Self {
        self.state
            .responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted {
                status: StatusCode::from_u16(status).expect("valid status"),
                body: body.into(),
            });
        self
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    /// `Accept` header of the most recent request to `path`.
    pub fn accept(&self, path: &str) -> Option<String> {
        self.state.accepts.lock().unwrap().get(path).cloned()
    }

    pub fn client(&self) -> IndexClient {
        client_for(&self.base_url)
    }
}

/// Raw TCP server whose first response announces the full `body` length but
/// sends only its first ten bytes before closing. Later connections get the
/// whole body. Returns the base URL and a connection counter.
pub async fn start_truncating_server(body: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind truncating server");
    let addr = listener.local_addr().expect("Failed to read server address");
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let served = counter.fetch_add(1, Ordering::SeqCst);
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    body.len()
                );
                let sent = if served == 0 {
                    &body.as_bytes()[..10.min(body.len())]
                } else {
                    body.as_bytes()
                };
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(sent).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), connections)
}

/// Retry policy with millisecond backoff so retry tests finish quickly.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

pub fn client_for(base_url: &str) -> IndexClient {
    let config = IndexConfig {
        base_url: base_url.to_string(),
        ..IndexConfig::default()
    };
    IndexClient::new(&config)
        .expect("Failed to build index client")
        .with_retry(fast_retry(3))
        .with_observer(Arc::new(NoopObserver))
}

pub fn catalog_json(serial: i64, projects: &[(&str, i64)]) -> String {
    let projects: Vec<serde_json::Value> = projects
        .iter()
        .map(|(name, serial)| serde_json::json!({ "name": name, "_last-serial": serial }))
        .collect();
    serde_json::json!({
        "meta": { "api-version": "1.1", "_last-serial": serial },
        "projects": projects,
    })
    .to_string()
}

pub fn detail_json(name: &str, serial: i64, requires_dist: Option<&[&str]>) -> String {
    serde_json::json!({
        "info": { "name": name, "version": "1.0.0", "requires_dist": requires_dist },
        "last_serial": serial,
        "releases": {},
    })
    .to_string()
}

pub fn memory_store() -> Arc<SqliteStore> {
    use pydeps_crawler::PackageStore;

    let store = SqliteStore::open_in_memory().expect("Failed to open store");
    store.init_schema().expect("Failed to create schema");
    Arc::new(store)
}
