//! Mock Freebox Player
//!
//! Serves `GET /pub/remote_control?code=..&key=..`. Keys sent with the right
//! access code are recorded; a forced failure status can be set.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

#[derive(Debug, Deserialize)]
struct RemoteQuery {
    code: String,
    key: String,
}

struct MockPlayerState {
    code: String,
    received: Vec<String>,
    rejected: usize,
    fail_status: Option<u16>,
}

/// Mock Player
pub struct MockPlayer {
    addr: SocketAddr,
    state: Arc<RwLock<MockPlayerState>>,
    handle: JoinHandle<()>,
}

impl MockPlayer {
    /// Start a mock Player on a random port, accepting `code`
    pub async fn start(code: &str) -> Self {
        let state = Arc::new(RwLock::new(MockPlayerState {
            code: code.to_string(),
            received: Vec::new(),
            rejected: 0,
            fail_status: None,
        }));

        let app = Router::new()
            .route("/pub/remote_control", get(handle_remote))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Keys accepted so far, in order
    pub async fn received(&self) -> Vec<String> {
        self.state.read().await.received.clone()
    }

    /// Requests refused for a wrong access code
    pub async fn rejected(&self) -> usize {
        self.state.read().await.rejected
    }

    /// Answer every following request with `status` (None restores 200)
    pub async fn fail_with(&self, status: Option<u16>) {
        self.state.write().await.fail_status = status;
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_remote(
    State(state): State<Arc<RwLock<MockPlayerState>>>,
    Query(query): Query<RemoteQuery>,
) -> StatusCode {
    let mut state = state.write().await;
    if query.code != state.code {
        state.rejected += 1;
        return StatusCode::FORBIDDEN;
    }
    if let Some(status) = state.fail_status {
        return StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }
    state.received.push(query.key);
    StatusCode::OK
}
