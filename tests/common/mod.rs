//! Test support shared across the integration suite: a scripted in-memory
//! [`omaf_dash::http::HttpClient`] implementation, and a logging setup helper.
//!
//! The engine defines its HTTP transport as a trait it drives, rather than
//! implementing one itself (§6.1) — these tests stand in a `MockHttpClient` the way
//! the teacher's `tests/fetch_fault_injection.rs` stands up a local `axum` server to
//! inject transport faults, but in-process since there is no concrete transport to
//! exercise here.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use omaf_dash::http::{ConnectionState, GetOutcome, HttpClient, RequestState};

pub fn setup_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

/// One scripted response: either a completed request with a status and body, or a
/// transport-level failure (connection refused, timeout, etc — no status at all).
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Completed { status: u16, body: Bytes },
    TransportFailure,
}

impl ScriptedResponse {
    pub fn ok(body: &'static [u8]) -> Self {
        ScriptedResponse::Completed { status: 200, body: Bytes::from_static(body) }
    }

    pub fn not_found() -> Self {
        ScriptedResponse::Completed { status: 404, body: Bytes::new() }
    }

    pub fn server_error() -> Self {
        ScriptedResponse::Completed { status: 500, body: Bytes::new() }
    }
}

/// A `HttpClient` whose responses are supplied up front, in order, one per `get()`
/// call. Once exhausted, every further `get()` repeats the last response — useful for
/// a stalled/always-failing tail in a fault-injection scenario.
pub struct MockHttpClient {
    uri: Mutex<Option<String>>,
    queue: Mutex<VecDeque<ScriptedResponse>>,
    last_state: Mutex<RequestState>,
    completed: Mutex<bool>,
    aborted: Mutex<bool>,
}

impl MockHttpClient {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        MockHttpClient {
            uri: Mutex::new(None),
            queue: Mutex::new(responses.into_iter().collect()),
            last_state: Mutex::new(RequestState {
                connection_state: ConnectionState::Idle,
                http_status: None,
                bytes_downloaded: 0,
                output: Bytes::new(),
            }),
            completed: Mutex::new(false),
            aborted: Mutex::new(false),
        }
    }

    pub fn current_uri(&self) -> Option<String> {
        self.uri.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    fn set_uri(&mut self, uri: &str) {
        *self.uri.lock().unwrap() = Some(uri.to_string());
    }

    fn set_headers(&mut self, _headers: &[(String, String)]) {}

    fn set_byte_range(&mut self, _range: Option<(u64, u64)>) {}

    fn set_timeout_ms(&mut self, _timeout_ms: u64) {}

    async fn get(&mut self) -> GetOutcome {
        if *self.aborted.lock().unwrap() {
            *self.completed.lock().unwrap() = true;
            return GetOutcome::Started;
        }
        let mut queue = self.queue.lock().unwrap();
        let response = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        let state = match response {
            Some(ScriptedResponse::Completed { status, body }) => RequestState {
                connection_state: ConnectionState::Completed,
                http_status: Some(status),
                bytes_downloaded: body.len() as u64,
                output: body,
            },
            Some(ScriptedResponse::TransportFailure) | None => RequestState {
                connection_state: ConnectionState::Failed,
                http_status: None,
                bytes_downloaded: 0,
                output: Bytes::new(),
            },
        };
        *self.last_state.lock().unwrap() = state;
        *self.completed.lock().unwrap() = true;
        GetOutcome::Started
    }

    fn abort_request(&mut self) {
        *self.aborted.lock().unwrap() = true;
        *self.completed.lock().unwrap() = true;
    }

    async fn wait_for_completion(&mut self) {}

    fn has_completed(&self) -> bool {
        *self.completed.lock().unwrap()
    }

    fn get_state(&self) -> RequestState {
        self.last_state.lock().unwrap().clone()
    }
}
