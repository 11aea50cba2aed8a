//! The external HTTP client interface (§6.1), consumed but not implemented by the
//! core. Real network I/O, TLS, proxying and DNS are all someone else's problem — the
//! host application plugs in a concrete [`HttpClient`]; this crate never constructs
//! one itself.

use async_trait::async_trait;
use bytes::Bytes;

/// State of one in-flight or completed request, as polled by the segment fetch state
/// machine (§4.3, §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    InProgress,
    Completed,
    Failed,
    Aborted,
}

/// A snapshot of a request's progress, returned by [`HttpClient::get_state`].
#[derive(Debug, Clone)]
pub struct RequestState {
    pub connection_state: ConnectionState,
    pub http_status: Option<u16>,
    pub bytes_downloaded: u64,
    pub output: Bytes,
}

/// Outcome of starting a GET: either the request was accepted and is now in flight,
/// or the client was already servicing another request on this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetOutcome {
    Started,
    AlreadyBusy,
}

/// The HTTP transport the core drives. One instance of an implementor is expected per
/// [`crate::segment::SegmentStream`] (so that concurrent representations do not
/// serialize on a shared connection handle); the core never constructs a concrete
/// transport itself.
///
/// A 3xx response must be followed transparently by the implementation — the core
/// never sees a redirect status.
#[async_trait]
pub trait HttpClient: Send + Sync {
    fn set_uri(&mut self, uri: &str);

    fn set_headers(&mut self, headers: &[(String, String)]);

    /// Sets the `Range: bytes=start-end` header, or clears any byte-range
    /// restriction when `None`.
    fn set_byte_range(&mut self, range: Option<(u64, u64)>);

    fn set_timeout_ms(&mut self, timeout_ms: u64);

    /// Starts (or continues, if already in flight) a GET request. Returns
    /// immediately; progress is observed via [`HttpClient::get_state`] or awaited via
    /// [`HttpClient::wait_for_completion`].
    async fn get(&mut self) -> GetOutcome;

    /// Requests cancellation of the current request. Non-blocking; completion of the
    /// abort is observed via [`HttpClient::has_completed`] on a later poll.
    fn abort_request(&mut self);

    /// Blocks until the current request reaches a terminal state
    /// (`Completed`/`Failed`/`Aborted`).
    async fn wait_for_completion(&mut self);

    fn has_completed(&self) -> bool;

    fn get_state(&self) -> RequestState;
}
