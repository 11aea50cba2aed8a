//! The per-representation segment fetch state machine (§3.2, §4.3).
//!
//! `SegmentStream` is a state-step object polled from the provider thread's service
//! loop (§9 "Generators / coroutines" — no coroutines or async keywords are needed for
//! the state machine itself, only at the `HttpClient::get` boundary it drives).

use std::time::Duration;

use bytes::Bytes;

use crate::error::OmafError;
use crate::http::{ConnectionState, GetOutcome, HttpClient};

/// Maximum retry attempts before a segment fetch gives up (§4.3 "Retry policy").
pub const MAX_RETRIES: u32 = 30;
/// Spacing between retry attempts (§4.3).
pub const RETRY_SPACING_MS: u64 = 1_000;
/// Initial cache target, in segments (§4.3 "Cache policy").
pub const INITIAL_MAX_CACHED_SEGMENTS: u32 = 3;
/// Absolute ceiling on the dynamically-raised cache target (§4.3).
pub const MAX_CACHED_SEGMENTS_CEILING: u32 = 15;
/// Bytes of the SIDX prefix fetched by sub-segment prefetch (§4.3).
pub const SIDX_PREFETCH_BYTES: u64 = 1024;

/// One role a fetched segment plays (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    Init,
    Media,
    SidxPrefix,
}

/// A contiguous byte buffer delivered to the consumer, with the bookkeeping §3.2
/// requires (`initSegmentId`, strictly monotonic `segmentId`, optional byte range).
#[derive(Debug, Clone)]
pub struct Segment {
    pub init_segment_id: u64,
    pub segment_id: u64,
    pub role: SegmentRole,
    pub byte_range: Option<(u64, u64)>,
    pub download_duration_ms: u64,
    pub size_bytes: u64,
    pub bytes: Bytes,
}

/// The fetch state machine's current state (§4.3's transition diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Uninitialized,
    DownloadingInit,
    Idle,
    DownloadingMedia,
    Retry,
    DownloadingMediaBeforeStop,
    Aborting,
    EndOfStream,
    Error,
    /// Inactive after a clean stop; distinct from `Uninitialized` so a restart can
    /// tell "never started" from "stopped".
    Inactive,
}

/// What a single `service` tick produced, so the caller (component D) can react
/// without re-deriving it from state alone.
#[derive(Debug, Clone)]
pub enum ServiceOutcome {
    /// Nothing happened this tick (waiting on capacity, retry backoff, or an
    /// in-flight request).
    Idle,
    /// A segment was delivered to the cache; `cached_segment_count` reflects the
    /// increment described in §3.2 ("incremented only on successful handoff").
    Delivered(Segment),
    /// Reached end of stream (404 on the last segment of a static representation,
    /// §4.3) — a normal terminal condition per §7, not an `OmafError`.
    EndOfStream,
    /// Retry budget exhausted; the stream transitions to `Error`.
    Failed(OmafError),
}

struct RetryState {
    attempts: u32,
    next_attempt_at_ms: u64,
}

/// The sidx-prefix sub-state-machine (§4.3 "Sub-segment prefetch"): runs in parallel
/// with the main media fetch, with its own retry counter, and never blocks it.
struct SidxPrefetch {
    active: bool,
    retries: u32,
}

impl SidxPrefetch {
    fn new() -> Self {
        SidxPrefetch { active: false, retries: 0 }
    }
}

/// Drives one representation's media-segment lifecycle: init segment once, then
/// media segments in strictly increasing `segmentId` order, with retry/abort/stop
/// semantics exactly per §4.3.
pub struct SegmentStream {
    representation_id: String,
    init_segment_id: u64,
    state: SegmentState,
    next_segment_id: u64,
    last_segment_id: Option<u64>,
    is_static: bool,
    on_demand_profile: bool,
    cached_segment_count: u32,
    max_cached_segments: u32,
    prebuffer_target: u32,
    retry: Option<RetryState>,
    sidx: SidxPrefetch,
    stop_requested: Option<StopRequest>,
    download_started_at_ms: u64,
    average_download_ms: f64,
    segment_duration_ms: u64,
    target_buffering_ms: u64,
    max_retries: u32,
    retry_spacing_ms: u64,
    max_cached_segments_ceiling: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopRequest {
    Graceful,
    Abort,
}

impl SegmentStream {
    pub fn new(representation_id: String, init_segment_id: u64, segment_duration_ms: u64, is_static: bool, on_demand_profile: bool) -> Self {
        SegmentStream {
            representation_id,
            init_segment_id,
            state: SegmentState::Uninitialized,
            next_segment_id: 0,
            last_segment_id: None,
            is_static,
            on_demand_profile,
            cached_segment_count: 0,
            max_cached_segments: INITIAL_MAX_CACHED_SEGMENTS,
            prebuffer_target: INITIAL_MAX_CACHED_SEGMENTS,
            retry: None,
            sidx: SidxPrefetch::new(),
            stop_requested: None,
            download_started_at_ms: 0,
            average_download_ms: 0.0,
            segment_duration_ms,
            target_buffering_ms: INITIAL_MAX_CACHED_SEGMENTS as u64 * segment_duration_ms.max(1),
            max_retries: MAX_RETRIES,
            retry_spacing_ms: RETRY_SPACING_MS,
            max_cached_segments_ceiling: MAX_CACHED_SEGMENTS_CEILING,
        }
    }

    /// Overrides the retry ceiling and spacing an [`crate::OmafEngineConfig`] names,
    /// in place of the §4.3 defaults baked into [`MAX_RETRIES`]/[`RETRY_SPACING_MS`].
    pub fn with_retry_policy(mut self, max_retries: u32, retry_spacing_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_spacing_ms = retry_spacing_ms;
        self
    }

    /// Overrides the dynamically-raised cache ceiling an [`crate::OmafEngineConfig`]
    /// names, in place of [`MAX_CACHED_SEGMENTS_CEILING`].
    pub fn with_cache_ceiling(mut self, max_cached_segments_ceiling: u32) -> Self {
        self.max_cached_segments_ceiling = max_cached_segments_ceiling;
        self
    }

    pub fn representation_id(&self) -> &str {
        &self.representation_id
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn cached_segment_count(&self) -> u32 {
        self.cached_segment_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_spacing_ms(&self) -> u64 {
        self.retry_spacing_ms
    }

    pub fn max_cached_segments_ceiling(&self) -> u32 {
        self.max_cached_segments_ceiling
    }

    /// The segment id the next successful `DownloadingMedia` tick will fetch (§4.6
    /// "Outputs": the effective boundary a scheduled quality switch is compared
    /// against).
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id
    }

    /// Tells the stream that a representation is statically known to end at
    /// `last_segment_id` (the last segment of an on-demand/static stream, §4.3).
    pub fn set_last_segment_id(&mut self, last: u64) {
        self.last_segment_id = Some(last);
    }

    /// `getLastSegmentId` (§4.4): `None` when the representation's extent isn't
    /// statically known (a dynamic/live representation that hasn't been told where
    /// it ends).
    pub fn last_segment_id(&self) -> Option<u64> {
        self.last_segment_id
    }

    /// The nominal duration of one media segment, for `seekToMs`/`readNextVideoFrame`
    /// presentation-time arithmetic.
    pub fn segment_duration_ms(&self) -> u64 {
        self.segment_duration_ms
    }

    /// `seekToMs`'s per-representation half: repositions the fetch cursor to
    /// `segment_id` and discards whatever was cached, without touching the
    /// init-segment lifecycle (a seek doesn't require re-fetching the init segment).
    pub fn seek_to_segment(&mut self, segment_id: u64) {
        self.next_segment_id = segment_id;
        self.cached_segment_count = 0;
        self.retry = None;
        self.sidx = SidxPrefetch::new();
        if self.state != SegmentState::Uninitialized && self.state != SegmentState::DownloadingInit {
            self.state = SegmentState::Idle;
        }
    }

    /// `clearDownloadedContent` (§4.4): drops whatever is cached without moving the
    /// fetch cursor, per §3.2's cache-accounting rule (init segments are never
    /// counted, so clearing only ever affects media segments already handed off).
    pub fn clear_downloaded_content(&mut self) {
        self.cached_segment_count = 0;
    }

    pub fn has_capacity(&self) -> bool {
        self.cached_segment_count < self.max_cached_segments
    }

    /// Called by the consumer on successful handoff; init segments are not counted
    /// (§3.2).
    pub fn on_segment_released(&mut self) {
        self.cached_segment_count = self.cached_segment_count.saturating_sub(1);
    }

    pub fn start(&mut self) {
        if self.state == SegmentState::Uninitialized || self.state == SegmentState::Inactive {
            self.state = SegmentState::DownloadingInit;
        }
    }

    /// §4.3 "stopDownloadSync": blocks conceptually until the caller has driven the
    /// service loop to a terminal tick; here we just mark the request so the next
    /// `service` call runs it to completion rather than starting new work.
    pub fn stop_sync(&mut self) {
        self.stop_requested = Some(StopRequest::Graceful);
    }

    pub fn stop_async(&mut self, abort: bool) {
        self.stop_requested = Some(if abort { StopRequest::Abort } else { StopRequest::Graceful });
    }

    pub fn has_completed(&self) -> bool {
        matches!(self.state, SegmentState::Idle | SegmentState::Inactive | SegmentState::EndOfStream | SegmentState::Error)
    }

    fn is_last_segment(&self, id: u64) -> bool {
        self.last_segment_id == Some(id)
    }

    /// Advances the state machine by one tick, driving `http` as needed. Returns what
    /// happened this tick so the caller can update cache accounting and surface
    /// errors/EOS (§4.3, §7).
    pub async fn service(&mut self, http: &mut dyn HttpClient, now_ms_value: u64) -> ServiceOutcome {
        if let Some(stop) = self.stop_requested {
            return self.service_stop(http, stop).await;
        }

        match self.state {
            SegmentState::Uninitialized | SegmentState::Inactive => ServiceOutcome::Idle,

            SegmentState::DownloadingInit => {
                match http.get().await {
                    GetOutcome::AlreadyBusy => ServiceOutcome::Idle,
                    GetOutcome::Started => {
                        http.wait_for_completion().await;
                        let req = http.get_state();
                        let ok = req.connection_state == ConnectionState::Completed
                            && req.http_status.map(|s| (200..300).contains(&s)).unwrap_or(false);
                        if ok {
                            self.state = SegmentState::Idle;
                            ServiceOutcome::Delivered(Segment {
                                init_segment_id: self.init_segment_id,
                                segment_id: 0,
                                role: SegmentRole::Init,
                                byte_range: None,
                                download_duration_ms: 0,
                                size_bytes: req.bytes_downloaded,
                                bytes: req.output,
                            })
                        } else {
                            self.state = SegmentState::Error;
                            ServiceOutcome::Failed(OmafError::Transport {
                                uri: self.representation_id.clone(),
                                source: Box::new(std::io::Error::other("init segment download failed")),
                            })
                        }
                    }
                }
            }

            SegmentState::Idle => {
                if self.has_capacity() {
                    self.state = SegmentState::DownloadingMedia;
                    self.download_started_at_ms = now_ms_value;
                }
                ServiceOutcome::Idle
            }

            SegmentState::DownloadingMedia => self.service_media_download(http, now_ms_value).await,

            SegmentState::Retry => {
                let ready = self.retry.as_ref().map(|r| now_ms_value >= r.next_attempt_at_ms).unwrap_or(true);
                if ready {
                    self.state = SegmentState::DownloadingMedia;
                    self.service_media_download(http, now_ms_value).await
                } else {
                    ServiceOutcome::Idle
                }
            }

            SegmentState::DownloadingMediaBeforeStop | SegmentState::Aborting | SegmentState::EndOfStream | SegmentState::Error => {
                ServiceOutcome::Idle
            }
        }
    }

    async fn service_stop(&mut self, http: &mut dyn HttpClient, stop: StopRequest) -> ServiceOutcome {
        match stop {
            StopRequest::Graceful => {
                if self.state == SegmentState::DownloadingMedia {
                    self.state = SegmentState::DownloadingMediaBeforeStop;
                }
                if matches!(self.state, SegmentState::DownloadingMediaBeforeStop) {
                    if http.has_completed() {
                        self.state = SegmentState::Inactive;
                        self.stop_requested = None;
                    }
                } else {
                    self.state = SegmentState::Inactive;
                    self.stop_requested = None;
                }
                ServiceOutcome::Idle
            }
            StopRequest::Abort => {
                if self.state != SegmentState::Aborting {
                    http.abort_request();
                    self.state = SegmentState::Aborting;
                }
                if http.has_completed() {
                    self.state = SegmentState::Inactive;
                    self.stop_requested = None;
                }
                ServiceOutcome::Idle
            }
        }
    }

    async fn service_media_download(&mut self, http: &mut dyn HttpClient, now_ms_value: u64) -> ServiceOutcome {
        match http.get().await {
            GetOutcome::AlreadyBusy => ServiceOutcome::Idle,
            GetOutcome::Started => {
                http.wait_for_completion().await;
                let req = http.get_state();
                let segment_id = self.next_segment_id;
                let status = req.http_status;
                let transport_ok = req.connection_state == ConnectionState::Completed;
                if transport_ok && status == Some(404) {
                    if self.is_static && self.is_last_segment(segment_id) {
                        self.state = SegmentState::EndOfStream;
                        ServiceOutcome::EndOfStream
                    } else {
                        self.record_failure_and_retry(now_ms_value)
                    }
                } else if transport_ok && status.map(|s| (200..300).contains(&s)).unwrap_or(false) {
                    self.retry = None;
                    self.next_segment_id += 1;
                    self.cached_segment_count += 1;
                    self.state = SegmentState::Idle;
                    let duration_ms = now_ms_value.saturating_sub(self.download_started_at_ms);
                    self.average_download_ms = (self.average_download_ms * 0.8) + (duration_ms as f64 * 0.2);
                    self.maybe_raise_cache_target();
                    ServiceOutcome::Delivered(Segment {
                        init_segment_id: self.init_segment_id,
                        segment_id,
                        role: SegmentRole::Media,
                        byte_range: None,
                        download_duration_ms: duration_ms,
                        size_bytes: req.bytes_downloaded,
                        bytes: req.output,
                    })
                } else {
                    self.record_failure_and_retry(now_ms_value)
                }
            }
        }
    }

    fn record_failure_and_retry(&mut self, now_ms_value: u64) -> ServiceOutcome {
        let attempts = self.retry.as_ref().map(|r| r.attempts + 1).unwrap_or(1);
        if attempts >= self.max_retries {
            self.state = SegmentState::Error;
            self.retry = None;
            return ServiceOutcome::Failed(OmafError::Transport {
                uri: self.representation_id.clone(),
                source: Box::new(std::io::Error::other(format!("exceeded {} retries", self.max_retries))),
            });
        }
        self.retry = Some(RetryState { attempts, next_attempt_at_ms: now_ms_value + self.retry_spacing_ms });
        self.state = SegmentState::Retry;
        ServiceOutcome::Idle
    }

    /// Raises `max_cached_segments` when average download time rises above the
    /// target-buffering-time / segment-duration ratio, bounded by the ceiling
    /// (§4.3 "Cache policy").
    fn maybe_raise_cache_target(&mut self) {
        if self.segment_duration_ms == 0 {
            return;
        }
        let ratio = self.target_buffering_ms as f64 / self.segment_duration_ms as f64;
        if self.average_download_ms > ratio && self.max_cached_segments < self.max_cached_segments_ceiling {
            self.max_cached_segments = (self.max_cached_segments + 1).min(self.max_cached_segments_ceiling);
        }
    }

    /// Starts (if not already active) the SIDX-prefix prefetch sub-state-machine for
    /// on-demand profile representations (§4.3 "Sub-segment prefetch").
    pub fn begin_sidx_prefetch(&mut self) -> bool {
        if !self.on_demand_profile || self.sidx.active {
            return false;
        }
        self.sidx.active = true;
        self.sidx.retries = 0;
        true
    }

    pub fn sidx_prefetch_active(&self) -> bool {
        self.sidx.active
    }

    pub fn fail_sidx_prefetch(&mut self) -> bool {
        self.sidx.retries += 1;
        if self.sidx.retries >= MAX_RETRIES {
            self.sidx.active = false;
            return false;
        }
        true
    }

    pub fn complete_sidx_prefetch(&mut self) {
        self.sidx.active = false;
        self.sidx.retries = 0;
    }
}

pub fn retry_backoff() -> Duration {
    Duration::from_millis(RETRY_SPACING_MS)
}
