//! Adaptation set façade (§4.4): owns the representations of one adaptation set and
//! exposes the small DASH contract the orchestrator drives (start/stop/seek/peek/EOS),
//! plus quality selection for tile sets and representation selection for
//! `@dependencyId`-bound extractors.

use std::collections::{HashMap, VecDeque};

use crate::mpd::StereoRole;
use crate::segment::{Segment, SegmentState, SegmentStream, ServiceOutcome};

/// What a scheduled switch targets: a quality-ranking index (tile sets, driven by the
/// bitrate controller) or a representation id directly (an `@dependencyId`-bound
/// extractor, driven by the tile picker's viewport via `selectRepresentation`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScheduledTarget {
    Level(u32),
    RepresentationId(String),
}

/// A switch scheduled to take effect at a specific segment boundary (§4.4 "Quality
/// switching").
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledSwitch {
    target: ScheduledTarget,
    from_segment: u64,
}

/// One delivered video segment still waiting to be handed to the decoder pool via
/// `readNextVideoFrame`, tagged with the presentation time it becomes due at.
struct QueuedFrame {
    segment: Segment,
    presentation_time_us: u64,
}

/// Owns every [`SegmentStream`] for one adaptation set's representations, keyed by
/// representation id, plus the quality-ranking count declared by the MPD.
pub struct AdaptationSet {
    id: i64,
    streams: HashMap<String, SegmentStream>,
    quality_order: Vec<String>, // representation ids, ordered by ascending quality_ranking
    representation_bandwidth: HashMap<String, u64>,
    active_representation: Option<String>,
    scheduled_switch: Option<ScheduledSwitch>,
    stereo_role: StereoRole,
    forced_mono: bool,
    buffering: bool,
    last_error: bool,
    is_dynamic: bool,
    frame_queue: VecDeque<QueuedFrame>,
}

impl AdaptationSet {
    pub fn new(id: i64, quality_order: Vec<String>, stereo_role: StereoRole) -> Self {
        AdaptationSet {
            id,
            streams: HashMap::new(),
            active_representation: quality_order.first().cloned(),
            quality_order,
            representation_bandwidth: HashMap::new(),
            scheduled_switch: None,
            stereo_role,
            forced_mono: false,
            buffering: false,
            last_error: false,
            is_dynamic: false,
            frame_queue: VecDeque::new(),
        }
    }

    /// Whether this set's representations belong to a dynamic (live) MPD, which
    /// gates `mpdUpdateRequired`'s heuristic (§4.8 service-loop step 2).
    pub fn set_dynamic(&mut self, is_dynamic: bool) {
        self.is_dynamic = is_dynamic;
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn add_representation(&mut self, representation_id: String, stream: SegmentStream) {
        self.streams.insert(representation_id, stream);
    }

    /// Records the representation's declared `@bandwidth`, for `getCurrentBandwidth`.
    pub fn set_representation_bandwidth(&mut self, representation_id: String, bandwidth: u64) {
        self.representation_bandwidth.insert(representation_id, bandwidth);
    }

    pub fn active_representation(&self) -> Option<&str> {
        self.active_representation.as_deref()
    }

    /// The fetch state machine for one representation, if this set carries it.
    pub fn stream(&self, representation_id: &str) -> Option<&SegmentStream> {
        self.streams.get(representation_id)
    }

    fn active_stream(&self) -> Option<&SegmentStream> {
        self.active_representation.as_ref().and_then(|id| self.streams.get(id))
    }

    fn active_stream_mut(&mut self) -> Option<&mut SegmentStream> {
        let id = self.active_representation.clone()?;
        self.streams.get_mut(&id)
    }

    /// `startDownload` (§4.4): starts the currently active representation's stream.
    pub fn start_download(&mut self) {
        if let Some(active) = &self.active_representation {
            if let Some(stream) = self.streams.get_mut(active) {
                stream.start();
            }
        }
    }

    pub fn stop_download(&mut self) {
        for stream in self.streams.values_mut() {
            stream.stop_sync();
        }
    }

    pub fn stop_download_async(&mut self, reset: bool) {
        for stream in self.streams.values_mut() {
            stream.stop_async(reset);
        }
    }

    /// `clearDownloadedContent` (§4.4): drops every representation's cached-but-
    /// undelivered segments and any frames already queued for `readNextVideoFrame`,
    /// without moving the fetch cursor or restarting the init-segment lifecycle.
    pub fn clear_downloaded_content(&mut self) {
        for stream in self.streams.values_mut() {
            stream.clear_downloaded_content();
        }
        self.frame_queue.clear();
    }

    /// `seekToMs` (§4.4): repositions the active representation's fetch cursor to the
    /// segment covering `target_ms`, using its declared segment duration, and returns
    /// the segment-aligned position actually seeked to (`resultMs`).
    ///
    /// Per §5 "Ordering guarantees" a seek invalidates whatever was in flight, so the
    /// cache and any queued frames are dropped the same way `clearDownloadedContent`
    /// drops them.
    pub fn seek_to_ms(&mut self, target_ms: u64) -> u64 {
        let Some(stream) = self.active_stream_mut() else { return target_ms };
        let duration_ms = stream.segment_duration_ms().max(1);
        let segment_id = target_ms / duration_ms;
        stream.seek_to_segment(segment_id);
        self.frame_queue.clear();
        segment_id * duration_ms
    }

    /// `getLastSegmentId` (§4.4): the active representation's statically-known final
    /// segment id, or `None` for a dynamic representation whose extent isn't known.
    pub fn get_last_segment_id(&self) -> Option<u64> {
        self.active_stream().and_then(|s| s.last_segment_id())
    }

    /// `mpdUpdateRequired` (§4.4, §4.8 step 2): true when this set is part of a
    /// dynamic MPD and its active stream is stuck retrying or has errored — the
    /// signal that the manifest's segment timeline needs refreshing before this
    /// representation can make further progress, distinct from the orchestrator's
    /// own `minimumUpdatePeriod` timer.
    pub fn mpd_update_required(&self) -> bool {
        self.is_dynamic
            && self
                .active_stream()
                .map(|s| matches!(s.state(), SegmentState::Retry | SegmentState::Error))
                .unwrap_or(false)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.active_representation
            .as_ref()
            .and_then(|id| self.streams.get(id))
            .map(|s| s.state() == SegmentState::EndOfStream)
            .unwrap_or(false)
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn is_error(&self) -> bool {
        self.last_error
            || self
                .active_representation
                .as_ref()
                .and_then(|id| self.streams.get(id))
                .map(|s| s.state() == SegmentState::Error)
                .unwrap_or(false)
    }

    /// The active representation's next segment id, the effective boundary
    /// `apply_scheduled_switch_if_due` compares a pending switch against (§4.4, §4.6).
    pub fn peek_next_segment_id(&self) -> Option<u64> {
        self.active_representation.as_ref().and_then(|id| self.streams.get(id)).map(|s| s.next_segment_id())
    }

    /// `selectQuality` (§4.4, §4.6): schedules a representation switch to take effect
    /// at `from_segment` (one greater than the last processed segment, per §4.6
    /// "Outputs"). `level` is an index into `quality_order` (0 = highest declared
    /// quality ranking in this engine's convention — ascending bandwidth).
    pub fn select_quality(&mut self, level: u32, from_segment: u64) {
        let clamped = level.min(self.quality_order.len().saturating_sub(1) as u32);
        self.scheduled_switch = Some(ScheduledSwitch { target: ScheduledTarget::Level(clamped), from_segment });
    }

    /// `selectRepresentation` (§4.4): for an extractor bound to its supporting tiles
    /// via `@dependencyId` rather than `Preselection`, the tile picker's viewport
    /// directly names which prepared representation (resolution bundle) should become
    /// active, instead of an abstract quality-ranking level. Scheduled the same way as
    /// `selectQuality`, at a segment boundary.
    pub fn select_representation(&mut self, representation_id: String, from_segment: u64) {
        self.scheduled_switch =
            Some(ScheduledSwitch { target: ScheduledTarget::RepresentationId(representation_id), from_segment });
    }

    /// Applies a scheduled switch once its effective segment boundary has been
    /// reached by every stream still active for this set (§4.4, §5 "Ordering
    /// guarantees": a switch must not alter bytes of segments `< k`).
    pub fn apply_scheduled_switch_if_due(&mut self, current_segment: u64) {
        if let Some(switch) = &self.scheduled_switch {
            if current_segment >= switch.from_segment {
                match &switch.target {
                    ScheduledTarget::Level(level) => {
                        if let Some(target_id) = self.quality_order.get(*level as usize).cloned() {
                            self.active_representation = Some(target_id);
                        }
                    }
                    ScheduledTarget::RepresentationId(representation_id) => {
                        if self.streams.contains_key(representation_id) {
                            self.active_representation = Some(representation_id.clone());
                        }
                    }
                }
                self.scheduled_switch = None;
            }
        }
    }

    /// `forceVideoTo(MONO)` (§4.4, §9 open question: accepted as a silent quality
    /// degradation, not "fixed"). Collapses a frame-packed or two-track stereo set to
    /// its chosen mono representation.
    pub fn force_mono(&mut self) {
        if self.stereo_role != StereoRole::Mono {
            self.forced_mono = true;
        }
    }

    pub fn is_forced_mono(&self) -> bool {
        self.forced_mono
    }

    /// `getCurrentVideoStreams` (§4.4): the representation id(s) currently being
    /// decoded for this set. A forced-mono collapse or a plain mono/tile set has
    /// exactly one; this façade does not model two independently-active tracks for
    /// un-collapsed stereo, since nothing downstream of it distinguishes them yet.
    pub fn get_current_video_streams(&self) -> Vec<&str> {
        self.active_representation.as_deref().into_iter().collect()
    }

    /// `getCurrentBandwidth` (§4.4): the active representation's declared
    /// `@bandwidth`, i.e. what the MPD says this stream costs, not a measured
    /// network estimate (that's component I, [`crate::bandwidth`]).
    pub fn get_current_bandwidth(&self) -> Option<u64> {
        let id = self.active_representation.as_deref()?;
        self.representation_bandwidth.get(id).copied()
    }

    /// `readNextVideoFrame` (§4.4): pops the earliest queued frame whose presentation
    /// time has come due by `current_time_us`, in delivery order (§5 "Ordering
    /// guarantees": segments are queued and therefore read back in strictly
    /// increasing `segmentId` order).
    pub fn read_next_video_frame(&mut self, current_time_us: u64) -> Option<Segment> {
        if self.frame_queue.front()?.presentation_time_us > current_time_us {
            return None;
        }
        self.frame_queue.pop_front().map(|f| f.segment)
    }

    /// Drives every representation's fetch state machine one tick. Returns the
    /// outcomes keyed by representation id, and updates buffering/error flags.
    pub async fn process_segment_download(
        &mut self,
        http_clients: &mut HashMap<String, &mut dyn crate::http::HttpClient>,
        now_ms: u64,
    ) -> HashMap<String, ServiceOutcome> {
        let mut outcomes = HashMap::new();
        for (rep_id, stream) in self.streams.iter_mut() {
            if let Some(http) = http_clients.get_mut(rep_id) {
                let outcome = stream.service(*http, now_ms).await;
                if let ServiceOutcome::Failed(_) = &outcome {
                    self.last_error = true;
                }
                outcomes.insert(rep_id.clone(), outcome);
            }
        }
        self.buffering = self
            .active_representation
            .as_ref()
            .and_then(|id| self.streams.get(id))
            .map(|s| !s.has_capacity() && s.cached_segment_count() == 0)
            .unwrap_or(false);

        if let Some(active) = self.active_representation.clone() {
            if let Some(stream) = self.streams.get(&active) {
                let duration_us = stream.segment_duration_ms().max(1) * 1_000;
                if let Some(ServiceOutcome::Delivered(segment)) = outcomes.get(&active) {
                    if segment.role == crate::segment::SegmentRole::Media {
                        let presentation_time_us = segment.segment_id * duration_us;
                        self.frame_queue.push_back(QueuedFrame { segment: segment.clone(), presentation_time_us });
                    }
                }
            }
        }

        outcomes
    }
}
