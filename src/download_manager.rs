//! Download manager (§4.8): the top-level orchestrator. Parses the MPD, instantiates
//! one [`AdaptationSet`] per manifest adaptation set, binds extractor bundles to their
//! supporting tile sets, and drives the periodic service loop that fetches, assembles,
//! and rate-adapts the stream.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Barrier, Notify};
use url::Url;

use crate::bandwidth::BandwidthMonitor;
use crate::bitrate::{BitrateController, QualityDecision, TileGroupInput, TileGroupKind, RepresentationLevel};
use crate::config::OmafEngineConfig;
use crate::error::OmafError;
use crate::extractor::{Binding, ExtractorAssembler};
use crate::http::HttpClient;
use crate::mpd::{classify, AdaptationSetKind, ExtractorBinding, MPD};
use crate::segment::{SegmentStream, ServiceOutcome};
use crate::tile_picker::TilePicker;

use crate::adaptation_set::AdaptationSet as RepresentationGroup;

/// Top-level lifecycle states (§4.8 "Lifecycle").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Initializing,
    Initialized,
    Downloading,
    Stopped,
    EndOfStream,
    StreamError(String),
    ConnectionError(String),
}

/// One tick's worth of bookkeeping the orchestrator needs from the caller: the
/// current wall-clock time and a live `HttpClient` per representation id.
pub struct TickInputs<'a> {
    pub now_ms: u64,
    pub http_clients: HashMap<String, &'a mut dyn HttpClient>,
}

/// §6.4's output to the decoder pool: one ready-to-decode segment, whether it came
/// straight from a plain representation or from an extractor's assembled bytes.
#[derive(Debug, Clone)]
pub struct DecoderInput {
    pub init_segment_bytes: Option<Bytes>,
    pub segment_bytes: Bytes,
    pub segment_id: u64,
    pub presentation_time_us: u64,
    pub duration_us: u64,
    pub stream_id: i64,
    pub media_content: AdaptationSetKind,
}

/// Owns every runtime component (B-G) and presents a single media-stream
/// abstraction to the decoder pool (§4.8).
pub struct DownloadManager {
    state: ManagerState,
    mpd: Option<MPD>,
    config: OmafEngineConfig,
    device_supports_stereo: bool,
    sets: HashMap<i64, RepresentationGroup>,
    kinds: HashMap<i64, AdaptationSetKind>,
    extractors: HashMap<i64, ExtractorAssembler>,
    tile_picker: Option<TilePicker>,
    bitrate: BitrateController,
    bandwidth: &'static BandwidthMonitor,
    last_refresh_ms: u64,
    minimum_update_period_ms: u64,
    current_segment: u64,
    initial_viewport: Arc<Notify>,
    initial_viewport_published: bool,
    viewpoint_switch_barrier: Arc<Barrier>,
    /// The latest init segment bytes seen per representation id, so an assembled or
    /// directly-delivered media segment can be paired with its init segment for the
    /// §6.4 decoder-pool tuple without re-fetching it.
    init_segment_bytes: HashMap<String, Bytes>,
    /// Segments ready for the decoder pool (§6.4), drained by `drain_assembled_segments`.
    decoder_queue: VecDeque<DecoderInput>,
}

impl DownloadManager {
    /// Builds a manager from spec.md's bare defaults, with `device_supports_stereo`
    /// as the only caller-supplied tunable — equivalent to
    /// `Self::with_config(OmafEngineConfig::new().with_device_supports_stereo(..))`.
    pub fn new(device_supports_stereo: bool) -> Self {
        Self::with_config(OmafEngineConfig::new().with_device_supports_stereo(device_supports_stereo))
    }

    /// Builds a manager from a fully-specified [`OmafEngineConfig`] (§1 "Config"):
    /// the retry ceiling/spacing and cache ceiling it names are applied to every
    /// [`SegmentStream`] constructed in [`Self::initialize`], and its rate-adaptation
    /// update interval is applied to the [`BitrateController`].
    pub fn with_config(config: OmafEngineConfig) -> Self {
        let bitrate = BitrateController::new().with_update_interval_ms(config.update_interval().as_millis() as u64);
        DownloadManager {
            state: ManagerState::Idle,
            mpd: None,
            device_supports_stereo: config.device_supports_stereo(),
            config,
            sets: HashMap::new(),
            kinds: HashMap::new(),
            extractors: HashMap::new(),
            tile_picker: None,
            bitrate,
            bandwidth: crate::bandwidth::global(),
            last_refresh_ms: 0,
            minimum_update_period_ms: 0,
            current_segment: 0,
            initial_viewport: Arc::new(Notify::new()),
            initial_viewport_published: false,
            viewpoint_switch_barrier: Arc::new(Barrier::new(2)),
            init_segment_bytes: HashMap::new(),
            decoder_queue: VecDeque::new(),
        }
    }

    /// Drains every segment assembled/delivered since the last call, in the order
    /// §6.4 describes: `(initSegmentBytes, segmentBytes, segmentId, presentationTimeUs,
    /// durationUs, streamId, mediaContent)`, handed to the decoder pool.
    pub fn drain_assembled_segments(&mut self) -> Vec<DecoderInput> {
        self.decoder_queue.drain(..).collect()
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    /// The fetch state machine's current state for one representation, for
    /// diagnostics/UI (§4.8 "façade").
    pub fn representation_state(&self, adaptation_set_id: i64, representation_id: &str) -> Option<crate::segment::SegmentState> {
        self.sets.get(&adaptation_set_id).and_then(|g| g.stream(representation_id)).map(|s| s.state())
    }

    /// How many segments are currently cached for one representation, for
    /// diagnostics/UI.
    pub fn cached_segment_count(&self, adaptation_set_id: i64, representation_id: &str) -> Option<u32> {
        self.sets.get(&adaptation_set_id).and_then(|g| g.stream(representation_id)).map(|s| s.cached_segment_count())
    }

    /// Whether the extractor bundled with `adaptation_set_id` is waiting on a
    /// supporting tile's segment, for diagnostics/UI (§4.7).
    pub fn extractor_is_stalled(&self, adaptation_set_id: i64) -> Option<bool> {
        self.extractors.get(&adaptation_set_id).map(|a| a.is_stalled())
    }

    /// Parses the MPD and builds one [`AdaptationSet`] facade per manifest adaptation
    /// set in `period[0]`, classifying each and binding extractor bundles to their
    /// supporting tile sets (§3.1 "Lifecycle", §4.2, §9 "only period[0] is honored").
    pub fn initialize(&mut self, mpd_xml: &str, now_ms: u64) -> Result<(), OmafError> {
        self.state = ManagerState::Initializing;
        let mpd = crate::mpd::parse(mpd_xml)?;
        let period = mpd.first_period().ok_or_else(|| OmafError::Config("MPD has no periods".to_string()))?;
        let is_static = !mpd.is_dynamic();
        let on_demand_profile = mpd.profiles.as_deref().map(|p| p.contains("on-demand")).unwrap_or(false);

        let mut sets = HashMap::new();
        let mut kinds = HashMap::new();
        let mut extractors = HashMap::new();

        for aset in &period.adaptations {
            let Some(id) = aset.id else { continue };
            let kind = classify(aset, period);

            let mut quality_order: Vec<(String, u64)> = aset
                .representations
                .iter()
                .filter_map(|r| Some((r.id.clone()?, r.bandwidth.unwrap_or(0))))
                .collect();
            quality_order.sort_by_key(|(_, bw)| *bw);
            let ordered_ids: Vec<String> = quality_order.iter().map(|(id, _)| id.clone()).collect();

            let stereo_role = aset.stereo_role();
            let mut group = RepresentationGroup::new(id, ordered_ids.clone(), stereo_role);
            group.set_dynamic(!is_static);
            if classify::should_force_mono(stereo_role, self.device_supports_stereo) {
                group.force_mono();
            }

            for rep in &aset.representations {
                let Some(rep_id) = &rep.id else { continue };
                let duration_ms = rep
                    .SegmentTemplate
                    .as_ref()
                    .or(aset.SegmentTemplate.as_ref())
                    .and_then(|t| match (t.duration, t.timescale) {
                        (Some(d), Some(ts)) if ts > 0 => Some(d * 1000 / ts),
                        _ => None,
                    })
                    .unwrap_or(2000);
                let stream = SegmentStream::new(rep_id.clone(), id as u64, duration_ms, is_static, on_demand_profile)
                    .with_retry_policy(self.config.max_retries(), self.config.retry_spacing().as_millis() as u64)
                    .with_cache_ceiling(self.config.max_cached_segments_ceiling());
                group.add_representation(rep_id.clone(), stream);
                group.set_representation_bandwidth(rep_id.clone(), rep.bandwidth.unwrap_or(0));
            }

            if let AdaptationSetKind::VideoExtractor { binding } = &kind {
                let extractor_representation_id =
                    ordered_ids.last().cloned().unwrap_or_default();
                let assembler_binding = match binding {
                    ExtractorBinding::Preselection { partial_adaptation_set_ids } => {
                        Binding::Preselection { tile_adaptation_set_ids: partial_adaptation_set_ids.clone() }
                    }
                    ExtractorBinding::Dependency { representation_ids } => {
                        Binding::Dependency { tile_representation_ids: representation_ids.clone() }
                    }
                    ExtractorBinding::Unbound => Binding::Dependency { tile_representation_ids: Vec::new() },
                };
                extractors.insert(
                    id,
                    ExtractorAssembler::new(extractor_representation_id, assembler_binding, id as u64),
                );
            }

            kinds.insert(id, kind);
            sets.insert(id, group);
        }

        self.sets = sets;
        self.kinds = kinds;
        self.extractors = extractors;
        self.last_refresh_ms = now_ms;
        self.minimum_update_period_ms = mpd
            .minimumUpdatePeriod
            .as_deref()
            .and_then(|s| crate::mpd::model::parse_xs_duration(s).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.mpd = Some(mpd);
        self.state = ManagerState::Initialized;
        Ok(())
    }

    /// Gives the download manager a tile geometry to drive quality decisions from
    /// (§4.5, §4.8). Call once after `initialize`, before `start_download`.
    pub fn set_tile_picker(&mut self, picker: TilePicker) {
        self.tile_picker = Some(picker);
    }

    /// The renderer thread's one-shot signal that the first viewport has been
    /// published, unblocking `complete_initialization` (§4.8 "Initial viewport").
    pub fn set_initial_viewport(&mut self) {
        self.initial_viewport_published = true;
        self.initial_viewport.notify_waiters();
    }

    /// Blocks (conceptually; actually awaits) until the renderer thread has published
    /// its first viewport.
    pub async fn complete_initialization(&self) {
        if self.initial_viewport_published {
            return;
        }
        self.initial_viewport.notified().await;
    }

    /// Starts every non-tile adaptation set's download, and transitively starts the
    /// tile sets bound to each extractor (§3.1 "Relationships": tiles are never
    /// started directly, only through the extractor that bundles them).
    pub fn start_download(&mut self) {
        let tile_ids = self.tile_ids_driven_by_extractors();
        for (id, group) in self.sets.iter_mut() {
            if tile_ids.contains(id) {
                continue;
            }
            group.start_download();
        }
        for id in tile_ids {
            if let Some(group) = self.sets.get_mut(&id) {
                group.start_download();
            }
        }
        self.state = ManagerState::Downloading;
    }

    /// Every adaptation set id that must never be started/stopped directly by the
    /// top-level orchestrator, only through the extractor that bundles it (§3.1
    /// "Relationships"): every `VideoTile` set, regardless of whether its extractor
    /// bound it via Preselection or `@dependencyId`.
    fn tile_ids_driven_by_extractors(&self) -> Vec<i64> {
        self.kinds
            .iter()
            .filter(|(_, kind)| matches!(kind, AdaptationSetKind::VideoTile))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn stop_download(&mut self) {
        for group in self.sets.values_mut() {
            group.stop_download();
        }
        self.state = ManagerState::Stopped;
    }

    /// Validates and applies an MPD refresh (§4.8 step 2, §4.2 "Refresh contract").
    /// A cardinality change is fatal; otherwise only the segment templates backing
    /// existing representations are expected to change across refreshes.
    pub fn refresh_mpd(&mut self, mpd_xml: &str, now_ms: u64) -> Result<(), OmafError> {
        let Some(previous) = &self.mpd else {
            return Err(OmafError::Scheduling("cannot refresh before initialize".to_string()));
        };
        let next = crate::mpd::parse(mpd_xml)?;
        crate::mpd::validate_refresh(previous, &next)?;
        self.mpd = Some(next);
        self.last_refresh_ms = now_ms;
        Ok(())
    }

    /// Rejects a seek/playback position past the end of `period[0]` (§9 "only
    /// period[0] is honored"): a multi-period manifest's later periods are never
    /// scheduled, so a request landing in them is a scheduling error, not silently
    /// clamped or ignored.
    pub fn check_playback_time(&self, playback_time_us: u64) -> Result<(), OmafError> {
        let mpd = self.mpd.as_ref().ok_or_else(|| OmafError::Scheduling("not initialized".to_string()))?;
        let period = mpd.first_period().ok_or_else(|| OmafError::Scheduling("MPD has no periods".to_string()))?;
        if let Some(duration) = period.duration {
            let duration_us = duration.as_micros() as u64;
            if playback_time_us > duration_us {
                return Err(OmafError::Scheduling(format!(
                    "playback time {playback_time_us}us exceeds period[0] duration {duration_us}us"
                )));
            }
        }
        Ok(())
    }

    fn refresh_due(&self, now_ms: u64) -> bool {
        self.mpd.as_ref().map(|m| m.is_dynamic()).unwrap_or(false)
            && self.minimum_update_period_ms > 0
            && now_ms.saturating_sub(self.last_refresh_ms) >= self.minimum_update_period_ms
    }

    /// Rendezvous for `switchViewpoint` (§5 "Stereo/viewpoint switching barrier"):
    /// stops every active adaptation set, then waits for the decoder-queue-flush
    /// signal from the renderer side (its own call to [`Self::viewpoint_switch_barrier`])
    /// before resuming downloads against the new viewpoint's adaptation sets.
    pub async fn switch_viewpoint(&mut self, new_mpd_xml: &str, now_ms: u64) -> Result<(), OmafError> {
        self.stop_download();
        self.viewpoint_switch_barrier.wait().await;
        self.initialize(new_mpd_xml, now_ms)?;
        self.start_download();
        Ok(())
    }

    /// The renderer-side half of the `switch_viewpoint` rendezvous: call once the
    /// decoder queue has been flushed for the outgoing viewpoint.
    pub fn viewpoint_switch_barrier(&self) -> Arc<Barrier> {
        self.viewpoint_switch_barrier.clone()
    }

    /// One service-loop tick (§4.8 "Service loop", steps 2-6; step 1, `E.update`, is
    /// driven directly by the renderer thread calling `TilePicker::pick_tiles`).
    pub async fn tick(&mut self, inputs: TickInputs<'_>) -> &ManagerState {
        if self.state != ManagerState::Downloading {
            return &self.state;
        }

        let mut http_clients = inputs.http_clients;

        // Step 3: drive every representation's fetch state machine.
        let mut all_end_of_stream = true;
        let mut any_end_of_stream = false;
        let mut failed = false;
        // (group_id, representation_id, segment) for every media segment delivered
        // this tick, routed into the extractor(s) that need it below.
        let mut delivered: Vec<(i64, String, crate::segment::Segment)> = Vec::new();
        for (&group_id, group) in self.sets.iter_mut() {
            let outcomes = group.process_segment_download(&mut http_clients, inputs.now_ms).await;
            for (rep_id, outcome) in outcomes {
                match outcome {
                    ServiceOutcome::EndOfStream => any_end_of_stream = true,
                    ServiceOutcome::Failed(e) => {
                        failed = true;
                        self.state = ManagerState::StreamError(e.to_string());
                    }
                    ServiceOutcome::Delivered(segment) => {
                        all_end_of_stream = false;
                        self.bandwidth.report(segment.size_bytes, segment.download_duration_ms, inputs.now_ms);
                        match segment.role {
                            crate::segment::SegmentRole::Init => {
                                self.init_segment_bytes.insert(rep_id.clone(), segment.bytes.clone());
                            }
                            crate::segment::SegmentRole::Media => {
                                delivered.push((group_id, rep_id, segment));
                            }
                            crate::segment::SegmentRole::SidxPrefix => {}
                        }
                    }
                    ServiceOutcome::Idle => {
                        all_end_of_stream = false;
                    }
                }
            }
            if !group.is_end_of_stream() {
                all_end_of_stream = false;
            }
        }
        if failed {
            return &self.state;
        }

        // Step 3b: route delivered segments to whichever extractor bundle needs
        // them, keyed the same way the assembler's binding names its pieces (a
        // representation id for `@dependencyId` bindings, an adaptation-set id for
        // `Preselection` bindings, §3.1 "Relationships"). Tile/extractor segments
        // never reach the decoder pool directly (§3.1 "Relationships": tiles are
        // only ever consumed through their extractor); every other kind's media
        // segments are queued straight for `drain_assembled_segments` (§6.4).
        for (group_id, rep_id, segment) in delivered {
            let tile_key = group_id.to_string();
            let mut bound = false;
            for assembler in self.extractors.values_mut() {
                if assembler.binds(&rep_id) {
                    assembler.offer(&rep_id, segment.clone());
                    bound = true;
                } else if assembler.binds(&tile_key) {
                    assembler.offer(&tile_key, segment.clone());
                    bound = true;
                }
            }
            if !bound {
                if let Some(kind) = self.kinds.get(&group_id).cloned() {
                    let duration_us = self
                        .sets
                        .get(&group_id)
                        .and_then(|g| g.stream(&rep_id))
                        .map(|s| s.segment_duration_ms().max(1) * 1_000)
                        .unwrap_or(0);
                    self.decoder_queue.push_back(DecoderInput {
                        init_segment_bytes: self.init_segment_bytes.get(&rep_id).cloned(),
                        segment_bytes: segment.bytes.clone(),
                        segment_id: segment.segment_id,
                        presentation_time_us: segment.segment_id * duration_us,
                        duration_us,
                        stream_id: group_id,
                        media_content: kind,
                    });
                }
            }
        }

        // Step 4: extractor assembly.
        for (&group_id, assembler) in self.extractors.iter_mut() {
            if let Some((segment_id, bytes)) = assembler.concatenate_if_ready() {
                let duration_us = self
                    .sets
                    .get(&group_id)
                    .and_then(|g| g.stream(assembler.extractor_representation_id()))
                    .map(|s| s.segment_duration_ms().max(1) * 1_000)
                    .unwrap_or(0);
                let kind = self.kinds.get(&group_id).cloned().unwrap_or(AdaptationSetKind::VideoBase);
                self.decoder_queue.push_back(DecoderInput {
                    init_segment_bytes: self.init_segment_bytes.get(assembler.extractor_representation_id()).cloned(),
                    segment_bytes: bytes,
                    segment_id,
                    presentation_time_us: segment_id * duration_us,
                    duration_us,
                    stream_id: group_id,
                    media_content: kind,
                });
            }
        }

        // Step 5: rate adaptation.
        if let Some(bandwidth_bps) = self.bandwidth.estimate_bps() {
            let groups = self.tile_groups_for_bitrate();
            let decisions = self.bitrate.update(inputs.now_ms, bandwidth_bps as u64, &groups, self.current_segment);
            self.apply_quality_decisions(&decisions);
        }

        // Step 2 is handled by the caller invoking `refresh_mpd` when `refresh_due`.
        let _ = self.refresh_due(inputs.now_ms);

        // Step 6: end-of-stream transition.
        if any_end_of_stream || all_end_of_stream {
            self.state = ManagerState::EndOfStream;
        }

        &self.state
    }

    fn apply_quality_decisions(&mut self, decisions: &[QualityDecision]) {
        for decision in decisions {
            if let Some(group) = self.sets.get_mut(&decision.adaptation_set_id) {
                group.select_quality(decision.level, decision.from_segment);
                group.apply_scheduled_switch_if_due(self.current_segment);
            }
        }
    }

    /// Classifies the picker's current selection into foreground/margin/background
    /// tile groups with their representation-level bandwidth table, for the bitrate
    /// controller (§4.6 "Inputs").
    fn tile_groups_for_bitrate(&self) -> HashMap<TileGroupKind, Vec<TileGroupInput>> {
        let mut groups = HashMap::new();
        let Some(picker) = &self.tile_picker else { return groups };
        let (selection, _, _) = picker.latest_tiles(&Default::default());

        let mut foreground = Vec::new();
        for tile in &selection.viewport_tiles {
            if let Some(input) = self.tile_group_input(tile.adaptation_set_id, TileGroupKind::Foreground) {
                foreground.push(input);
            }
        }
        let mut margin = Vec::new();
        for tile in &selection.margin_tiles {
            if let Some(input) = self.tile_group_input(tile.adaptation_set_id, TileGroupKind::Margin) {
                margin.push(input);
            }
        }
        let selected: std::collections::HashSet<i64> = selection
            .viewport_tiles
            .iter()
            .chain(selection.margin_tiles.iter())
            .map(|t| t.adaptation_set_id)
            .collect();
        let mut background = Vec::new();
        for (&id, kind) in &self.kinds {
            if matches!(kind, AdaptationSetKind::VideoTile) && !selected.contains(&id) {
                if let Some(input) = self.tile_group_input(id, TileGroupKind::Background) {
                    background.push(input);
                }
            }
        }

        groups.insert(TileGroupKind::Foreground, foreground);
        groups.insert(TileGroupKind::Margin, margin);
        groups.insert(TileGroupKind::Background, background);
        groups
    }

    fn tile_group_input(&self, adaptation_set_id: i64, kind: TileGroupKind) -> Option<TileGroupInput> {
        let mpd = self.mpd.as_ref()?;
        let period = mpd.first_period()?;
        let aset = period.adaptations.iter().find(|a| a.id == Some(adaptation_set_id))?;
        let mut bandwidths: Vec<u64> = aset.representations.iter().map(|r| r.bandwidth.unwrap_or(0)).collect();
        bandwidths.sort_unstable();
        Some(TileGroupInput {
            kind,
            adaptation_set_id,
            levels: bandwidths.into_iter().map(|bw| RepresentationLevel { bandwidth_bps: bw }).collect(),
        })
    }

    /// Resolves the absolute fetch URI every representation currently needs next —
    /// an init segment URI for a stream that hasn't fetched one yet, otherwise its
    /// next media segment URI — so the caller can call `HttpClient::set_uri` before
    /// the next `tick` (§4.3, §6.1: this crate never issues a request itself, only
    /// decides which bytes to fetch and when).
    pub fn next_fetch_uris(&self, manifest_url: &Url) -> HashMap<String, Url> {
        let mut out = HashMap::new();
        let Some(mpd) = &self.mpd else { return out };
        let Some(period) = mpd.first_period() else { return out };
        let mpd_base = mpd.base_urls.as_ref().and_then(|v| v.first()).map(|b| b.base.as_str());
        let period_base = period.BaseURL.as_ref().map(|b| b.base.as_str());

        for aset in &period.adaptations {
            let Some(aset_id) = aset.id else { continue };
            let Some(group) = self.sets.get(&aset_id) else { continue };
            let adaptation_base = aset.BaseURL.as_ref().map(|b| b.base.as_str());

            for rep in &aset.representations {
                let Some(rep_id) = &rep.id else { continue };
                let Some(stream) = group.stream(rep_id) else { continue };
                let template = rep.SegmentTemplate.as_ref().or(aset.SegmentTemplate.as_ref());
                let Some(template) = template else { continue };
                let representation_base = rep.BaseURL.as_ref().map(|b| b.base.as_str());
                let Ok(base_url) =
                    crate::mpd::resolve_base_url(manifest_url, mpd_base, period_base, adaptation_base, representation_base)
                else {
                    continue;
                };

                let needs_init = stream.state() == crate::segment::SegmentState::DownloadingInit;
                let url = if needs_init {
                    template.initialization.as_deref().and_then(|t| {
                        crate::mpd::init_segment_url(&base_url, t, rep_id, rep.bandwidth).ok()
                    })
                } else {
                    template.media.as_deref().and_then(|t| {
                        crate::mpd::segment_media_url(
                            &base_url,
                            t,
                            rep_id,
                            rep.bandwidth,
                            Some(stream.next_segment_id() + template.startNumber.unwrap_or(1)),
                            None,
                        )
                        .ok()
                    })
                };
                if let Some(url) = url {
                    out.insert(rep_id.clone(), url);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_MPD: &str = r#"<?xml version="1.0"?>
        <MPD type="static" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011">
          <Period>
            <AdaptationSet id="1" contentType="video">
              <Representation id="base" bandwidth="3000000" width="1920" height="960"/>
            </AdaptationSet>
          </Period>
        </MPD>"#;

    #[test]
    fn initialize_classifies_and_builds_one_group_per_adaptation_set() {
        let mut manager = DownloadManager::new(true);
        manager.initialize(MINIMAL_MPD, 0).unwrap();
        assert_eq!(manager.state(), &ManagerState::Initialized);
        assert_eq!(manager.sets.len(), 1);
    }

    #[test]
    fn with_config_applies_retry_policy_to_every_representation() {
        let config = crate::config::OmafEngineConfig::new()
            .with_max_retries(5)
            .with_retry_spacing(std::time::Duration::from_millis(250))
            .with_max_cached_segments_ceiling(7);
        let mut manager = DownloadManager::with_config(config);
        manager.initialize(MINIMAL_MPD, 0).unwrap();
        let stream = manager.sets.get(&1).unwrap().stream("base").unwrap();
        assert_eq!(stream.max_retries(), 5);
        assert_eq!(stream.retry_spacing_ms(), 250);
        assert_eq!(stream.max_cached_segments_ceiling(), 7);
    }

    #[test]
    fn start_download_transitions_to_downloading() {
        let mut manager = DownloadManager::new(true);
        manager.initialize(MINIMAL_MPD, 0).unwrap();
        manager.start_download();
        assert_eq!(manager.state(), &ManagerState::Downloading);
    }

    #[test]
    fn stop_download_transitions_to_stopped() {
        let mut manager = DownloadManager::new(true);
        manager.initialize(MINIMAL_MPD, 0).unwrap();
        manager.start_download();
        manager.stop_download();
        assert_eq!(manager.state(), &ManagerState::Stopped);
    }

    #[tokio::test]
    async fn complete_initialization_returns_immediately_once_viewport_published() {
        let mut manager = DownloadManager::new(true);
        manager.initialize(MINIMAL_MPD, 0).unwrap();
        manager.set_initial_viewport();
        manager.complete_initialization().await;
    }

    #[test]
    fn refresh_before_initialize_is_rejected() {
        let mut manager = DownloadManager::new(true);
        let err = manager.refresh_mpd(MINIMAL_MPD, 0).unwrap_err();
        assert!(matches!(err, OmafError::Scheduling(_)));
    }

    #[test]
    fn playback_time_past_period_zero_duration_is_rejected() {
        const MPD_WITH_DURATION: &str = r#"<?xml version="1.0"?>
            <MPD type="static" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011">
              <Period duration="PT10S">
                <AdaptationSet id="1" contentType="video">
                  <Representation id="base" bandwidth="3000000" width="1920" height="960"/>
                </AdaptationSet>
              </Period>
            </MPD>"#;
        let mut manager = DownloadManager::new(true);
        manager.initialize(MPD_WITH_DURATION, 0).unwrap();
        manager.check_playback_time(5_000_000).unwrap();
        let err = manager.check_playback_time(11_000_000).unwrap_err();
        assert!(matches!(err, OmafError::Scheduling(_)));
    }

    #[test]
    fn next_fetch_uris_resolves_init_segment_before_first_fetch() {
        const MPD_WITH_TEMPLATE: &str = r#"<?xml version="1.0"?>
            <MPD type="static" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011">
              <Period>
                <AdaptationSet id="1" contentType="video">
                  <SegmentTemplate initialization="$RepresentationID$/init.mp4" media="$RepresentationID$/$Number%06d$.m4s" startNumber="1" duration="2" timescale="1"/>
                  <Representation id="base" bandwidth="3000000" width="1920" height="960"/>
                </AdaptationSet>
              </Period>
            </MPD>"#;
        let mut manager = DownloadManager::new(true);
        manager.initialize(MPD_WITH_TEMPLATE, 0).unwrap();
        let manifest_url = Url::parse("https://example.test/stream/manifest.mpd").unwrap();
        let uris = manager.next_fetch_uris(&manifest_url);
        assert_eq!(uris.get("base").unwrap().as_str(), "https://example.test/stream/base/init.mp4");
    }
}
