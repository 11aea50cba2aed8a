//! Engine tunables, following the builder pattern the teacher crate uses for its
//! `DashDownloader` (method-chained `with_*` setters over a `Default` base).

use std::time::Duration;

/// Configuration for a [`crate::DownloadManager`], carrying every tunable spec.md
/// names as a constant or default rather than hard-coding it at the call site.
///
/// # Example
///
/// ```rust
/// use omaf_dash::OmafEngineConfig;
///
/// let config = OmafEngineConfig::new()
///     .with_viewport_expansion_factor(1.25)
///     .with_device_pixel_budget(3840 * 1920);
/// ```
#[derive(Debug, Clone)]
pub struct OmafEngineConfig {
    max_retries: u32,
    retry_spacing: Duration,
    initial_max_cached_segments: u32,
    max_cached_segments_ceiling: u32,
    viewport_expansion_factor: f64,
    update_interval: Duration,
    bandwidth_window_samples: usize,
    mpd_fetch_timeout: Duration,
    segment_fetch_timeout: Duration,
    still_threshold_deg: f64,
    fast_threshold_deg: f64,
    device_pixel_budget: u64,
    device_supports_stereo: bool,
}

impl OmafEngineConfig {
    /// A config carrying spec.md's named defaults: 30 retries spaced 1s apart, an
    /// initial cache of 3 segments growable to a ceiling of 15, a 1.20x viewport
    /// expansion factor, a 2000ms rate-adaptation update interval, a 100-sample
    /// bandwidth window, 5s HTTP timeouts, 0.5°/10° motion thresholds, and no device
    /// pixel budget (unbounded) until [`Self::with_device_pixel_budget`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_retry_spacing(mut self, d: Duration) -> Self {
        self.retry_spacing = d;
        self
    }

    pub fn with_initial_max_cached_segments(mut self, n: u32) -> Self {
        self.initial_max_cached_segments = n;
        self
    }

    pub fn with_max_cached_segments_ceiling(mut self, n: u32) -> Self {
        self.max_cached_segments_ceiling = n;
        self
    }

    pub fn with_viewport_expansion_factor(mut self, factor: f64) -> Self {
        self.viewport_expansion_factor = factor;
        self
    }

    pub fn with_update_interval(mut self, d: Duration) -> Self {
        self.update_interval = d;
        self
    }

    pub fn with_bandwidth_window_samples(mut self, n: usize) -> Self {
        self.bandwidth_window_samples = n;
        self
    }

    pub fn with_mpd_fetch_timeout(mut self, d: Duration) -> Self {
        self.mpd_fetch_timeout = d;
        self
    }

    pub fn with_segment_fetch_timeout(mut self, d: Duration) -> Self {
        self.segment_fetch_timeout = d;
        self
    }

    pub fn with_motion_thresholds(mut self, still_deg: f64, fast_deg: f64) -> Self {
        self.still_threshold_deg = still_deg;
        self.fast_threshold_deg = fast_deg;
        self
    }

    /// Maximum decoded pixels per second the playback device can sustain, used by
    /// `TilePicker::estimate_budget` (§4.5 "Budgets") to cap concurrent tile fetches.
    pub fn with_device_pixel_budget(mut self, pixels_per_second: u64) -> Self {
        self.device_pixel_budget = pixels_per_second;
        self
    }

    pub fn with_device_supports_stereo(mut self, supports: bool) -> Self {
        self.device_supports_stereo = supports;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_spacing(&self) -> Duration {
        self.retry_spacing
    }

    pub fn initial_max_cached_segments(&self) -> u32 {
        self.initial_max_cached_segments
    }

    pub fn max_cached_segments_ceiling(&self) -> u32 {
        self.max_cached_segments_ceiling
    }

    pub fn viewport_expansion_factor(&self) -> f64 {
        self.viewport_expansion_factor
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn bandwidth_window_samples(&self) -> usize {
        self.bandwidth_window_samples
    }

    pub fn mpd_fetch_timeout(&self) -> Duration {
        self.mpd_fetch_timeout
    }

    pub fn segment_fetch_timeout(&self) -> Duration {
        self.segment_fetch_timeout
    }

    pub fn motion_thresholds(&self) -> (f64, f64) {
        (self.still_threshold_deg, self.fast_threshold_deg)
    }

    pub fn device_pixel_budget(&self) -> u64 {
        self.device_pixel_budget
    }

    pub fn device_supports_stereo(&self) -> bool {
        self.device_supports_stereo
    }
}

impl Default for OmafEngineConfig {
    fn default() -> Self {
        OmafEngineConfig {
            max_retries: crate::segment::MAX_RETRIES,
            retry_spacing: Duration::from_millis(crate::segment::RETRY_SPACING_MS),
            initial_max_cached_segments: crate::segment::INITIAL_MAX_CACHED_SEGMENTS,
            max_cached_segments_ceiling: crate::segment::MAX_CACHED_SEGMENTS_CEILING,
            viewport_expansion_factor: crate::tile_picker::VIEWPORT_EXPANSION_FACTOR,
            update_interval: Duration::from_millis(crate::bitrate::DEFAULT_UPDATE_INTERVAL_MS),
            bandwidth_window_samples: 100,
            mpd_fetch_timeout: Duration::from_secs(5),
            segment_fetch_timeout: Duration::from_secs(5),
            still_threshold_deg: crate::tile_picker::STILL_THRESHOLD_DEG,
            fast_threshold_deg: crate::tile_picker::FAST_THRESHOLD_DEG,
            device_pixel_budget: 0,
            device_supports_stereo: false,
        }
    }
}
