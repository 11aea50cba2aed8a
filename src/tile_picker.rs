//! Viewport tile picker (§3.4, §4.5): geometry, hysteresis, resolution budget, and
//! margin tiles. The renderer thread mutates the viewport via [`TilePicker::pick_tiles`];
//! the provider thread reads the result via [`TilePicker::latest_tiles`], which is
//! guarded by a `parking_lot::Mutex` playing the role of the spinlock §4.5/§5 call for
//! in the tile-selection handoff (the only state shared between the two threads).

use std::collections::HashSet;

use parking_lot::Mutex;

/// Expansion factor applied to the user viewport before selection (§4.5 step 1).
pub const VIEWPORT_EXPANSION_FACTOR: f64 = 1.20;
/// Area threshold (square degrees) above which a tile is a viewport tile rather than
/// a margin candidate (§4.5 step 3).
pub const VIEWPORT_AREA_THRESHOLD: f64 = 300.0;
/// Motion classifier thresholds, in degrees per frame (§4.5 "Hysteresis").
pub const STILL_THRESHOLD_DEG: f64 = 0.5;
pub const FAST_THRESHOLD_DEG: f64 = 10.0;

/// (center-azimuth, center-elevation, roll, width, height) plus a derived rectangle in
/// degrees (§3.4). Mutated by the renderer thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub center_azimuth_deg: f64,
    pub center_elevation_deg: f64,
    pub roll_deg: f64,
    pub width_deg: f64,
    pub height_deg: f64,
}

impl ViewportState {
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let half_w = self.width_deg / 2.0;
        let half_h = self.height_deg / 2.0;
        (
            self.center_azimuth_deg - half_w,
            self.center_azimuth_deg + half_w,
            self.center_elevation_deg - half_h,
            self.center_elevation_deg + half_h,
        )
    }

    /// Expands this viewport by `factor` around its own centre (§4.5 step 1).
    pub fn expanded(&self, factor: f64) -> ViewportState {
        ViewportState {
            center_azimuth_deg: self.center_azimuth_deg,
            center_elevation_deg: self.center_elevation_deg,
            roll_deg: self.roll_deg,
            width_deg: self.width_deg * factor,
            height_deg: self.height_deg * factor,
        }
    }
}

/// A single tile's coverage rectangle on the sphere and its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub adaptation_set_id: i64,
    pub row_index: usize,
    pub center_longitude_deg: f64,
    pub left_deg: f64,
    pub right_deg: f64,
    pub top_deg: f64,
    pub bottom_deg: f64,
}

impl Tile {
    fn intersection_area(&self, v_left: f64, v_right: f64, v_top: f64, v_bottom: f64) -> f64 {
        let overlap_w = (self.right_deg.min(v_right) - self.left_deg.max(v_left)).max(0.0);
        let overlap_h = (self.bottom_deg.min(v_bottom) - self.top_deg.max(v_top)).max(0.0);
        overlap_w * overlap_h
    }
}

/// A latitude band: a latitude centre, top/bottom bounds, and its tiles ordered by
/// increasing centre longitude (§4.5 "Geometry").
#[derive(Debug, Clone)]
pub struct Row {
    pub latitude_center_deg: f64,
    pub top_deg: f64,
    pub bottom_deg: f64,
    pub tiles: Vec<Tile>,
}

impl Row {
    fn covers(&self, top: f64, bottom: f64) -> bool {
        self.top_deg <= top && self.bottom_deg >= bottom
    }

    fn overlaps(&self, top: f64, bottom: f64) -> bool {
        self.top_deg < bottom && self.bottom_deg > top
    }
}

/// A selected tile with its measured intersection area (§3.4 `TileSelection`).
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTile {
    pub adaptation_set_id: i64,
    pub area: f64,
}

/// The outcome of one selection pass: viewport tiles (decreasing area) and margin
/// candidates (decreasing area), per §4.5 steps 3-4.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileSelection {
    pub viewport_tiles: Vec<SelectedTile>,
    pub margin_tiles: Vec<SelectedTile>,
}

impl TileSelection {
    fn ids(&self) -> HashSet<i64> {
        self.viewport_tiles.iter().map(|t| t.adaptation_set_id).collect()
    }
}

/// Motion class driving reselection hysteresis (§4.5 "Hysteresis").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionClass {
    Still,
    Slow,
    Fast,
}

struct MotionTracker {
    last_class: MotionClass,
    accumulated_drift_deg: f64,
}

impl MotionTracker {
    fn new() -> Self {
        MotionTracker { last_class: MotionClass::Still, accumulated_drift_deg: 0.0 }
    }

    /// Classifies Δazimuth/Δelevation magnitude and decides whether to reselect,
    /// exactly per §4.5: still accumulates until it crosses the still threshold; fast
    /// defers until it settles, at which point one forced reselection fires.
    fn observe(&mut self, delta_deg: f64) -> bool {
        if delta_deg.is_infinite() {
            self.last_class = MotionClass::Still;
            self.accumulated_drift_deg = 0.0;
            return true;
        }

        let class = if delta_deg >= FAST_THRESHOLD_DEG {
            MotionClass::Fast
        } else if delta_deg >= STILL_THRESHOLD_DEG {
            MotionClass::Slow
        } else {
            MotionClass::Still
        };

        let settled_from_fast = self.last_class == MotionClass::Fast && class != MotionClass::Fast;
        self.last_class = class;

        match class {
            MotionClass::Fast => {
                self.accumulated_drift_deg += delta_deg;
                false
            }
            MotionClass::Slow => {
                self.accumulated_drift_deg = 0.0;
                true
            }
            MotionClass::Still => {
                self.accumulated_drift_deg += delta_deg;
                if settled_from_fast {
                    self.accumulated_drift_deg = 0.0;
                    true
                } else if self.accumulated_drift_deg >= STILL_THRESHOLD_DEG {
                    self.accumulated_drift_deg = 0.0;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Per-device budget derived once before first use (§4.5 "Budgets").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBudget {
    pub max_concurrent_tiles: u32,
    pub worst_case_tiles: u32,
    pub median_tiles: u32,
}

/// Chooses the minimal tile set covering a viewport with the smallest feasible change
/// from the previous selection (§4.5).
pub struct TilePicker {
    rows: Vec<Row>,
    previous_viewport: Option<ViewportState>,
    motion: MotionTracker,
    latest: Mutex<TileSelection>,
    margin_priority_k: usize,
    budget: Option<TileBudget>,
    device_max_concurrent_tiles: u32,
    max_decoded_pixels_per_second: u64,
    base_layer_pixels_per_second: u64,
    tile_pixels_per_frame: u64,
    tile_fps: u32,
}

impl TilePicker {
    pub fn new(
        rows: Vec<Row>,
        device_max_concurrent_tiles: u32,
        max_decoded_pixels_per_second: u64,
        base_layer_pixels_per_second: u64,
        tile_pixels_per_frame: u64,
        tile_fps: u32,
    ) -> Self {
        TilePicker {
            rows,
            previous_viewport: None,
            motion: MotionTracker::new(),
            latest: Mutex::new(TileSelection::default()),
            margin_priority_k: 4,
            budget: None,
            device_max_concurrent_tiles,
            max_decoded_pixels_per_second,
            base_layer_pixels_per_second,
            tile_pixels_per_frame,
            tile_fps,
        }
    }

    /// Samples the tile layout at (-50°, 0°, +50°) latitude and at tile boundaries to
    /// estimate worst-case/median tile counts, and derives the device's concurrent
    /// tile budget (§4.5 "Budgets").
    pub fn estimate_budget(&mut self) -> TileBudget {
        let sample_latitudes = [-50.0, 0.0, 50.0];
        let mut counts = Vec::new();
        for lat in sample_latitudes {
            if let Some(row) = self.rows.iter().find(|r| r.covers_point(lat)) {
                counts.push(row.tiles.len() as u32);
            }
        }
        let worst_case = counts.iter().copied().max().unwrap_or(0);
        let median = {
            let mut sorted = counts.clone();
            sorted.sort_unstable();
            sorted.get(sorted.len() / 2).copied().unwrap_or(0)
        };

        let headroom = self.max_decoded_pixels_per_second.saturating_sub(self.base_layer_pixels_per_second);
        let per_tile = self.tile_pixels_per_frame * self.tile_fps as u64;
        let pixel_budget = if per_tile == 0 { u32::MAX } else { (headroom / per_tile) as u32 };

        let budget = TileBudget {
            max_concurrent_tiles: self.device_max_concurrent_tiles.min(pixel_budget),
            worst_case_tiles: worst_case,
            median_tiles: median,
        };
        self.budget = Some(budget);
        budget
    }

    pub fn budget(&self) -> Option<TileBudget> {
        self.budget
    }

    /// `pickTiles` (§4.5 "Handoff"): runs the full selection algorithm for
    /// `viewport`, applies hysteresis, and if a reselection is warranted, stores the
    /// new selection under the spinlock-equivalent mutex for the provider thread.
    pub fn pick_tiles(&mut self, viewport: ViewportState) {
        let delta_deg = match self.previous_viewport {
            Some(prev) => {
                let d_az = (viewport.center_azimuth_deg - prev.center_azimuth_deg).abs();
                let d_el = (viewport.center_elevation_deg - prev.center_elevation_deg).abs();
                d_az.max(d_el)
            }
            None => f64::INFINITY, // first frame always reselects
        };
        self.previous_viewport = Some(viewport);

        let should_reselect = self.motion.observe(delta_deg);
        if !should_reselect {
            return;
        }

        let selection = self.select(viewport);
        *self.latest.lock() = selection;
    }

    fn select(&self, viewport: ViewportState) -> TileSelection {
        let expanded = viewport.expanded(VIEWPORT_EXPANSION_FACTOR);
        let (left, right, top, bottom) = expanded.bounds();

        let covering_rows: Vec<&Row> = match self.rows.iter().find(|r| r.covers(top, bottom)) {
            Some(single) => vec![single],
            None => self.rows.iter().filter(|r| r.overlaps(top, bottom)).collect(),
        };

        let mut viewport_tiles = Vec::new();
        let mut margin_tiles = Vec::new();
        for row in covering_rows {
            for tile in &row.tiles {
                let area = tile.intersection_area(left, right, top, bottom);
                if area >= VIEWPORT_AREA_THRESHOLD {
                    viewport_tiles.push(SelectedTile { adaptation_set_id: tile.adaptation_set_id, area });
                } else if area > 0.0 {
                    margin_tiles.push(SelectedTile { adaptation_set_id: tile.adaptation_set_id, area });
                }
            }
        }
        viewport_tiles.sort_by(|a, b| b.area.partial_cmp(&a.area).unwrap());
        margin_tiles.sort_by(|a, b| b.area.partial_cmp(&a.area).unwrap());
        TileSelection { viewport_tiles, margin_tiles }
    }

    /// `getLatestTiles(&dropped, &added)` (§4.5 "Handoff"): returns a copy of the
    /// current selection plus the set differences against `previous`.
    pub fn latest_tiles(&self, previous: &TileSelection) -> (TileSelection, Vec<i64>, Vec<i64>) {
        let current = self.latest.lock().clone();
        let prev_ids = previous.ids();
        let cur_ids = current.ids();
        let dropped: Vec<i64> = prev_ids.difference(&cur_ids).copied().collect();
        let added: Vec<i64> = cur_ids.difference(&prev_ids).copied().collect();
        (current, dropped, added)
    }

    /// The top-*k* margin tiles, for the orchestrator's pre-emptive higher-quality
    /// fetch (§4.5 "Margin tiles").
    pub fn latest_margins(&self) -> Vec<SelectedTile> {
        let current = self.latest.lock();
        current.margin_tiles.iter().take(self.margin_priority_k).cloned().collect()
    }
}

impl Row {
    fn covers_point(&self, lat: f64) -> bool {
        self.top_deg >= lat && self.bottom_deg <= lat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_grid() -> Vec<Row> {
        // 4 rows x 8 tiles, matching the §8 scenario 1 8x4 cube-face tile grid.
        let mut rows = Vec::new();
        let lat_centers = [-67.5, -22.5, 22.5, 67.5];
        for (row_index, &lat) in lat_centers.iter().enumerate() {
            let mut tiles = Vec::new();
            for i in 0..8 {
                let center_lon = -180.0 + 45.0 * i as f64 + 22.5;
                tiles.push(Tile {
                    adaptation_set_id: (row_index * 8 + i) as i64,
                    row_index,
                    center_longitude_deg: center_lon,
                    left_deg: center_lon - 22.5,
                    right_deg: center_lon + 22.5,
                    top_deg: lat + 22.5,
                    bottom_deg: lat - 22.5,
                });
            }
            rows.push(Row { latitude_center_deg: lat, top_deg: lat + 22.5, bottom_deg: lat - 22.5, tiles });
        }
        rows
    }

    #[test]
    fn selection_covers_expanded_viewport() {
        let rows = make_grid();
        let mut picker = TilePicker::new(rows, 32, 1_000_000_000, 0, 1920 * 1080, 30);
        let viewport = ViewportState {
            center_azimuth_deg: 0.0,
            center_elevation_deg: 0.0,
            roll_deg: 0.0,
            width_deg: 90.0,
            height_deg: 90.0,
        };
        picker.pick_tiles(viewport);
        let (selection, _, _) = picker.latest_tiles(&TileSelection::default());
        assert!(!selection.viewport_tiles.is_empty());
        // viewport tiles must be sorted by decreasing area
        for w in selection.viewport_tiles.windows(2) {
            assert!(w[0].area >= w[1].area);
        }
    }

    #[test]
    fn still_motion_does_not_reselect_until_drift_exceeds_threshold() {
        let mut tracker = MotionTracker::new();
        assert!(tracker.observe(f64::INFINITY)); // first sample always selects conceptually
        assert!(!tracker.observe(0.1));
        assert!(!tracker.observe(0.1));
        assert!(!tracker.observe(0.1));
        // accumulated 0.3 + 0.1 = ... keep going until it crosses 0.5
        assert!(tracker.observe(0.3));
    }

    #[test]
    fn fast_motion_defers_until_it_settles_to_still() {
        let mut tracker = MotionTracker::new();
        tracker.observe(0.0);
        assert!(!tracker.observe(15.0)); // fast: defer
        assert!(!tracker.observe(12.0)); // still fast: defer
        assert!(tracker.observe(0.1)); // settles to still: forced reselection
    }

    #[test]
    fn slow_motion_always_reselects() {
        let mut tracker = MotionTracker::new();
        tracker.observe(0.0);
        assert!(tracker.observe(5.0));
        assert!(tracker.observe(5.0));
    }

    #[test]
    fn estimate_budget_clamps_to_pixel_headroom() {
        let rows = make_grid();
        let mut picker = TilePicker::new(rows, 32, 2_000_000, 500_000, 100_000, 30);
        let budget = picker.estimate_budget();
        // headroom = 1_500_000; per_tile = 100_000*30 = 3_000_000 -> pixel_budget = 0
        assert_eq!(budget.max_concurrent_tiles, 0);
    }

    #[test]
    fn margin_tiles_are_capped_at_top_k() {
        let rows = make_grid();
        let mut picker = TilePicker::new(rows, 32, 1_000_000_000, 0, 1920 * 1080, 30);
        picker.margin_priority_k = 2;
        let viewport = ViewportState {
            center_azimuth_deg: 0.0,
            center_elevation_deg: 0.0,
            roll_deg: 0.0,
            width_deg: 90.0,
            height_deg: 90.0,
        };
        picker.pick_tiles(viewport);
        assert!(picker.latest_margins().len() <= 2);
    }
}
