//! Bitrate / quality controller (§4.6): assigns a quality level to each of the
//! foreground, margin, and background tile groups from an estimated bandwidth,
//! re-evaluated on a fixed cadence or immediately on a download problem report.
//!
//! Split into `update` (periodic re-evaluation) and `on_download_problem` (fast-path
//! downshift) as two distinct entry points, mirroring a policy module that keeps those
//! concerns separate rather than folding the fast path into the periodic one.

use std::collections::HashMap;

/// Default re-evaluation cadence (§4.6).
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 2_000;
/// Headroom-overhead fraction subtracted from the raw bandwidth estimate before
/// costing candidate triples, leaving slack for protocol/retry overhead.
pub const OVERHEAD_FRACTION: f64 = 0.10;
/// Consecutive good ticks required before an upshift is allowed to take effect
/// (§4.6: "upshifts require sustained headroom").
const UPSHIFT_SUSTAIN_TICKS: u32 = 2;

/// One of the three tile classes the controller assigns a level to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileGroupKind {
    Foreground,
    Margin,
    Background,
}

/// One representation available at a given quality level, for cost purposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepresentationLevel {
    pub bandwidth_bps: u64,
}

/// A tile group's candidate levels, ordered ascending by `qualityRanking` (index 0 is
/// the lowest-bandwidth/quality representation, per the D/B quality-ranking contract).
#[derive(Debug, Clone)]
pub struct TileGroupInput {
    pub kind: TileGroupKind,
    pub adaptation_set_id: i64,
    pub levels: Vec<RepresentationLevel>,
}

/// A level assignment to apply via `D.selectQuality`, with the segment id the switch
/// takes effect at (§4.6 "Outputs").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityDecision {
    pub adaptation_set_id: i64,
    pub level: u32,
    pub from_segment: u64,
}

struct GroupState {
    current_level: Option<u32>,
    headroom_streak: u32,
}

/// Classifies tiles into foreground/margin/background and assigns quality levels
/// against an estimated bandwidth budget, subject to the fg ≥ margin ≥ bg ordering
/// invariant (§4.6, §8 "Invariant checks").
pub struct BitrateController {
    update_interval_ms: u64,
    last_update_ms: u64,
    group_state: HashMap<i64, GroupState>,
}

impl BitrateController {
    pub fn new() -> Self {
        BitrateController {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            last_update_ms: 0,
            group_state: HashMap::new(),
        }
    }

    /// Overrides the re-evaluation cadence an [`crate::OmafEngineConfig`] names, in
    /// place of the [`DEFAULT_UPDATE_INTERVAL_MS`] default.
    pub fn with_update_interval_ms(mut self, update_interval_ms: u64) -> Self {
        self.update_interval_ms = update_interval_ms;
        self
    }

    pub fn due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_update_ms) >= self.update_interval_ms
    }

    /// Periodic re-evaluation (§4.6 "Policy"): ticks only if `due`, costs candidate
    /// triples, and returns the decisions that changed the previous assignment.
    pub fn update(
        &mut self,
        now_ms: u64,
        bandwidth_bps: u64,
        groups: &HashMap<TileGroupKind, Vec<TileGroupInput>>,
        current_segment: u64,
    ) -> Vec<QualityDecision> {
        if !self.due(now_ms) {
            return Vec::new();
        }
        self.last_update_ms = now_ms;
        self.evaluate(bandwidth_bps, groups, current_segment, false)
    }

    /// Fast-path downshift on a reported download problem (buffering, timeout):
    /// bypasses the cadence check and the upshift-sustain gate (§4.6).
    pub fn on_download_problem(
        &mut self,
        bandwidth_bps: u64,
        groups: &HashMap<TileGroupKind, Vec<TileGroupInput>>,
        current_segment: u64,
    ) -> Vec<QualityDecision> {
        self.evaluate(bandwidth_bps, groups, current_segment, true)
    }

    fn evaluate(
        &mut self,
        bandwidth_bps: u64,
        groups: &HashMap<TileGroupKind, Vec<TileGroupInput>>,
        current_segment: u64,
        force_downshift_only: bool,
    ) -> Vec<QualityDecision> {
        let budget = (bandwidth_bps as f64 * (1.0 - OVERHEAD_FRACTION)) as u64;
        let empty = Vec::new();
        let fg_groups = groups.get(&TileGroupKind::Foreground).unwrap_or(&empty);
        let margin_groups = groups.get(&TileGroupKind::Margin).unwrap_or(&empty);
        let bg_groups = groups.get(&TileGroupKind::Background).unwrap_or(&empty);

        let fg_levels = max_level_count(fg_groups);
        let margin_levels = max_level_count(margin_groups);
        let bg_levels = max_level_count(bg_groups);

        let (fg, margin, bg) = choose_triple(
            budget,
            fg_groups,
            margin_groups,
            bg_groups,
            fg_levels,
            margin_levels,
            bg_levels,
        );

        let mut decisions = Vec::new();
        self.apply_group(fg_groups, fg, current_segment, force_downshift_only, &mut decisions);
        self.apply_group(margin_groups, margin, current_segment, force_downshift_only, &mut decisions);
        self.apply_group(bg_groups, bg, current_segment, force_downshift_only, &mut decisions);
        decisions
    }

    fn apply_group(
        &mut self,
        group: &[TileGroupInput],
        proposed_level: u32,
        current_segment: u64,
        force_downshift_only: bool,
        decisions: &mut Vec<QualityDecision>,
    ) {
        for g in group {
            let entry = self
                .group_state
                .entry(g.adaptation_set_id)
                .or_insert(GroupState { current_level: None, headroom_streak: 0 });

            let level_cap = g.levels.len().saturating_sub(1) as u32;
            let proposed = proposed_level.min(level_cap);

            match entry.current_level {
                None => {
                    entry.current_level = Some(proposed);
                    entry.headroom_streak = 0;
                    decisions.push(QualityDecision {
                        adaptation_set_id: g.adaptation_set_id,
                        level: proposed,
                        from_segment: current_segment + 1,
                    });
                }
                Some(current) if proposed < current => {
                    entry.current_level = Some(proposed);
                    entry.headroom_streak = 0;
                    decisions.push(QualityDecision {
                        adaptation_set_id: g.adaptation_set_id,
                        level: proposed,
                        from_segment: current_segment + 1,
                    });
                }
                Some(current) if proposed > current => {
                    if force_downshift_only {
                        // fast path never upshifts
                        continue;
                    }
                    entry.headroom_streak += 1;
                    if entry.headroom_streak >= UPSHIFT_SUSTAIN_TICKS {
                        entry.current_level = Some(proposed);
                        entry.headroom_streak = 0;
                        decisions.push(QualityDecision {
                            adaptation_set_id: g.adaptation_set_id,
                            level: proposed,
                            from_segment: current_segment + 1,
                        });
                    }
                }
                Some(_) => {
                    entry.headroom_streak = 0;
                }
            }
        }
    }
}

impl Default for BitrateController {
    fn default() -> Self {
        Self::new()
    }
}

fn max_level_count(groups: &[TileGroupInput]) -> u32 {
    groups.iter().map(|g| g.levels.len() as u32).max().unwrap_or(1).max(1)
}

fn cost_at(groups: &[TileGroupInput], level: u32) -> u64 {
    groups
        .iter()
        .map(|g| {
            let idx = (level as usize).min(g.levels.len().saturating_sub(1));
            g.levels.get(idx).map(|l| l.bandwidth_bps).unwrap_or(0)
        })
        .sum()
}

/// Searches descending from the highest declared level for each class (respecting
/// `fg ≥ margin ≥ bg`) and returns the first triple whose summed cost fits `budget`
/// (§4.6 "choose the highest triple whose sum is ≤ budget").
#[allow(clippy::too_many_arguments)]
fn choose_triple(
    budget: u64,
    fg_groups: &[TileGroupInput],
    margin_groups: &[TileGroupInput],
    bg_groups: &[TileGroupInput],
    fg_levels: u32,
    margin_levels: u32,
    bg_levels: u32,
) -> (u32, u32, u32) {
    for fg in (0..fg_levels).rev() {
        for margin in (0..=fg.min(margin_levels.saturating_sub(1))).rev() {
            for bg in (0..=margin.min(bg_levels.saturating_sub(1))).rev() {
                let total = cost_at(fg_groups, fg) + cost_at(margin_groups, margin) + cost_at(bg_groups, bg);
                if total <= budget {
                    return (fg, margin, bg);
                }
            }
        }
    }
    (0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(bps: &[u64]) -> Vec<RepresentationLevel> {
        bps.iter().map(|&b| RepresentationLevel { bandwidth_bps: b }).collect()
    }

    fn three_tier_groups() -> HashMap<TileGroupKind, Vec<TileGroupInput>> {
        let mut groups = HashMap::new();
        groups.insert(
            TileGroupKind::Foreground,
            vec![TileGroupInput {
                kind: TileGroupKind::Foreground,
                adaptation_set_id: 1,
                levels: levels(&[1_000_000, 4_000_000, 10_000_000]),
            }],
        );
        groups.insert(
            TileGroupKind::Margin,
            vec![TileGroupInput {
                kind: TileGroupKind::Margin,
                adaptation_set_id: 2,
                levels: levels(&[500_000, 2_000_000, 5_000_000]),
            }],
        );
        groups.insert(
            TileGroupKind::Background,
            vec![TileGroupInput {
                kind: TileGroupKind::Background,
                adaptation_set_id: 3,
                levels: levels(&[200_000, 800_000, 2_000_000]),
            }],
        );
        groups
    }

    #[test]
    fn high_bandwidth_selects_highest_feasible_triple_with_ordering_respected() {
        let mut controller = BitrateController::new();
        let groups = three_tier_groups();
        let decisions = controller.update(0, 40_000_000, &groups, 10);
        let by_id: HashMap<i64, u32> = decisions.iter().map(|d| (d.adaptation_set_id, d.level)).collect();
        assert_eq!(by_id.get(&1), Some(&2));
        assert_eq!(by_id.get(&2), Some(&2));
        assert_eq!(by_id.get(&3), Some(&2));
    }

    #[test]
    fn low_bandwidth_forces_downshift_with_fg_ge_margin_ge_bg() {
        let mut controller = BitrateController::new();
        let groups = three_tier_groups();
        // first tick establishes a high baseline
        controller.update(0, 40_000_000, &groups, 10);
        // next tick: bandwidth collapses
        let decisions = controller.update(DEFAULT_UPDATE_INTERVAL_MS, 2_000_000, &groups, 11);
        let by_id: HashMap<i64, u32> = decisions.iter().map(|d| (d.adaptation_set_id, d.level)).collect();
        let fg = *by_id.get(&1).unwrap();
        let margin = *by_id.get(&2).unwrap();
        let bg = *by_id.get(&3).unwrap();
        assert!(fg >= margin);
        assert!(margin >= bg);
    }

    #[test]
    fn on_download_problem_downshifts_without_waiting_for_cadence() {
        let mut controller = BitrateController::new();
        let groups = three_tier_groups();
        controller.update(0, 40_000_000, &groups, 10);
        let decisions = controller.on_download_problem(1_000_000, &groups, 10);
        assert!(!decisions.is_empty());
        assert!(decisions.iter().all(|d| d.level == 0));
    }

    #[test]
    fn upshift_requires_sustained_headroom_across_ticks() {
        let mut controller = BitrateController::new();
        let groups = three_tier_groups();
        // start low
        controller.on_download_problem(1_000_000, &groups, 0);
        // one good tick: should not upshift yet
        let first = controller.update(DEFAULT_UPDATE_INTERVAL_MS, 40_000_000, &groups, 1);
        assert!(first.iter().all(|d| d.level == 0) || first.is_empty());
        // second consecutive good tick: now it may upshift
        let second = controller.update(DEFAULT_UPDATE_INTERVAL_MS * 2, 40_000_000, &groups, 2);
        assert!(second.iter().any(|d| d.level > 0));
    }

    #[test]
    fn decision_from_segment_is_one_past_current() {
        let mut controller = BitrateController::new();
        let groups = three_tier_groups();
        let decisions = controller.update(0, 40_000_000, &groups, 7);
        assert!(decisions.iter().all(|d| d.from_segment == 8));
    }
}
