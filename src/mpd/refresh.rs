//! MPD refresh contract (§3.1 "Lifecycle", §4.2 "Refresh contract", §7
//! `SchedulingError`): a successful refresh must preserve adaptation-set cardinality;
//! existing sets are updated in place, never replaced by new objects.

use super::model::MPD;
use crate::error::OmafError;

/// What changed on a successful refresh, for the caller to react to (new selectable
/// representations, updated segment timing) without re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshDelta {
    pub representations_added: usize,
    pub representations_removed: usize,
}

/// Validates and describes a refresh from `previous` to `next`.
///
/// A change in adaptation-set cardinality (within the first period) is a fatal
/// `Scheduling` error, per §4.2: "A change in adaptation-set cardinality is a fatal
/// stream error." New or removed representations within an unchanged adaptation set
/// are permitted (§8 scenario 4).
pub fn validate_refresh(previous: &MPD, next: &MPD) -> Result<RefreshDelta, OmafError> {
    let prev_count = previous.first_period().map(|p| p.adaptations.len()).unwrap_or(0);
    let next_count = next.first_period().map(|p| p.adaptations.len()).unwrap_or(0);
    if prev_count != next_count {
        return Err(OmafError::Scheduling(format!(
            "adaptation-set count changed on refresh: {prev_count} -> {next_count}"
        )));
    }

    let mut added = 0usize;
    let mut removed = 0usize;
    if let (Some(prev_period), Some(next_period)) = (previous.first_period(), next.first_period()) {
        for (prev_aset, next_aset) in prev_period.adaptations.iter().zip(next_period.adaptations.iter()) {
            let prev_ids: std::collections::HashSet<_> =
                prev_aset.representations.iter().filter_map(|r| r.id.as_deref()).collect();
            let next_ids: std::collections::HashSet<_> =
                next_aset.representations.iter().filter_map(|r| r.id.as_deref()).collect();
            added += next_ids.difference(&prev_ids).count();
            removed += prev_ids.difference(&next_ids).count();
        }
    }
    Ok(RefreshDelta { representations_added: added, representations_removed: removed })
}
