//! Monotonic timing and DASH wall-clock parsing.
//!
//! Mirrors the role of `NVRClock` / `NVRTime` in the reference player: a small set of
//! free functions rather than an object, since there is no per-instance state to own.

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic milliseconds since an unspecified epoch, suitable for measuring
/// intervals (segment timing, retry backoff, bandwidth sample timestamps).
///
/// Backed by `SystemTime` rather than `Instant` because samples are sometimes
/// serialized for diagnostics; callers must only ever use the value for subtraction
/// against another value obtained from this same function.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Monotonic microseconds, used for presentation timestamps handed to the decoder.
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Parses an MPD `@availabilityStartTime` / `@publishTime` style UTC timestamp.
///
/// DASH uses ISO 8601 `yyyy-MM-ddThh:mm:ss[.sss]Z` with no daylight-saving
/// adjustment, as required by §4 of spec.md. `chrono`'s RFC 3339 parser accepts a
/// superset of this grammar, which matches existing MPD producer practice (the
/// teacher's `parse_xs_duration` takes the same "be liberal, prefer interop" stance
/// for `xs:duration`).
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
