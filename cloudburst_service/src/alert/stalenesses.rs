/// Hardware reading staleness detection.
///
/// The hardware node pushes a reading every few seconds under normal
/// conditions. If the Raspberry Pi goes offline its last row stays in the
/// feed file forever, and the generator would keep replaying a frozen
/// reading as if it were live. This module lets the producer detect that
/// and fall back to the replay source.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally. This makes staleness purely deterministic in
/// tests without mocking or time manipulation.

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if `observed_at` is older than `max_age_minutes` relative
/// to `now`.
///
/// Staleness is defined as strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Readings timestamped in the future are not stale.
pub fn is_stale_at(observed_at: DateTime<Utc>, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    let age_seconds = (now - observed_at).num_seconds();
    age_seconds > (max_age_minutes as i64).saturating_mul(60)
}

/// A reading without a timestamp, or with no configured limit, is never stale.
pub fn reading_is_stale(
    observed_at: Option<DateTime<Utc>>,
    max_age_minutes: Option<u64>,
    now: DateTime<Utc>,
) -> bool {
    match (observed_at, max_age_minutes) {
        (Some(at), Some(limit)) => is_stale_at(at, limit, now),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// A fixed "now" used across all tests: 2025-07-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 13, 0, 0).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, m, s).unwrap()
    }

    // --- Not stale ----------------------------------------------------------

    #[test]
    fn test_reading_2_minutes_old_is_not_stale() {
        assert!(!is_stale_at(at(12, 58, 0), 5, fixed_now()));
    }

    #[test]
    fn test_reading_exactly_at_threshold_is_not_stale() {
        // Age == threshold should NOT be considered stale (strictly greater than).
        assert!(
            !is_stale_at(at(12, 55, 0), 5, fixed_now()),
            "reading exactly at threshold (5 min) should not be stale",
        );
    }

    #[test]
    fn test_future_reading_is_not_stale() {
        assert!(!is_stale_at(at(13, 1, 0), 5, fixed_now()));
    }

    // --- Stale --------------------------------------------------------------

    #[test]
    fn test_reading_one_second_past_threshold_is_stale() {
        assert!(is_stale_at(at(12, 54, 59), 5, fixed_now()));
    }

    #[test]
    fn test_reading_from_hours_ago_is_stale() {
        assert!(is_stale_at(at(9, 0, 0), 60, fixed_now()));
    }

    // --- Optional inputs ----------------------------------------------------

    #[test]
    fn test_missing_timestamp_is_never_stale() {
        assert!(!reading_is_stale(None, Some(1), fixed_now()));
    }

    #[test]
    fn test_missing_limit_is_never_stale() {
        assert!(!reading_is_stale(Some(at(1, 0, 0)), None, fixed_now()));
    }

    #[test]
    fn test_same_reading_stale_under_tight_threshold_not_under_loose() {
        let reading = Some(at(12, 30, 0));
        assert!(reading_is_stale(reading, Some(20), fixed_now()));
        assert!(!reading_is_stale(reading, Some(60), fixed_now()));
    }
}
