use chrono::{DateTime, Duration, Utc};

/// Whether a drop counts as "just happened".
///
/// True iff `detected_at` is present and no older than `window` at `now`.
/// Only consulted during a channel's first sync, to keep a fresh session
/// from replaying the whole backlog as new; a missing `detected_at` is
/// conservatively not fresh.
pub fn is_fresh(detected_at: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match detected_at {
        Some(detected_at) => now - detected_at <= window,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-02-18T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_within_window_is_fresh() {
        let window = Duration::seconds(90);
        assert!(is_fresh(Some(now() - Duration::seconds(30)), now(), window));
        assert!(is_fresh(Some(now()), now(), window));
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let window = Duration::seconds(90);
        assert!(is_fresh(Some(now() - Duration::seconds(90)), now(), window));
        assert!(!is_fresh(Some(now() - Duration::seconds(91)), now(), window));
    }

    #[test]
    fn test_old_drop_is_stale() {
        let window = Duration::seconds(90);
        assert!(!is_fresh(Some(now() - Duration::seconds(200)), now(), window));
    }

    #[test]
    fn test_missing_timestamp_is_not_fresh() {
        assert!(!is_fresh(None, now(), Duration::seconds(90)));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        // Clock skew between scanner and client: lean towards showing it
        let window = Duration::seconds(90);
        assert!(is_fresh(Some(now() + Duration::seconds(5)), now(), window));
    }
}
