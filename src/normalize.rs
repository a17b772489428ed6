//! Canonical days-until-expiry computation.
//!
//! Every probe strategy funnels through this single implementation.
//! Divergent rounding between strategies is the primary source of
//! inconsistent "expiring" classification, so nothing else in the crate is
//! allowed to compute remaining days.

use chrono::{DateTime, Utc};

const DAY_MS: i64 = 86_400_000;

/// Remaining whole days before `valid_to`, ceiling-rounded and clamped to 0.
///
/// A certificate that is exactly N days from expiry reports N; N days plus
/// any fraction reports N + 1; an already-expired certificate reports 0,
/// never a negative value.
pub fn days_until_expiry(valid_to: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let diff_ms = valid_to.signed_duration_since(now).num_milliseconds();
    if diff_ms <= 0 {
        return 0;
    }
    ((diff_ms + DAY_MS - 1) / DAY_MS) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expired_certificate_reports_zero() {
        let now = Utc::now();
        assert_eq!(days_until_expiry(now - Duration::days(3), now), 0);
        assert_eq!(days_until_expiry(now - Duration::milliseconds(1), now), 0);
        assert_eq!(days_until_expiry(now, now), 0);
    }

    #[test]
    fn whole_days_report_exact_count() {
        let now = Utc::now();
        assert_eq!(days_until_expiry(now + Duration::days(30), now), 30);
        assert_eq!(days_until_expiry(now + Duration::days(1), now), 1);
    }

    #[test]
    fn partial_days_round_up() {
        let now = Utc::now();
        assert_eq!(
            days_until_expiry(now + Duration::days(5) + Duration::hours(3), now),
            6
        );
        assert_eq!(days_until_expiry(now + Duration::milliseconds(1), now), 1);
    }
}
