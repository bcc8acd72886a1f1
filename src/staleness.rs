//! # Staleness Filter
//! Decides whether a dated observation is recent enough to trust.
//!
//! Upstream feeds keep serving the last traded price through weekends and
//! exchange holidays. Lag tolerance is therefore trading-calendar aware:
//! - run on the first weekday after a weekend (Monday): up to 4 days,
//! - any other day: up to 2 days.
//!
//! Observations dated in the future are rejected.

use chrono::{Datelike, NaiveDate, Weekday};

/// Max lag when the run falls on the first weekday after a weekend.
pub const MAX_LAG_AFTER_WEEKEND_DAYS: i64 = 4;
/// Max lag on every other day.
pub const MAX_LAG_DAYS: i64 = 2;

/// Allowed lag in calendar days for a run on `reference_weekday`.
pub fn allowed_lag_days(reference_weekday: Weekday) -> i64 {
    match reference_weekday {
        Weekday::Mon => MAX_LAG_AFTER_WEEKEND_DAYS,
        _ => MAX_LAG_DAYS,
    }
}

/// Lag boundary is inclusive: exactly `allowed_lag_days` old is still fresh.
pub fn is_fresh(
    observed_at: NaiveDate,
    reference_date: NaiveDate,
    reference_weekday: Weekday,
) -> bool {
    let lag_days = (reference_date - observed_at).num_days();
    if lag_days < 0 {
        return false;
    }
    lag_days <= allowed_lag_days(reference_weekday)
}

/// Shorthand when the weekday is taken from the reference date itself.
pub fn is_fresh_on(observed_at: NaiveDate, reference_date: NaiveDate) -> bool {
    is_fresh(observed_at, reference_date, reference_date.weekday())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monday_allows_four_days() {
        let monday = d(2024, 3, 11);
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert!(is_fresh_on(monday - Duration::days(4), monday));
        assert!(!is_fresh_on(monday - Duration::days(5), monday));
    }

    #[test]
    fn other_days_allow_two_days() {
        let wednesday = d(2024, 3, 13);
        assert!(is_fresh_on(wednesday, wednesday));
        assert!(is_fresh_on(wednesday - Duration::days(2), wednesday));
        assert!(!is_fresh_on(wednesday - Duration::days(3), wednesday));

        let sunday = d(2024, 3, 10);
        assert!(!is_fresh_on(sunday - Duration::days(3), sunday));
    }

    #[test]
    fn future_observation_is_stale() {
        let today = d(2024, 3, 13);
        assert!(!is_fresh_on(today + Duration::days(1), today));
    }
}
