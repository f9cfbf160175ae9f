//! Workout-date arithmetic.
//!
//! A "workout date" is the logical training day: the calendar date shifted by
//! the profile's day-transition hour, so a 1 AM session can still count as the
//! previous day's workout.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Timelike};

/// Map a local wall-clock instant to its workout date. Instants before
/// `transition_hour:00` belong to the previous calendar day.
pub fn workout_date_at(local: NaiveDateTime, transition_hour: u8) -> NaiveDate {
    if local.hour() < transition_hour as u32 {
        (local - Duration::days(1)).date()
    } else {
        local.date()
    }
}

pub fn workout_date(instant: DateTime<Local>, transition_hour: u8) -> NaiveDate {
    workout_date_at(instant.naive_local(), transition_hour)
}

pub fn today_workout_date(transition_hour: u8) -> NaiveDate {
    workout_date(Local::now(), transition_hour)
}

/// Wrap a 1-based day index into [1, day_count]. Handles indices pushed out of
/// range in either direction by preview offsets.
pub fn wrap_day_index(index: i64, day_count: i64) -> i64 {
    (index - 1).rem_euclid(day_count) + 1
}

/// One-step advance of a 1-based day index: the index after `day_count` is 1.
pub fn next_day_index(index: i64, day_count: i64) -> i64 {
    (index % day_count) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn boundary_at_transition_hour_three() {
        assert_eq!(workout_date_at(at(2025, 6, 10, 2, 59), 3), date(2025, 6, 9));
        assert_eq!(workout_date_at(at(2025, 6, 10, 3, 0), 3), date(2025, 6, 10));
    }

    #[test]
    fn transition_hour_zero_never_shifts() {
        assert_eq!(workout_date_at(at(2025, 6, 10, 0, 0), 0), date(2025, 6, 10));
        assert_eq!(
            workout_date_at(at(2025, 6, 10, 23, 59), 0),
            date(2025, 6, 10)
        );
    }

    #[test]
    fn shift_crosses_month_boundary() {
        assert_eq!(workout_date_at(at(2025, 3, 1, 1, 30), 3), date(2025, 2, 28));
    }

    #[test]
    fn next_day_index_wraps_one_based() {
        assert_eq!(next_day_index(4, 4), 1);
        assert_eq!(next_day_index(1, 4), 2);
        assert_eq!(next_day_index(1, 1), 1);
    }

    #[test]
    fn wrap_day_index_handles_offsets() {
        assert_eq!(wrap_day_index(5, 4), 1);
        assert_eq!(wrap_day_index(0, 4), 4);
        assert_eq!(wrap_day_index(-3, 4), 1);
        assert_eq!(wrap_day_index(2, 4), 2);
    }
}
