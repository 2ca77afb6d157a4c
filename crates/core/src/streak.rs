use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Consecutive study days ending today, or ending yesterday if today has no
/// activity yet.
///
/// Returns `0` when neither today nor yesterday is present.
#[must_use]
pub fn compute_streak(study_dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if study_dates.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if study_dates.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0_u32;
    let mut day = Some(anchor);
    while let Some(current) = day {
        if !study_dates.contains(&current) {
            break;
        }
        streak = streak.saturating_add(1);
        day = current.pred_opt();
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn days_ago(days: &[i64]) -> BTreeSet<NaiveDate> {
        days.iter().map(|d| today() - Duration::days(*d)).collect()
    }

    #[test]
    fn three_consecutive_days_ending_today() {
        assert_eq!(compute_streak(&days_ago(&[0, 1, 2]), today()), 3);
    }

    #[test]
    fn gap_at_today_and_yesterday_is_zero() {
        assert_eq!(compute_streak(&days_ago(&[2]), today()), 0);
    }

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(compute_streak(&BTreeSet::new(), today()), 0);
    }

    #[test]
    fn streak_may_end_yesterday() {
        assert_eq!(compute_streak(&days_ago(&[1, 2, 3, 5]), today()), 3);
    }

    #[test]
    fn stops_at_first_gap() {
        assert_eq!(compute_streak(&days_ago(&[0, 1, 3, 4, 5]), today()), 2);
    }

    #[test]
    fn future_dates_are_ignored() {
        let mut dates = days_ago(&[0]);
        dates.insert(today() + Duration::days(1));
        assert_eq!(compute_streak(&dates, today()), 1);
    }
}
