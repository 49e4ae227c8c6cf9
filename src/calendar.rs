//! Business-day and rebalance schedules.

use crate::types::RebalanceFrequency;
use chrono::{Datelike, NaiveDate, Weekday};

/// True for Monday through Friday. Exchange holidays are not modeled; days
/// without prices are skipped by the engine instead.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// All business days in `[start, end]`, in chronological order.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if is_business_day(current) {
            days.push(current);
        }
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}

/// The days on which the engine may query signals and trade.
///
/// `daily` trades every business day, `weekly` every business-day Monday,
/// `monthly` the first business day of each calendar month in range.
pub fn rebalance_days(
    start: NaiveDate,
    end: NaiveDate,
    frequency: RebalanceFrequency,
) -> Vec<NaiveDate> {
    let days = business_days(start, end);
    match frequency {
        RebalanceFrequency::Daily => days,
        RebalanceFrequency::Weekly => days
            .into_iter()
            .filter(|d| d.weekday() == Weekday::Mon)
            .collect(),
        RebalanceFrequency::Monthly => {
            let mut result = Vec::new();
            let mut current_month = None;
            for day in days {
                let month = (day.year(), day.month());
                if current_month != Some(month) {
                    result.push(day);
                    current_month = Some(month);
                }
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekends_excluded() {
        // 2024-01-06 is a Saturday.
        assert!(is_business_day(d(2024, 1, 5)));
        assert!(!is_business_day(d(2024, 1, 6)));
        assert!(!is_business_day(d(2024, 1, 7)));

        let days = business_days(d(2024, 1, 1), d(2024, 1, 14));
        assert_eq!(days.len(), 10);
        assert!(days.iter().all(|d| is_business_day(*d)));
    }

    #[test]
    fn test_daily_matches_business_days() {
        let start = d(2024, 3, 1);
        let end = d(2024, 3, 31);
        assert_eq!(
            rebalance_days(start, end, RebalanceFrequency::Daily),
            business_days(start, end)
        );
    }

    #[test]
    fn test_weekly_is_mondays() {
        let days = rebalance_days(d(2024, 1, 1), d(2024, 1, 31), RebalanceFrequency::Weekly);
        // Mondays in January 2024: 1, 8, 15, 22, 29.
        assert_eq!(
            days,
            vec![d(2024, 1, 1), d(2024, 1, 8), d(2024, 1, 15), d(2024, 1, 22), d(2024, 1, 29)]
        );
    }

    #[test]
    fn test_monthly_is_first_business_day() {
        let days = rebalance_days(d(2024, 1, 1), d(2024, 4, 30), RebalanceFrequency::Monthly);
        assert_eq!(
            days,
            vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1), d(2024, 4, 1)]
        );

        let days = rebalance_days(d(2024, 8, 1), d(2024, 9, 30), RebalanceFrequency::Monthly);
        // September 1st 2024 is a Sunday; the month's first business day is the 2nd.
        assert_eq!(days, vec![d(2024, 8, 1), d(2024, 9, 2)]);
    }

    #[test]
    fn test_monthly_mid_month_start() {
        // A range starting mid-month rebalances on its first business day.
        let days = rebalance_days(d(2024, 1, 17), d(2024, 2, 29), RebalanceFrequency::Monthly);
        assert_eq!(days, vec![d(2024, 1, 17), d(2024, 2, 1)]);
    }

    #[test]
    fn test_empty_range() {
        assert!(business_days(d(2024, 1, 10), d(2024, 1, 9)).is_empty());
        // A weekend-only range has no business days.
        assert!(business_days(d(2024, 1, 6), d(2024, 1, 7)).is_empty());
    }
}
