/// Calendar windows used to filter task lists by due date
///
/// All windows are half-open `[start, end)` and computed in UTC. Weeks run
/// Sunday through Saturday.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPeriod {
    Yesterday,
    Today,
    Tomorrow,
    Week,
    Month,
}

impl TaskPeriod {
    /// `[start, end)` of this period relative to `now`
    pub fn range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let today = now.date_naive();

        let (start, end) = match self {
            TaskPeriod::Yesterday => (today - Duration::days(1), today),
            TaskPeriod::Today => (today, today + Duration::days(1)),
            TaskPeriod::Tomorrow => (today + Duration::days(1), today + Duration::days(2)),
            TaskPeriod::Week => {
                let sunday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
                (sunday, sunday + Duration::days(7))
            }
            TaskPeriod::Month => {
                let first = today - Duration::days(i64::from(today.day0()));
                let next = first
                    .checked_add_months(Months::new(1))
                    .unwrap_or(NaiveDate::MAX);
                (first, next)
            }
        };

        (midnight(start), midnight(end))
    }

    pub fn contains(&self, now: DateTime<Utc>, instant: DateTime<Utc>) -> bool {
        let (start, end) = self.range(now);
        instant >= start && instant < end
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_day_periods() {
        // Wednesday
        let now = at(2024, 3, 13, 15);

        assert_eq!(TaskPeriod::Today.range(now), (at(2024, 3, 13, 0), at(2024, 3, 14, 0)));
        assert_eq!(TaskPeriod::Yesterday.range(now), (at(2024, 3, 12, 0), at(2024, 3, 13, 0)));
        assert_eq!(TaskPeriod::Tomorrow.range(now), (at(2024, 3, 14, 0), at(2024, 3, 15, 0)));
    }

    #[test]
    fn test_week_starts_on_sunday() {
        let wednesday = at(2024, 3, 13, 15);
        assert_eq!(
            TaskPeriod::Week.range(wednesday),
            (at(2024, 3, 10, 0), at(2024, 3, 17, 0))
        );

        let sunday = at(2024, 3, 10, 0);
        assert_eq!(TaskPeriod::Week.range(sunday).0, sunday);

        let saturday_night = Utc.with_ymd_and_hms(2024, 3, 16, 23, 59, 59).unwrap();
        assert_eq!(TaskPeriod::Week.range(saturday_night).0, at(2024, 3, 10, 0));
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            TaskPeriod::Month.range(at(2024, 2, 29, 12)),
            (at(2024, 2, 1, 0), at(2024, 3, 1, 0))
        );
        assert_eq!(
            TaskPeriod::Month.range(at(2023, 12, 31, 23)),
            (at(2023, 12, 1, 0), at(2024, 1, 1, 0))
        );
    }

    #[test]
    fn test_contains_is_half_open() {
        let now = at(2024, 3, 13, 15);
        assert!(TaskPeriod::Today.contains(now, at(2024, 3, 13, 0)));
        assert!(!TaskPeriod::Today.contains(now, at(2024, 3, 14, 0)));
    }

    #[test]
    fn test_deserialize() {
        let period: TaskPeriod = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(period, TaskPeriod::Week);
    }
}
