use std::{fmt::Display, ops::Add};

use chrono::{NaiveDateTime, TimeDelta};

/// Textual timestamp format of the work log columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used for screenshot file names and default profile names.
pub const FILE_NAME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// This is the standard way of converting a moment into a screenshot or profile name.
pub fn moment_to_file_name(moment: NaiveDateTime) -> String {
    moment.format(FILE_NAME_FORMAT).to_string()
}

/// Amount of worked time in whole seconds. Displayed as `HH:MM`, where seconds are truncated and
/// minutes carry into hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct WorkingTime {
    seconds: i64,
}

impl WorkingTime {
    pub const ZERO: WorkingTime = WorkingTime { seconds: 0 };

    /// Negative amounts are clamped to zero.
    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds: seconds.max(0),
        }
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::from_delta(end - start)
    }

    pub fn from_delta(delta: TimeDelta) -> Self {
        Self::from_seconds(delta.num_seconds())
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn hours(&self) -> i64 {
        self.seconds / 3600
    }

    pub fn minutes(&self) -> i64 {
        (self.seconds % 3600) / 60
    }
}

impl Add for WorkingTime {
    type Output = WorkingTime;

    fn add(self, rhs: Self) -> Self::Output {
        WorkingTime {
            seconds: self.seconds.saturating_add(rhs.seconds),
        }
    }
}

impl std::iter::Sum for WorkingTime {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(WorkingTime::ZERO, Add::add)
    }
}

impl Display for WorkingTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hours(), self.minutes())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_minutes_carry_into_hours() {
        let time = WorkingTime::from_seconds(59 * 60 + 59) + WorkingTime::from_seconds(61);
        assert_eq!(time.hours(), 1);
        assert_eq!(time.minutes(), 1);
        assert_eq!(time.to_string(), "01:01");
    }

    #[test]
    fn test_seconds_are_truncated() {
        assert_eq!(WorkingTime::from_seconds(200).to_string(), "00:03");
        assert_eq!(WorkingTime::from_seconds(59).to_string(), "00:00");
    }

    #[test]
    fn test_large_totals_keep_all_hours() {
        assert_eq!(WorkingTime::from_seconds(123 * 3600 + 45 * 60).to_string(), "123:45");
    }

    #[test]
    fn test_reversed_interval_is_zero() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(
            WorkingTime::between(start, start - TimeDelta::minutes(5)),
            WorkingTime::ZERO
        );
    }

    #[test]
    fn test_file_name_format() {
        let moment = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 5)
            .unwrap();
        assert_eq!(moment_to_file_name(moment), "2024-01-01_10:00:05");
    }
}
