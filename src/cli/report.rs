use crate::{
    storage::{compute_total_elapsed, entities::SessionRecord},
    utils::time::TIMESTAMP_FORMAT,
};

/// Renders every session as a tab separated line followed by the total.
pub fn format_report(rows: &[SessionRecord]) -> Vec<String> {
    let mut lines = rows
        .iter()
        .map(|row| {
            format!(
                "{}\t{}\t{}\t{}",
                row.start_time.format(TIMESTAMP_FORMAT),
                row.end_time.format(TIMESTAMP_FORMAT),
                row.elapsed(),
                row.description
            )
        })
        .collect::<Vec<_>>();
    lines.push(format!("Total\t{}", compute_total_elapsed(rows)));
    lines
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

    use super::format_report;
    use crate::storage::entities::SessionRecord;

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    );

    #[test]
    fn test_report_lines() {
        let rows = [
            SessionRecord {
                start_time: TEST_START_DATE,
                end_time: TEST_START_DATE + TimeDelta::seconds(200),
                description: "wrote report".into(),
            },
            SessionRecord {
                start_time: TEST_START_DATE + TimeDelta::hours(2),
                end_time: TEST_START_DATE + TimeDelta::hours(3) + TimeDelta::minutes(58),
                description: String::new(),
            },
        ];

        assert_eq!(
            format_report(&rows),
            vec![
                "2024-01-01 10:00:00\t2024-01-01 10:03:20\t00:03\twrote report".to_string(),
                "2024-01-01 12:00:00\t2024-01-01 13:58:00\t01:58\t".to_string(),
                "Total\t02:01".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_report_has_total() {
        assert_eq!(format_report(&[]), vec!["Total\t00:00".to_string()]);
    }
}
