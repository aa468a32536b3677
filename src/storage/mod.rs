//! Storage of tracked sessions is organized through [work_log::CsvWorkLog].
//! The basic idea is:
//!  - A profile is a base path `P` without extension.
//!  - Sessions are rows of the table `P.csv`, one row per session, with a header row.
//!  - Screenshots of the profile live in the directory `P/`.
//!  - Only the last row is ever modified. It is the open row while a session is tracked.

pub mod entities;
pub mod work_log;

use crate::utils::time::WorkingTime;

use entities::SessionRecord;

/// Sums durations of all rows in whole seconds. The result is decomposed into hours and
/// minutes only when displayed, so seconds of different rows add up.
pub fn compute_total_elapsed(rows: &[SessionRecord]) -> WorkingTime {
    rows.iter().map(SessionRecord::elapsed).sum()
}
