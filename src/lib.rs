//! Terminal work-time tracker. A running session is kept as the last row of a CSV table and
//! updated periodically, screenshots of the screen are saved next to the table, and the total of
//! all tracked work is shown as hours and minutes.
//!

pub mod capture;
pub mod cli;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tracker;
pub mod utils;
