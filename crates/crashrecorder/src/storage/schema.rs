//! Snapshot file layout.
//!
//! A snapshot is a UTF-8, comma-separated file: one header row, then one row
//! per sample, oldest first.

use crate::sample::Signal;

/// Name of the leading timestamp column.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Number of columns in every row.
pub const COLUMN_COUNT: usize = 1 + Signal::ALL.len();

/// The header row, in column order.
#[must_use]
pub fn header() -> [&'static str; COLUMN_COUNT] {
    let [a, b, c, d] = Signal::ALL.map(Signal::column);
    [TIMESTAMP_COLUMN, a, b, c, d]
}
