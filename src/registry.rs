//! Identity and code assignment for newly registered students and staff.

use chrono::{DateTime, Datelike, Utc};

/// Ids are creation timestamps in milliseconds, bumped past the largest existing id so
/// two registrations inside the same millisecond stay unique and increasing. `None` once
/// an imported id already sits at `i64::MAX`.
pub fn next_id<I>(existing: I, now: DateTime<Utc>) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    let now_ms = now.timestamp_millis();
    match existing.into_iter().max() {
        Some(max) if max >= now_ms => max.checked_add(1),
        _ => Some(now_ms),
    }
}

/// `<year><sequence>` with a three digit sequence, e.g. `2024001` for the first student.
pub fn matric_number(roster_len: usize, now: DateTime<Utc>) -> String {
    format!("{}{:03}", now.year(), roster_len + 1)
}

/// Students rotate through classes 5A, 5B and 5C in registration order.
pub fn class_name(roster_len: usize) -> String {
    let letter = (b'A' + (roster_len % 3) as u8) as char;
    format!("5{}", letter)
}

/// Staff style codes such as `STF0001`.
pub fn sequence_code(prefix: &str, existing_len: usize) -> String {
    format!("{}{:04}", prefix, existing_len + 1)
}
