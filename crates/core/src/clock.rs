//! Wall-clock helpers.
//!
//! Every timestamp that is persisted or compared against a persisted value
//! goes through [`truncate`], so stored values are whole UTC seconds. That
//! keeps the textual SQLite encoding totally ordered and makes the SQL
//! predicates agree with [`crate::Liveness::evaluate`].

use time::{OffsetDateTime, UtcOffset};

/// Current UTC time truncated to whole seconds.
pub fn now() -> OffsetDateTime {
    truncate(OffsetDateTime::now_utc())
}

/// Convert to UTC and drop sub-second precision.
pub fn truncate(ts: OffsetDateTime) -> OffsetDateTime {
    let utc = ts.to_offset(UtcOffset::UTC);
    utc.replace_nanosecond(0).unwrap_or(utc)
}
