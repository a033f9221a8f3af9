//! Timestamp encoding for SQLite TEXT columns.
//!
//! All stores write UTC instants with a fixed microsecond precision and a `Z`
//! suffix, so comparing the stored strings lexically is the same as comparing
//! the instants. Range predicates like `execute_at <= ?now` rely on this.

use chrono::{DateTime, SecondsFormat, Utc};

/// Encode `ts` in the canonical column format.
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a column value written by [`to_db`] (or any RFC 3339 string).
pub fn from_db(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn lexical_order_matches_time_order() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let a = to_db(base);
        let b = to_db(base + Duration::microseconds(1));
        let c = to_db(base + Duration::hours(20));
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.len(), c.len());
    }

    #[test]
    fn offset_input_normalises_to_utc() {
        let parsed = from_db("2026-03-01T10:00:00+01:00").unwrap();
        assert_eq!(to_db(parsed), "2026-03-01T09:00:00.000000Z");
    }
}
