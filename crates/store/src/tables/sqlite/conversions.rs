//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and session types.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Value, ValueRef};
use rusqlite::Row;

use sessionstore_core::session::{ColumnValue, ExtraFields, SessionId, SessionRow};

/// Convert a SQLite row to a SessionRow.
///
/// Expected columns: sid, data, expires, then `extra_columns` in order.
pub fn row_to_session(row: &Row, extra_columns: &[String]) -> rusqlite::Result<SessionRow> {
    let sid: String = row.get(0)?;
    let data: Option<String> = row.get(1)?;
    let expires: String = row.get(2)?;

    let mut extra = ExtraFields::new();
    for (offset, column) in extra_columns.iter().enumerate() {
        extra.insert(column.clone(), value_ref_to_column(row.get_ref(3 + offset)?));
    }

    Ok(SessionRow {
        sid: SessionId::new(sid),
        data: data.unwrap_or_default(),
        expires: parse_datetime(&expires, 2)?,
        extra,
    })
}

/// Convert a borrowed SQLite value to a ColumnValue.
pub fn value_ref_to_column(value: ValueRef<'_>) -> ColumnValue {
    match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) => ColumnValue::Integer(i),
        ValueRef::Real(f) => ColumnValue::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Convert a ColumnValue to an owned SQLite value for binding.
pub fn column_to_value(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Null => Value::Null,
        ColumnValue::Integer(i) => Value::Integer(*i),
        ColumnValue::Real(f) => Value::Real(*f),
        ColumnValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Format a timestamp for storage.
///
/// Fixed-width UTC with millisecond precision, so comparing the strings
/// compares the instants.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_datetime_is_fixed_width_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();
        assert_eq!(format_datetime(&dt), "2024-06-15T10:30:00.000Z");
    }

    #[test]
    fn test_formatted_datetimes_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 6, 15, 9, 59, 59).unwrap()
            + Duration::milliseconds(999);
        let later = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        assert!(format_datetime(&earlier) < format_datetime(&later));
    }

    #[test]
    fn test_parse_datetime_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();
        assert_eq!(parse_datetime(&format_datetime(&dt), 2).unwrap(), dt);
    }

    #[test]
    fn test_parse_datetime_invalid() {
        assert!(matches!(
            parse_datetime("yesterday", 2),
            Err(rusqlite::Error::FromSqlConversionFailure(2, _, _))
        ));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(value_ref_to_column(ValueRef::Null), ColumnValue::Null);
        assert_eq!(
            value_ref_to_column(ValueRef::Integer(3)),
            ColumnValue::Integer(3)
        );
        assert_eq!(
            value_ref_to_column(ValueRef::Text(b"bob")),
            ColumnValue::Text("bob".to_string())
        );
        assert_eq!(
            column_to_value(&ColumnValue::Real(1.5)),
            Value::Real(1.5)
        );
    }
}
