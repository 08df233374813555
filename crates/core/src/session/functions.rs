use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::{ExtraFields, RowUpdate, SessionData, SessionRow};

/// Earliest storable expiry, `0000-01-01T00:00:00.000Z`.
pub const MIN_EXPIRES_MILLIS: i64 = -62_167_219_200_000;

/// Latest storable expiry, `9999-12-31T23:59:59.999Z`.
pub const MAX_EXPIRES_MILLIS: i64 = 253_402_300_799_999;

/// Compute the absolute expiry for a payload.
///
/// Uses `cookie.expires` when present, either as an RFC 3339 string or as
/// milliseconds since the Unix epoch. Otherwise the session lives for `ttl`
/// from `now`. The result has millisecond precision and is clamped to
/// four-digit years.
pub fn expiration(data: &SessionData, now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let millis = cookie_expires_millis(data).unwrap_or_else(|| {
        now.checked_add_signed(ttl)
            .map_or(MAX_EXPIRES_MILLIS, |expires| expires.timestamp_millis())
    });
    storable_expiry(millis)
}

/// Whether `now + ttl` stays within the storable range.
pub fn ttl_in_range(now: DateTime<Utc>, ttl: Duration) -> bool {
    now.checked_add_signed(ttl)
        .is_some_and(|expires| expires.timestamp_millis() <= MAX_EXPIRES_MILLIS)
}

fn cookie_expires_millis(data: &SessionData) -> Option<i64> {
    match data.get("cookie")?.get("expires")? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn storable_expiry(millis: i64) -> DateTime<Utc> {
    let millis = millis.clamp(MIN_EXPIRES_MILLIS, MAX_EXPIRES_MILLIS);
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether a row is logically dead at `now`.
pub fn is_expired(row: &SessionRow, now: DateTime<Utc>) -> bool {
    row.expires <= now
}

/// Outcome of comparing a stored row with the row a `set` wants to store.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub changed: bool,
    pub update: RowUpdate,
}

/// Diff `stored` against `candidate`.
///
/// Only the encrypted blob and the extra columns are compared. Ciphertext
/// carries a random nonce, so a fresh encryption of the same payload always
/// counts as a change.
pub fn plan_write(stored: &SessionRow, candidate: &SessionRow) -> WritePlan {
    let data = (stored.data != candidate.data).then(|| candidate.data.clone());

    let extra: ExtraFields = candidate
        .extra
        .iter()
        .filter(|(column, value)| stored.extra.get(*column) != Some(*value))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect();

    WritePlan {
        changed: data.is_some() || !extra.is_empty(),
        update: RowUpdate {
            data,
            expires: candidate.expires,
            extra,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ColumnValue, SessionId};
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    fn payload(value: Value) -> SessionData {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn expiration_defaults_to_now_plus_ttl() {
        let data = payload(json!({"user": "bob", "cookie": {}}));
        let expires = expiration(&data, fixed_now(), Duration::hours(24));
        assert_eq!(expires, fixed_now() + Duration::hours(24));
    }

    #[test]
    fn expiration_uses_cookie_expires_string() {
        let data = payload(json!({"cookie": {"expires": "2030-01-01T00:00:00.000Z"}}));
        let expires = expiration(&data, fixed_now(), Duration::hours(24));
        assert_eq!(expires, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn expiration_uses_cookie_expires_millis() {
        let hint = fixed_now() + Duration::minutes(10);
        let data = payload(json!({"cookie": {"expires": hint.timestamp_millis()}}));
        assert_eq!(expiration(&data, fixed_now(), Duration::hours(24)), hint);
    }

    #[test]
    fn expiration_ignores_unparseable_hint() {
        let data = payload(json!({"cookie": {"expires": "next tuesday"}}));
        let ttl = Duration::minutes(30);
        assert_eq!(expiration(&data, fixed_now(), ttl), fixed_now() + ttl);
    }

    #[test]
    fn expiration_ignores_null_hint() {
        let data = payload(json!({"cookie": {"expires": null}}));
        let ttl = Duration::minutes(30);
        assert_eq!(expiration(&data, fixed_now(), ttl), fixed_now() + ttl);
    }

    #[test]
    fn expiration_truncates_to_milliseconds() {
        let now = fixed_now() + Duration::nanoseconds(1_234_567);
        let expires = expiration(&SessionData::new(), now, Duration::hours(1));
        assert_eq!(
            expires,
            fixed_now() + Duration::hours(1) + Duration::milliseconds(1)
        );
    }

    #[test]
    fn expiration_clamps_far_future_millis_hint() {
        let data = payload(json!({"cookie": {"expires": 300_000_000_000_000_i64}}));
        let expires = expiration(&data, fixed_now(), Duration::hours(24));
        assert_eq!(expires.timestamp_millis(), MAX_EXPIRES_MILLIS);
        assert_eq!(
            expires.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "9999-12-31T23:59:59.999Z"
        );
    }

    #[test]
    fn expiration_clamps_far_past_millis_hint() {
        let data = payload(json!({"cookie": {"expires": -300_000_000_000_000_i64}}));
        let expires = expiration(&data, fixed_now(), Duration::hours(24));
        assert_eq!(
            expires.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "0000-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn expiration_with_huge_ttl_does_not_overflow() {
        let ttl = Duration::milliseconds(10_000_000_000_000_000);
        let expires = expiration(&SessionData::new(), fixed_now(), ttl);
        assert_eq!(expires.timestamp_millis(), MAX_EXPIRES_MILLIS);
    }

    #[test]
    fn expiration_hint_skips_ttl_arithmetic() {
        let data = payload(json!({"cookie": {"expires": "2030-01-01T00:00:00.000Z"}}));
        let expires = expiration(&data, DateTime::<Utc>::MAX_UTC, Duration::days(1));
        assert_eq!(expires, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn ttl_in_range_rejects_unstorable_lifetimes() {
        assert!(ttl_in_range(fixed_now(), Duration::hours(24)));
        assert!(!ttl_in_range(
            fixed_now(),
            Duration::milliseconds(10_000_000_000_000_000)
        ));
        assert!(!ttl_in_range(fixed_now(), Duration::days(365 * 8000)));
    }

    #[test]
    fn is_expired_at_exact_expiry() {
        let row = SessionRow::new(SessionId::from("abc"), "blob", fixed_now());
        assert!(is_expired(&row, fixed_now()));
        assert!(!is_expired(&row, fixed_now() - Duration::seconds(1)));
    }

    #[test]
    fn plan_write_identical_rows_is_unchanged() {
        let row = SessionRow::new(SessionId::from("abc"), "blob", fixed_now());
        let candidate = SessionRow {
            expires: fixed_now() + Duration::hours(1),
            ..row.clone()
        };

        let plan = plan_write(&row, &candidate);

        assert!(!plan.changed);
        assert_eq!(plan.update.data, None);
        assert!(plan.update.extra.is_empty());
    }

    #[test]
    fn plan_write_new_blob_is_changed_and_refreshes_expiry() {
        let row = SessionRow::new(SessionId::from("abc"), "blob", fixed_now());
        let later = fixed_now() + Duration::hours(1);
        let candidate = SessionRow::new(SessionId::from("abc"), "other", later);

        let plan = plan_write(&row, &candidate);

        assert!(plan.changed);
        assert_eq!(plan.update.data.as_deref(), Some("other"));
        assert_eq!(plan.update.expires, later);
    }

    #[test]
    fn plan_write_only_carries_changed_extra_columns() {
        let mut stored_extra = ExtraFields::new();
        stored_extra.insert("user_id".to_string(), ColumnValue::from("alice"));
        stored_extra.insert("role".to_string(), ColumnValue::from("admin"));
        let row =
            SessionRow::new(SessionId::from("abc"), "blob", fixed_now()).with_extra(stored_extra);

        let mut new_extra = ExtraFields::new();
        new_extra.insert("user_id".to_string(), ColumnValue::from("bob"));
        new_extra.insert("role".to_string(), ColumnValue::from("admin"));
        let candidate =
            SessionRow::new(SessionId::from("abc"), "blob", fixed_now()).with_extra(new_extra);

        let plan = plan_write(&row, &candidate);

        assert!(plan.changed);
        assert_eq!(plan.update.data, None);
        assert_eq!(plan.update.extra.len(), 1);
        assert_eq!(plan.update.extra["user_id"], ColumnValue::from("bob"));
    }
}
