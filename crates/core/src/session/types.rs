use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session identifier issued by the session middleware.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Session payload as handed over by the middleware.
pub type SessionData = serde_json::Map<String, Value>;

/// A scalar that fits in a relational column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&Value> for ColumnValue {
    /// Booleans become `0`/`1` and nested values their JSON text, which is
    /// how they read back from a SQL column.
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

impl From<Value> for ColumnValue {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Caller-defined columns stored next to `data` and `expires`.
pub type ExtraFields = BTreeMap<String, ColumnValue>;

/// One row of the session table.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub sid: SessionId,
    /// Encrypted, base64-encoded payload.
    pub data: String,
    pub expires: DateTime<Utc>,
    pub extra: ExtraFields,
}

impl SessionRow {
    pub fn new(sid: SessionId, data: impl Into<String>, expires: DateTime<Utc>) -> Self {
        Self {
            sid,
            data: data.into(),
            expires,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }
}

/// Column changes applied to an existing row.
///
/// `expires` is always written. `data` is left untouched when `None`, and
/// only the extra columns present in `extra` are written.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub data: Option<String>,
    pub expires: DateTime<Utc>,
    pub extra: ExtraFields,
}

impl RowUpdate {
    /// An update that only moves the expiry.
    pub fn expires_only(expires: DateTime<Utc>) -> Self {
        Self {
            data: None,
            expires,
            extra: ExtraFields::new(),
        }
    }

    /// Applies the update to a row in place.
    pub fn apply_to(&self, row: &mut SessionRow) {
        if let Some(data) = &self.data {
            row.data = data.clone();
        }
        row.expires = self.expires;
        for (column, value) in &self.extra {
            row.extra.insert(column.clone(), value.clone());
        }
    }
}
