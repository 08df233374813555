//! Output formatting functions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sessionstore_core::session::SessionData;

use crate::cli::OutputFormat;

/// A stored session as shown to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub sid: String,
    pub expires: DateTime<Utc>,
    pub expired: bool,
    pub data: SessionData,
}

/// Format a value for output.
pub fn format_output<T: Serialize>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(value).unwrap_or_default(),
        OutputFormat::Pretty => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Format a session for display.
pub fn format_session(session: &SessionView) -> String {
    let status = if session.expired { " (expired)" } else { "" };
    let data = serde_json::to_string_pretty(&session.data).unwrap_or_default();
    format!(
        "{}{}\n  Expires: {}\n  Data: {}",
        session.sid,
        status,
        session.expires.to_rfc3339(),
        data.replace('\n', "\n  ")
    )
}
