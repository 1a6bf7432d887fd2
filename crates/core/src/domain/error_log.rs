// Job error log entries

use serde::{Deserialize, Serialize};

/// Default maximum characters kept per error message
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 2000;

/// Default maximum number of entries kept per job
pub const DEFAULT_MAX_ERROR_ENTRIES: usize = 100;

/// One failure reported against a job. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub error_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<serde_json::Value>,
}

/// Bounds applied to a job's error log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLogLimits {
    pub max_message_len: usize,
    pub max_entries: usize,
}

impl Default for ErrorLogLimits {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_entries: DEFAULT_MAX_ERROR_ENTRIES,
        }
    }
}

impl ErrorEntry {
    /// Build an entry with the message cut down to `limits.max_message_len` characters
    pub fn new(
        error_code: impl Into<String>,
        message: &str,
        additional: Option<serde_json::Value>,
        limits: &ErrorLogLimits,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: truncate_message(message, limits.max_message_len),
            // An empty object carries no information
            additional: additional.filter(|value| match value {
                serde_json::Value::Null => false,
                serde_json::Value::Object(map) => !map.is_empty(),
                _ => true,
            }),
        }
    }
}

/// Truncate to at most `max_chars` characters, never splitting a UTF-8 sequence
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => message[..byte_idx].to_string(),
        None => message.to_string(),
    }
}
