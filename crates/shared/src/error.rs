use serde_json::Value;
use thiserror::Error;

pub const ERROR_MESSAGE_KEY: &str = "_ERROR_MESSAGE_";
pub const ERROR_MESSAGE_LIST_KEY: &str = "_ERROR_MESSAGE_LIST_";

/// A response body the service flagged as failed, or a non-200 status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("service rejected request (status {status}): {}", .message.as_deref().unwrap_or("no message"))]
pub struct ServiceFault {
    pub status: u16,
    pub message: Option<String>,
}

/// True when the body carries the application-level error flag.
pub fn has_error(body: &Value) -> bool {
    let Some(map) = body.as_object() else {
        return false;
    };
    if map.get(ERROR_MESSAGE_KEY).is_some_and(|v| !v.is_null()) {
        return true;
    }
    match map.get(ERROR_MESSAGE_LIST_KEY) {
        Some(Value::Array(list)) => !list.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Human readable error carried by the body, if any.
pub fn error_message(body: &Value) -> Option<String> {
    let map = body.as_object()?;
    match map.get(ERROR_MESSAGE_KEY) {
        Some(Value::String(message)) => return Some(message.clone()),
        Some(Value::Null) | None => {}
        Some(other) => return Some(other.to_string()),
    }
    let list = map.get(ERROR_MESSAGE_LIST_KEY)?.as_array()?;
    let joined = list
        .iter()
        .map(|entry| match entry {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}
