//! Event parser — turns one decoded frame into a typed [`StreamEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ParseError;
use crate::models::JobListing;

const EVENT_TYPES: &[&str] = &["start", "jobs", "done", "error"];

/// The closed set of messages the search stream carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Sources the server is about to query. May disagree with the request.
    Start {
        #[serde(rename = "platforms", default)]
        sources: Vec<String>,
    },
    /// Results for one source.
    #[serde(rename = "jobs")]
    Batch {
        #[serde(rename = "platform")]
        source: String,
        #[serde(rename = "jobs", default)]
        results: Vec<JobListing>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    /// Session-wide success; there is no per-source completion message.
    Done,
    /// Session-wide failure.
    Error { message: String },
}

impl StreamEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::Batch { .. } => "jobs",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Wire form of the event, terminator included.
    #[cfg(test)]
    pub fn to_frame(&self) -> String {
        format!("data: {}\n\n", serde_json::to_string(self).unwrap())
    }
}

/// Parses one frame.
///
/// Returns `Ok(None)` for frames without a `data` field (comments, keep-alives).
/// Multiple `data` lines are joined with `\n`; other fields are ignored.
pub fn parse_frame(frame: &[u8]) -> Result<Option<StreamEvent>, ParseError> {
    let text = std::str::from_utf8(frame).map_err(|_| ParseError::InvalidUtf8)?;

    let mut data: Option<String> = None;
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(buf) => {
                buf.push('\n');
                buf.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    match data {
        Some(payload) => parse_payload(&payload).map(Some),
        None => Ok(None),
    }
}

/// Parses the JSON body of a `data` field.
pub fn parse_payload(payload: &str) -> Result<StreamEvent, ParseError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let event_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ParseError::InvalidJson("missing string field 'type'".to_string()))?;
    if !EVENT_TYPES.contains(&event_type) {
        return Err(ParseError::UnknownType(event_type.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))
}
