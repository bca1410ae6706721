//! Unwrapping of raw transport messages.
//!
//! A message body is JSON carrying a `Message` field. That field is usually a
//! JSON document encoded as a string, and the upstream publisher sometimes
//! quotes it with `'` instead of `"`. Entry results may additionally arrive
//! wrapped in a `result` object.

use serde_json::Value;
use thiserror::Error;

use crate::event::{ENTRY_RESULT_TAG, ErrorReport, KNOWN_TAGS, MatrixEvent};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not valid JSON: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("envelope has no `Message` field")]
    MissingMessage,
    #[error("nested message is not valid JSON: {0}")]
    Message(#[source] serde_json::Error),
    #[error("message has no `type` discriminator")]
    MissingType,
    #[error("unknown message type '{0}'")]
    UnknownType(String),
    #[error("malformed '{tag}' payload: {source}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("matrix '{id}' has empty shape {rows}x{columns}")]
    EmptyShape { id: String, rows: u32, columns: u32 },
    #[error("message carries no `error` report")]
    MissingError,
    #[error("malformed error report: {0}")]
    ErrorReport(#[source] serde_json::Error),
}

/// Decode a raw result-stream message into a typed event.
pub fn decode_event(raw: &str) -> Result<MatrixEvent, DecodeError> {
    let payload = unwrap_entry_result(open_envelope(raw)?);
    let tag = payload
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();
    if !KNOWN_TAGS.contains(&tag.as_str()) {
        return Err(DecodeError::UnknownType(tag));
    }
    let event: MatrixEvent =
        serde_json::from_value(payload).map_err(|source| DecodeError::Payload { tag, source })?;
    if let MatrixEvent::NewMatrix { matrix } = &event {
        if matrix.rows == 0 || matrix.columns == 0 {
            return Err(DecodeError::EmptyShape {
                id: matrix.id.clone(),
                rows: matrix.rows,
                columns: matrix.columns,
            });
        }
    }
    Ok(event)
}

/// Decode a raw error-feed message into the worker's error report.
pub fn decode_error_report(raw: &str) -> Result<ErrorReport, DecodeError> {
    let mut payload = open_envelope(raw)?;
    let report = payload
        .get_mut("error")
        .map(Value::take)
        .ok_or(DecodeError::MissingError)?;
    serde_json::from_value(report).map_err(DecodeError::ErrorReport)
}

fn open_envelope(raw: &str) -> Result<Value, DecodeError> {
    let mut outer: Value = serde_json::from_str(raw).map_err(DecodeError::Envelope)?;
    match outer.get_mut("Message").map(Value::take) {
        Some(Value::String(inner)) => {
            let normalized = inner.replace('\'', "\"");
            serde_json::from_str(&normalized).map_err(DecodeError::Message)
        }
        Some(message @ Value::Object(_)) => Ok(message),
        _ => Err(DecodeError::MissingMessage),
    }
}

fn unwrap_entry_result(mut payload: Value) -> Value {
    let wrapped = payload
        .get("result")
        .and_then(|result| result.get("type"))
        .and_then(Value::as_str)
        == Some(ENTRY_RESULT_TAG);
    if wrapped {
        if let Some(inner) = payload.get_mut("result") {
            return inner.take();
        }
    }
    payload
}
