use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::mapper::map_league;
use crate::types::League;

/// The only envelope tag that carries a snapshot.
pub const CURRENT_TAG: &str = "current";

/// Outer `{t, d}` wrapper of every frame.
#[derive(Debug, Deserialize)]
struct Envelope {
    t: String,
    #[serde(default)]
    d: Option<Value>,
}

/// Outcome of a successfully parsed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Snapshot(League),
    /// Any tag other than `current`.
    Ignored { tag: String },
}

/// Why a frame was dropped. Never shown to the user; the previous League stays.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("current frame has no string payload")]
    MissingPayload,
    #[error("invalid payload JSON: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("payload is not an array")]
    NotAnArray,
    #[error("payload array is empty")]
    EmptyArray,
}

/// Decode one raw text frame.
pub fn decode_frame(text: &str) -> Result<Decoded, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
    if envelope.t != CURRENT_TAG {
        return Ok(Decoded::Ignored { tag: envelope.t });
    }

    let payload = match envelope.d {
        Some(Value::String(s)) => s,
        _ => return Err(DecodeError::MissingPayload),
    };
    decode_payload(&payload).map(Decoded::Snapshot)
}

/// Parse the JSON carried in `d` and map its first element.
pub fn decode_payload(payload: &str) -> Result<League, DecodeError> {
    let parsed: Value = serde_json::from_str(payload).map_err(DecodeError::Payload)?;
    let items = parsed.as_array().ok_or(DecodeError::NotAnArray)?;
    let first = items.first().ok_or(DecodeError::EmptyArray)?;
    Ok(map_league(first))
}
