//! Frame Codec
//!
//! Outgoing envelopes are MessagePack with named map keys. Incoming frames are
//! tried as MessagePack first, then as UTF-8 JSON, since degraded server paths
//! send text. A frame that is neither is reported as an error for the caller
//! to log and drop; decoding never panics.

use serde_json::Value;
use thiserror::Error;

use crate::network::protocol::Envelope;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Envelope could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Neither decoder accepted the frame.
    #[error("undecodable frame (binary: {binary}; text: {text})")]
    Undecodable {
        /// MessagePack failure.
        binary: String,
        /// JSON failure.
        text: String,
    },
}

/// Which decoder accepted a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// MessagePack.
    MessagePack,
    /// JSON text fallback.
    Json,
}

/// A decoded server payload: one entity object or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single object.
    Single(Value),
    /// An array of objects.
    Batch(Vec<Value>),
}

impl Payload {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => Ok(Self::Batch(items)),
            object @ Value::Object(_) => Ok(Self::Single(object)),
            other => Err(format!("expected object or array, got {}", kind_name(&other))),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(items) => items.len(),
        }
    }

    /// Whether the payload has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decoder output.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Payload.
    pub payload: Payload,
    /// Decoder that accepted the frame.
    pub format: FrameFormat,
}

/// Encode an envelope as MessagePack.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(envelope)?)
}

/// Decode a frame, MessagePack first and JSON second.
///
/// A MessagePack decode that yields anything other than an object or array
/// counts as a failure: a JSON text frame starts with `{` or `[`, which are
/// valid MessagePack integers.
pub fn decode(bytes: &[u8]) -> Result<Decoded, CodecError> {
    let binary = rmp_serde::from_slice::<Value>(bytes)
        .map_err(|e| e.to_string())
        .and_then(Payload::from_value);

    let binary_err = match binary {
        Ok(payload) => {
            return Ok(Decoded {
                payload,
                format: FrameFormat::MessagePack,
            })
        }
        Err(e) => e,
    };

    let text = serde_json::from_slice::<Value>(bytes)
        .map_err(|e| e.to_string())
        .and_then(Payload::from_value);

    match text {
        Ok(payload) => Ok(Decoded {
            payload,
            format: FrameFormat::Json,
        }),
        Err(text_err) => Err(CodecError::Undecodable {
            binary: binary_err,
            text: text_err,
        }),
    }
}
