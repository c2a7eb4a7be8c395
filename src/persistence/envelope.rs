//! On-disk save envelopes
//!
//! Three shapes have shipped:
//! - current: `{"version": 2, "payload": "<base64 zlib json>", "signature": "<hex>"}`
//! - legacy signed: payload fields inline at the top level plus `"signature"`
//! - legacy unsigned: the bare payload mapping
//!
//! [`Envelope::detect`] picks the shape once; everything after works on the variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::consts::CURRENT_ENVELOPE_VERSION;

const VERSION_FIELD: &str = "version";
const PAYLOAD_FIELD: &str = "payload";
const SIGNATURE_FIELD: &str = "signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("save file is not a json object")]
    NotAMapping,
    #[error("envelope version is not an integer")]
    BadVersion,
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u64),
}

/// Shape of a save file, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeFormat {
    Current,
    LegacySigned,
    LegacyUnsigned,
}

impl EnvelopeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeFormat::Current => "current",
            EnvelopeFormat::LegacySigned => "legacy-signed",
            EnvelopeFormat::LegacyUnsigned => "legacy-unsigned",
        }
    }
}

/// A parsed save file
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Encoded payload blob; still needs decoding
    Current { blob: String, signature: String },
    /// Inline payload with the signature field already stripped
    LegacySigned {
        payload: Map<String, Value>,
        signature: String,
    },
    /// Inline payload with no signature at all
    Unsigned { payload: Map<String, Value> },
}

/// Wire form of the envelope every save writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentEnvelope {
    pub version: u64,
    pub payload: String,
    pub signature: String,
}

impl CurrentEnvelope {
    pub fn new(payload: String, signature: String) -> Self {
        Self {
            version: CURRENT_ENVELOPE_VERSION,
            payload,
            signature,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

impl Envelope {
    /// Classify a parsed save file by its fields
    pub fn detect(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAMapping);
        };

        let is_current = map.contains_key(VERSION_FIELD)
            && matches!(map.get(PAYLOAD_FIELD), Some(Value::String(_)));
        if is_current {
            let version = map
                .get(VERSION_FIELD)
                .and_then(Value::as_u64)
                .ok_or(EnvelopeError::BadVersion)?;
            if version != CURRENT_ENVELOPE_VERSION {
                return Err(EnvelopeError::UnsupportedVersion(version));
            }
            let blob = match map.remove(PAYLOAD_FIELD) {
                Some(Value::String(s)) => s,
                _ => String::new(),
            };
            let signature = signature_text(map.remove(SIGNATURE_FIELD));
            return Ok(Envelope::Current { blob, signature });
        }

        match map.remove(SIGNATURE_FIELD) {
            Some(sig) => Ok(Envelope::LegacySigned {
                payload: map,
                signature: signature_text(Some(sig)),
            }),
            None => Ok(Envelope::Unsigned { payload: map }),
        }
    }

    pub fn format(&self) -> EnvelopeFormat {
        match self {
            Envelope::Current { .. } => EnvelopeFormat::Current,
            Envelope::LegacySigned { .. } => EnvelopeFormat::LegacySigned,
            Envelope::Unsigned { .. } => EnvelopeFormat::LegacyUnsigned,
        }
    }
}

/// Non-string signatures become empty, which no key verifies
fn signature_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}
