//! Canonical payload encoding
//!
//! Signing and storage both start from the same canonical bytes: compact JSON
//! with keys in sorted order. `serde_json::Map` is a `BTreeMap` as long as the
//! `preserve_order` feature stays off, so serializing a mapping is already
//! canonical at every nesting level.
//!
//! Storage form: canonical bytes -> zlib -> standard base64.

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, bufread::ZlibDecoder, write::ZlibEncoder};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("{0} bytes of trailing data after compressed payload")]
    TrailingData(usize),
    #[error("payload is not a mapping")]
    NotAMapping,
}

/// Deterministic bytes for a payload mapping
pub fn canonical_encode(payload: &Map<String, Value>) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(payload)?)
}

/// Canonical-encode, compress and base64 a payload for the current envelope
pub fn encode_for_storage(payload: &Map<String, Value>) -> Result<String, CodecError> {
    let canonical = canonical_encode(payload)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&canonical)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Reverse of [`encode_for_storage`]; any failure yields `None`
pub fn decode_from_storage(blob: &str) -> Option<Map<String, Value>> {
    match try_decode_from_storage(blob) {
        Ok(map) => Some(map),
        Err(e) => {
            log::debug!("Stored payload did not decode: {}", e);
            None
        }
    }
}

/// Reverse of [`encode_for_storage`], reporting which stage failed
pub fn try_decode_from_storage(blob: &str) -> Result<Map<String, Value>, CodecError> {
    let compressed = STANDARD.decode(blob.trim())?;
    let mut json = Vec::new();
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    decoder.read_to_end(&mut json)?;
    let trailing = decoder.get_ref().len();
    if trailing > 0 {
        return Err(CodecError::TrailingData(trailing));
    }
    match serde_json::from_slice(&json)? {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::NotAMapping),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn mapping(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_canonical_is_sorted_and_compact() {
        let payload = mapping(json!({
            "money": 10,
            "cat": {"stage": "baby", "name": "Nabi"},
            "day": 3
        }));
        let bytes = canonical_encode(&payload).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"cat":{"name":"Nabi","stage":"baby"},"day":3,"money":10}"#
        );
    }

    #[test]
    fn test_canonical_ignores_source_order() {
        let a: Map<String, Value> = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
        let b: Map<String, Value> = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        assert_eq!(canonical_encode(&a).unwrap(), canonical_encode(&b).unwrap());
    }

    #[test]
    fn test_storage_round_trip() {
        let payload = mapping(json!({"day": 4, "inventory": {"fish": 2}, "cat": {"name": "고양이"}}));
        let blob = encode_for_storage(&payload).unwrap();
        assert!(!blob.contains('{'));
        assert_eq!(decode_from_storage(&blob), Some(payload));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(decode_from_storage("not base64 at all!").is_none());
        assert!(matches!(
            try_decode_from_storage("%%%%"),
            Err(CodecError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_rejects_uncompressed_data() {
        let blob = STANDARD.encode(br#"{"day":1}"#);
        assert!(matches!(
            try_decode_from_storage(&blob),
            Err(CodecError::Compression(_))
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"day":1}"#).unwrap();
        let mut compressed = encoder.finish().unwrap();
        compressed.push(0);
        let blob = STANDARD.encode(compressed);
        assert!(matches!(
            try_decode_from_storage(&blob),
            Err(CodecError::TrailingData(1))
        ));
    }

    #[test]
    fn test_decode_rejects_non_mapping() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"[1,2,3]").unwrap();
        let blob = STANDARD.encode(encoder.finish().unwrap());
        assert!(matches!(
            try_decode_from_storage(&blob),
            Err(CodecError::NotAMapping)
        ));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"day\":").unwrap();
        let blob = STANDARD.encode(encoder.finish().unwrap());
        assert!(matches!(try_decode_from_storage(&blob), Err(CodecError::Json(_))));
    }

    proptest! {
        #[test]
        fn prop_canonical_is_deterministic(entries in proptest::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..16)) {
            let forward: Map<String, Value> = entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let backward: Map<String, Value> = entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            // Later duplicates win on insert, so only compare when keys are unique
            let unique = forward.len() == entries.len();
            prop_assume!(unique);
            prop_assert_eq!(canonical_encode(&forward).unwrap(), canonical_encode(&backward).unwrap());
            let blob = encode_for_storage(&forward).unwrap();
            prop_assert_eq!(decode_from_storage(&blob), Some(forward));
        }
    }
}
