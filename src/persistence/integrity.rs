//! Keyed signatures over canonical payload bytes (HMAC-SHA256, hex encoded)

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

use super::codec::{CodecError, canonical_encode};
use super::keystore::SecretKey;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("hmac failed: {0}")]
    HmacFailed(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Hex HMAC-SHA256 of the canonical encoding of `payload`
pub fn sign(payload: &Map<String, Value>, key: &SecretKey) -> Result<String, IntegrityError> {
    let mut mac = mac_for(key)?;
    mac.update(&canonical_encode(payload)?);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Index of the first key in `keys` whose signature matches, compared in constant time
pub fn verify(payload: &Map<String, Value>, signature: &str, keys: &[&SecretKey]) -> Option<usize> {
    let tag = hex::decode(signature.trim()).ok()?;
    let canonical = canonical_encode(payload).ok()?;
    keys.iter().position(|key| match mac_for(key) {
        Ok(mut mac) => {
            mac.update(&canonical);
            mac.verify_slice(&tag).is_ok()
        }
        Err(_) => false,
    })
}

fn mac_for(key: &SecretKey) -> Result<HmacSha256, IntegrityError> {
    HmacSha256::new_from_slice(key.expose()).map_err(|e| IntegrityError::HmacFailed(format!("{e}")))
}

/// Which candidate key accepted a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Current,
    /// Index into the guard's legacy keys
    Legacy(usize),
}

/// Signs with the current key; verifies against the current key, then each legacy key.
#[derive(Debug, Clone)]
pub struct IntegrityGuard {
    current: SecretKey,
    legacy: Vec<SecretKey>,
}

impl IntegrityGuard {
    pub fn new(current: SecretKey) -> Self {
        Self {
            current,
            legacy: Vec::new(),
        }
    }

    pub fn with_legacy(mut self, key: SecretKey) -> Self {
        self.legacy.push(key);
        self
    }

    pub fn sign(&self, payload: &Map<String, Value>) -> Result<String, IntegrityError> {
        sign(payload, &self.current)
    }

    pub fn verify(&self, payload: &Map<String, Value>, signature: &str) -> Option<KeyMatch> {
        let keys: Vec<&SecretKey> = std::iter::once(&self.current).chain(&self.legacy).collect();
        match verify(payload, signature, &keys)? {
            0 => Some(KeyMatch::Current),
            i => Some(KeyMatch::Legacy(i - 1)),
        }
    }
}
