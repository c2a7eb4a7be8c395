//! Per-user sealing of opaque bytes at rest
//!
//! The native implementation binds sealed blobs to the current OS account and
//! to [`SEAL_ENTROPY`]. Platforms without such a facility get an identity
//! sealer; the key store compensates by writing the file owner-only.

use thiserror::Error;

#[cfg(windows)]
use crate::consts::SEAL_ENTROPY;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("sealing failed: {0}")]
    SealFailed(String),
    #[error("unsealing failed: {0}")]
    UnsealFailed(String),
}

/// Capability to seal and unseal bytes for the current user
pub trait SecretSealer {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError>;
    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Identity sealer for platforms without a per-user secret store
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextSealer;

impl SecretSealer for PlaintextSealer {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        Ok(plaintext.to_vec())
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        Ok(sealed.to_vec())
    }

    fn name(&self) -> &'static str {
        "plaintext"
    }
}

/// Sealer backed by the Windows Data Protection API
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DpapiSealer;

#[cfg(windows)]
mod dpapi {
    use std::ptr;

    use windows_sys::Win32::Foundation::LocalFree;
    use windows_sys::Win32::Security::Cryptography::{
        CRYPT_INTEGER_BLOB, CRYPTPROTECT_UI_FORBIDDEN, CryptProtectData, CryptUnprotectData,
    };

    fn blob(data: &[u8]) -> CRYPT_INTEGER_BLOB {
        CRYPT_INTEGER_BLOB {
            cbData: data.len() as u32,
            pbData: data.as_ptr() as *mut u8,
        }
    }

    /// Copy a DPAPI-allocated output blob and release it
    unsafe fn take(out: CRYPT_INTEGER_BLOB) -> Vec<u8> {
        if out.pbData.is_null() {
            return Vec::new();
        }
        let bytes = unsafe { std::slice::from_raw_parts(out.pbData, out.cbData as usize) }.to_vec();
        unsafe { LocalFree(out.pbData as _) };
        bytes
    }

    pub fn protect(data: &[u8], entropy: &[u8]) -> Option<Vec<u8>> {
        let input = blob(data);
        let entropy = blob(entropy);
        let mut out = CRYPT_INTEGER_BLOB {
            cbData: 0,
            pbData: ptr::null_mut(),
        };
        let ok = unsafe {
            CryptProtectData(
                &input,
                ptr::null(),
                &entropy,
                ptr::null(),
                ptr::null(),
                CRYPTPROTECT_UI_FORBIDDEN,
                &mut out,
            )
        };
        if ok == 0 {
            return None;
        }
        Some(unsafe { take(out) })
    }

    pub fn unprotect(data: &[u8], entropy: &[u8]) -> Option<Vec<u8>> {
        let input = blob(data);
        let entropy = blob(entropy);
        let mut out = CRYPT_INTEGER_BLOB {
            cbData: 0,
            pbData: ptr::null_mut(),
        };
        let ok = unsafe {
            CryptUnprotectData(
                &input,
                ptr::null_mut(),
                &entropy,
                ptr::null(),
                ptr::null(),
                CRYPTPROTECT_UI_FORBIDDEN,
                &mut out,
            )
        };
        if ok == 0 {
            return None;
        }
        Some(unsafe { take(out) })
    }
}

#[cfg(windows)]
impl SecretSealer for DpapiSealer {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        dpapi::protect(plaintext, SEAL_ENTROPY)
            .ok_or_else(|| SealError::SealFailed(std::io::Error::last_os_error().to_string()))
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        dpapi::unprotect(sealed, SEAL_ENTROPY)
            .ok_or_else(|| SealError::UnsealFailed(std::io::Error::last_os_error().to_string()))
    }

    fn name(&self) -> &'static str {
        "dpapi"
    }
}

/// The best sealer this platform offers
#[cfg(windows)]
pub fn default_sealer() -> Box<dyn SecretSealer> {
    Box::new(DpapiSealer)
}

/// The best sealer this platform offers
#[cfg(not(windows))]
pub fn default_sealer() -> Box<dyn SecretSealer> {
    Box::new(PlaintextSealer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_sealer_is_identity() {
        let sealer = PlaintextSealer;
        let sealed = sealer.seal(b"key-bytes").unwrap();
        assert_eq!(sealed, b"key-bytes");
        assert_eq!(sealer.unseal(&sealed).unwrap(), b"key-bytes");
    }

    #[test]
    fn test_default_sealer_round_trip() {
        let sealer = default_sealer();
        let sealed = sealer.seal(&[7u8; 32]).unwrap();
        assert_eq!(sealer.unseal(&sealed).unwrap(), vec![7u8; 32]);
    }

    #[cfg(windows)]
    #[test]
    fn test_dpapi_rejects_garbage() {
        let err = DpapiSealer.unseal(b"not a dpapi blob").unwrap_err();
        assert!(matches!(err, SealError::UnsealFailed(_)));
    }
}
