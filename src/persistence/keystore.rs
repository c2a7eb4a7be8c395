//! Signing key lifecycle
//!
//! Lookup order: environment override, then the sealed key file. When neither
//! exists a fresh random key is generated, sealed and written owner-only.
//! The key never changes after creation; [`KeyStore`] caches it per process.

use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

use crate::consts::KEY_LEN;
use crate::platform::{SealError, SecretSealer, default_sealer, fs::write_private};
use crate::settings::StorageSettings;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("key file unreadable: {0}")]
    Read(io::Error),
    #[error("key file unwritable: {0}")]
    Write(io::Error),
    #[error(transparent)]
    Seal(#[from] SealError),
}

/// Symmetric signing key. Bytes are wiped on drop and never printed.
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Fresh key from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes>)", self.0.len())
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Source of the current signing key
pub trait KeyProvider {
    fn signing_key(&self) -> Result<SecretKey, KeyStoreError>;
}

/// A key supplied up front (tests, tools)
#[derive(Debug, Clone)]
pub struct FixedKey(SecretKey);

impl FixedKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(SecretKey::from_bytes(bytes))
    }
}

impl KeyProvider for FixedKey {
    fn signing_key(&self) -> Result<SecretKey, KeyStoreError> {
        Ok(self.0.clone())
    }
}

/// Installation key backed by a sealed file
pub struct KeyStore {
    key_path: PathBuf,
    env_var: Option<String>,
    sealer: Box<dyn SecretSealer>,
    cached: OnceCell<SecretKey>,
}

impl KeyStore {
    /// Key store using this platform's sealer
    pub fn new(settings: &StorageSettings) -> Self {
        Self::with_sealer(settings, default_sealer())
    }

    pub fn with_sealer(settings: &StorageSettings, sealer: Box<dyn SecretSealer>) -> Self {
        Self {
            key_path: settings.key_path(),
            env_var: settings.key_env_var.clone(),
            sealer,
            cached: OnceCell::new(),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Existing key, if any: the environment override wins over the key file.
    pub fn load_key(&self) -> Result<Option<SecretKey>, KeyStoreError> {
        if let Some(key) = self.env_key() {
            log::debug!("Using signing key from environment override");
            return Ok(Some(key));
        }

        let sealed = match fs::read(&self.key_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KeyStoreError::Read(e)),
        };
        let raw = self.sealer.unseal(&sealed)?;
        if raw.is_empty() {
            log::warn!("Key file {} is empty, ignoring it", self.key_path.display());
            return Ok(None);
        }
        Ok(Some(SecretKey::from_bytes(raw)))
    }

    /// Existing key, or a newly generated one persisted through the sealer
    pub fn get_or_create_key(&self) -> Result<SecretKey, KeyStoreError> {
        if let Some(key) = self.load_key()? {
            return Ok(key);
        }

        let key = SecretKey::generate();
        let sealed = self.sealer.seal(key.expose())?;
        write_private(&self.key_path, &sealed).map_err(KeyStoreError::Write)?;
        log::info!(
            "Created signing key at {} ({} sealer)",
            self.key_path.display(),
            self.sealer.name()
        );
        Ok(key)
    }

    /// Active key as standard base64, for recovery
    pub fn export_key_base64(&self) -> Result<String, KeyStoreError> {
        let key = self.signing_key()?;
        Ok(STANDARD.encode(key.expose()))
    }

    fn env_key(&self) -> Option<SecretKey> {
        let name = self.env_var.as_deref()?;
        let value = std::env::var(name).ok()?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(SecretKey::from_bytes(value.as_bytes()))
    }
}

impl KeyProvider for KeyStore {
    fn signing_key(&self) -> Result<SecretKey, KeyStoreError> {
        if let Some(key) = self.cached.get() {
            return Ok(key.clone());
        }
        let key = self.get_or_create_key()?;
        let _ = self.cached.set(key.clone());
        Ok(key)
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("key_path", &self.key_path)
            .field("env_var", &self.env_var)
            .field("sealer", &self.sealer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlaintextSealer;
    use tempfile::TempDir;

    /// Reverses bytes so a test can tell sealed from raw
    struct ReversingSealer;

    impl SecretSealer for ReversingSealer {
        fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
            Ok(plaintext.iter().rev().copied().collect())
        }

        fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
            Ok(sealed.iter().rev().copied().collect())
        }

        fn name(&self) -> &'static str {
            "reversing"
        }
    }

    struct BrokenSealer;

    impl SecretSealer for BrokenSealer {
        fn seal(&self, _: &[u8]) -> Result<Vec<u8>, SealError> {
            Err(SealError::SealFailed("no facility".to_string()))
        }

        fn unseal(&self, _: &[u8]) -> Result<Vec<u8>, SealError> {
            Err(SealError::UnsealFailed("wrong user".to_string()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn plaintext_store(settings: &StorageSettings) -> KeyStore {
        KeyStore::with_sealer(settings, Box::new(PlaintextSealer))
    }

    #[test]
    fn test_load_key_absent_on_fresh_install() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());
        let store = plaintext_store(&settings);
        assert!(store.load_key().unwrap().is_none());
        assert!(!settings.app_dir.exists());
    }

    #[test]
    fn test_get_or_create_persists_across_restarts() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());

        let first = plaintext_store(&settings).get_or_create_key().unwrap();
        assert_eq!(first.len(), KEY_LEN);
        assert!(settings.key_path().exists());

        // Simulated restart: a brand new store over the same directory
        let second = plaintext_store(&settings).get_or_create_key().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_key_file_is_sealed() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());
        let store = KeyStore::with_sealer(&settings, Box::new(ReversingSealer));

        let key = store.get_or_create_key().unwrap();
        let on_disk = fs::read(settings.key_path()).unwrap();
        let expected: Vec<u8> = key.expose().iter().rev().copied().collect();
        assert_eq!(on_disk, expected);
        assert_eq!(store.load_key().unwrap(), Some(key));
    }

    #[test]
    fn test_unseal_failure_is_distinct_error() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());
        write_private(&settings.key_path(), b"sealed-elsewhere").unwrap();

        let store = KeyStore::with_sealer(&settings, Box::new(BrokenSealer));
        let err = store.get_or_create_key().unwrap_err();
        assert!(matches!(err, KeyStoreError::Seal(SealError::UnsealFailed(_))));
        // The unreadable key must not be replaced
        assert_eq!(fs::read(settings.key_path()).unwrap(), b"sealed-elsewhere");
    }

    #[test]
    fn test_empty_key_file_is_regenerated() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());
        write_private(&settings.key_path(), b"").unwrap();

        let store = plaintext_store(&settings);
        assert!(store.load_key().unwrap().is_none());
        let key = store.get_or_create_key().unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(fs::read(settings.key_path()).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_env_override_wins() {
        let tmp = TempDir::new().unwrap();
        let var = "GROWING_CAT_KEYSTORE_TEST_OVERRIDE";
        let mut settings = StorageSettings::rooted_at(tmp.path());
        settings.key_env_var = Some(var.to_string());

        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var(var, "  ops-recovery-key \n") };
        let store = plaintext_store(&settings);
        let key = store.get_or_create_key().unwrap();
        unsafe { std::env::remove_var(var) };

        assert_eq!(key.expose(), b"ops-recovery-key");
        // The override is not persisted
        assert!(!settings.key_path().exists());
    }

    #[test]
    fn test_env_override_wins_over_existing_key_file() {
        let tmp = TempDir::new().unwrap();
        let var = "GROWING_CAT_KEYSTORE_TEST_OVERRIDE_FILE";
        let mut settings = StorageSettings::rooted_at(tmp.path());
        let file_key = plaintext_store(&settings).get_or_create_key().unwrap();
        let on_disk = fs::read(settings.key_path()).unwrap();

        settings.key_env_var = Some(var.to_string());
        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var(var, "ops-recovery-key") };
        let store = plaintext_store(&settings);
        let loaded = store.load_key();
        let created = store.get_or_create_key();
        unsafe { std::env::remove_var(var) };

        assert_eq!(loaded.unwrap().unwrap().expose(), b"ops-recovery-key");
        let created = created.unwrap();
        assert_eq!(created.expose(), b"ops-recovery-key");
        assert_ne!(created, file_key);
        assert_eq!(fs::read(settings.key_path()).unwrap(), on_disk);
    }

    #[test]
    fn test_signing_key_is_cached() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());
        let store = plaintext_store(&settings);

        let first = store.signing_key().unwrap();
        fs::remove_file(settings.key_path()).unwrap();
        let second = store.signing_key().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_key_base64() {
        let tmp = TempDir::new().unwrap();
        let settings = StorageSettings::rooted_at(tmp.path());
        let store = plaintext_store(&settings);

        let exported = store.export_key_base64().unwrap();
        let decoded = STANDARD.decode(exported).unwrap();
        assert_eq!(decoded, store.signing_key().unwrap().expose());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SecretKey::from_bytes(b"super-secret".to_vec());
        let printed = format!("{:?}", key);
        assert!(!printed.contains("super"));
        assert!(printed.contains("12 bytes"));
    }
}
