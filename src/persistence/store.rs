//! Save store: locate, read, verify, validate and migrate save files
//!
//! `load` walks LOCATE -> READ -> DETECT -> DECODE -> VERIFY -> VALIDATE and
//! either rejects or accepts. An accepted save that is not already a current
//! envelope signed with the current key at the current path is re-saved before
//! `load` returns. That write-back happens at most once per call, and a failed
//! write-back still returns the payload.

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};

use super::codec::{encode_for_storage, try_decode_from_storage};
use super::envelope::{CurrentEnvelope, Envelope, EnvelopeFormat};
use super::error::PersistenceError;
use super::integrity::{IntegrityGuard, KeyMatch};
use super::keystore::{KeyProvider, KeyStore, SecretKey};
use super::payload::SavePayload;
use super::validation::validate;
use crate::consts::LEGACY_SIGNING_KEY;
use crate::platform::fs::{remove_if_exists, write_atomic};
use crate::settings::StorageSettings;

/// Where a save file was found, in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveLocation {
    Current,
    LegacyUser,
    LegacyWorkingDir,
}

impl SaveLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveLocation::Current => "current",
            SaveLocation::LegacyUser => "legacy per-user",
            SaveLocation::LegacyWorkingDir => "legacy working-directory",
        }
    }
}

/// An accepted save and how it was found
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSave {
    pub payload: SavePayload,
    pub location: SaveLocation,
    pub path: PathBuf,
    pub format: EnvelopeFormat,
    /// `None` for unsigned legacy saves
    pub key_match: Option<KeyMatch>,
    /// Re-saved under the current scheme during this load
    pub migrated: bool,
}

/// Save file orchestrator
pub struct SaveStore<K: KeyProvider = KeyStore> {
    settings: StorageSettings,
    keys: K,
}

impl SaveStore<KeyStore> {
    /// Store backed by the installation key
    pub fn open(settings: StorageSettings) -> Self {
        let keys = KeyStore::new(&settings);
        Self::new(settings, keys)
    }
}

impl<K: KeyProvider> SaveStore<K> {
    pub fn new(settings: StorageSettings, keys: K) -> Self {
        Self { settings, keys }
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    /// Write `payload` as a current envelope. Failures are logged, not raised.
    pub fn save(&self, payload: SavePayload) -> bool {
        match self.try_save(&payload) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Save failed, progress not saved this checkpoint: {}", e);
                false
            }
        }
    }

    pub fn try_save(&self, payload: &SavePayload) -> Result<(), PersistenceError> {
        let mapping = payload
            .to_mapping()
            .map_err(|e| PersistenceError::Encode(e.to_string()))?;
        let blob = encode_for_storage(&mapping).map_err(|e| PersistenceError::Encode(e.to_string()))?;
        let signature = self
            .guard()?
            .sign(&mapping)
            .map_err(|e| PersistenceError::Encode(e.to_string()))?;
        let bytes = CurrentEnvelope::new(blob, signature)
            .to_bytes()
            .map_err(|e| PersistenceError::Encode(e.to_string()))?;

        let path = self.settings.save_path();
        write_atomic(&path, &bytes).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("Game saved (day {}, {})", payload.day, payload.time_phase.as_str());
        Ok(())
    }

    /// The saved payload, or `None` on first run or when the save is rejected
    pub fn load(&self) -> Option<SavePayload> {
        match self.try_load() {
            Ok(loaded) => loaded.map(|l| l.payload),
            Err(e @ PersistenceError::Integrity(_)) => {
                log::error!("Save rejected: {}", e);
                None
            }
            Err(e) => {
                log::warn!("Save rejected: {}", e);
                None
            }
        }
    }

    /// Like [`load`](Self::load), reporting why a save was rejected
    pub fn try_load(&self) -> Result<Option<LoadedSave>, PersistenceError> {
        let Some((location, path)) = self.locate() else {
            log::info!("No save file found, first run");
            return Ok(None);
        };
        log::debug!("Reading {} save at {}", location.as_str(), path.display());

        let bytes = fs::read(&path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Decode(e.to_string()))?;
        let envelope = Envelope::detect(value).map_err(|e| PersistenceError::Decode(e.to_string()))?;
        let format = envelope.format();
        log::debug!("Save format: {}", format.as_str());

        let (mapping, key_match) = match envelope {
            Envelope::Current { blob, signature } => {
                let mapping =
                    try_decode_from_storage(&blob).map_err(|e| PersistenceError::Decode(e.to_string()))?;
                let matched = self.verify(&mapping, &signature, format)?;
                (mapping, Some(matched))
            }
            Envelope::LegacySigned { payload, signature } => {
                let matched = self.verify(&payload, &signature, format)?;
                (payload, Some(matched))
            }
            Envelope::Unsigned { payload } => {
                // The current path has only ever held signed envelopes
                if location == SaveLocation::Current || !self.settings.trust_unsigned_legacy {
                    return Err(PersistenceError::Integrity(format.as_str()));
                }
                log::warn!("Accepting unsigned legacy save at {}", path.display());
                (payload, None)
            }
        };

        let payload = validate(mapping)?;

        let up_to_date = format == EnvelopeFormat::Current
            && key_match == Some(KeyMatch::Current)
            && location == SaveLocation::Current;
        let migrated = !up_to_date && self.migrate(&payload, location, format);

        Ok(Some(LoadedSave {
            payload,
            location,
            path,
            format,
            key_match,
            migrated,
        }))
    }

    /// Remove the current save and every legacy location. Missing files are fine.
    pub fn reset_save(&self) -> bool {
        let mut ok = true;
        for (location, path) in self.candidates() {
            match remove_if_exists(&path) {
                Ok(true) => log::info!("Removed {} save at {}", location.as_str(), path.display()),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Could not remove {}: {}", path.display(), e);
                    ok = false;
                }
            }
        }
        ok
    }

    /// True when no save exists at any known location
    pub fn is_first_run(&self) -> bool {
        self.locate().is_none()
    }

    fn candidates(&self) -> [(SaveLocation, PathBuf); 3] {
        [
            (SaveLocation::Current, self.settings.save_path()),
            (SaveLocation::LegacyUser, self.settings.legacy_save_path()),
            (SaveLocation::LegacyWorkingDir, self.settings.legacy_working_dir_path()),
        ]
    }

    /// First existing save; later locations are never consulted once one exists
    fn locate(&self) -> Option<(SaveLocation, PathBuf)> {
        self.candidates().into_iter().find(|(_, path)| path.is_file())
    }

    fn guard(&self) -> Result<IntegrityGuard, PersistenceError> {
        let current = self.keys.signing_key()?;
        Ok(IntegrityGuard::new(current).with_legacy(SecretKey::from_bytes(LEGACY_SIGNING_KEY)))
    }

    fn verify(
        &self,
        mapping: &Map<String, Value>,
        signature: &str,
        format: EnvelopeFormat,
    ) -> Result<KeyMatch, PersistenceError> {
        self.guard()?
            .verify(mapping, signature)
            .ok_or(PersistenceError::Integrity(format.as_str()))
    }

    fn migrate(&self, payload: &SavePayload, from: SaveLocation, format: EnvelopeFormat) -> bool {
        match self.try_save(payload) {
            Ok(()) => {
                log::info!(
                    "Migrated {} save ({}) to the current format",
                    from.as_str(),
                    format.as_str()
                );
                true
            }
            Err(e) => {
                log::warn!("Loaded save could not be migrated: {}", e);
                false
            }
        }
    }
}
