//! Growing Cat - save storage for an offline pet game
//!
//! Core modules:
//! - `persistence`: Save/load with integrity verification and format migration
//! - `platform`: OS abstraction (secret sealing, private/atomic file writes)
//! - `settings`: Storage locations and policy
//!
//! Rendering, minigames and the pet simulation live outside this crate; they
//! hand a [`SavePayload`] to the [`SaveStore`] at checkpoints and get one back
//! at startup.

pub mod persistence;
pub mod platform;
pub mod settings;

pub use persistence::{
    CatSnapshot, EvolutionStage, KeyProvider, KeyStore, LoadedSave, PersistenceError,
    SavePayload, SaveStore, TimePhase,
};
pub use settings::StorageSettings;

/// Storage configuration constants
pub mod consts {
    /// Envelope version written by every save
    pub const CURRENT_ENVELOPE_VERSION: u64 = 2;

    /// Length of a freshly generated signing key, in bytes
    pub const KEY_LEN: usize = 32;

    /// Auxiliary context binding sealed key blobs to this application
    pub const SEAL_ENTROPY: &[u8] = b"growing-cat.save.hmac.v1";

    /// Fixed key the first signed releases used for every install.
    /// Only ever used to verify, never to sign.
    pub const LEGACY_SIGNING_KEY: &[u8] = b"growing-cat-save-signing-key-v1";

    /// Application directory name under the per-user data root
    pub const APP_DIR_NAME: &str = "growing-cat";
    /// Current (versioned) save file
    pub const SAVE_FILE_NAME: &str = "save_v2.json";
    /// Legacy per-user JSON save
    pub const LEGACY_SAVE_FILE_NAME: &str = "save.json";
    /// Legacy save written next to the executable's working directory
    pub const LEGACY_WORKING_DIR_SAVE: &str = "save.json";
    /// Sealed signing key
    pub const KEY_FILE_NAME: &str = "save_hmac_key.bin";

    /// Environment variable overriding the on-disk signing key
    pub const KEY_ENV_VAR: &str = "GROWING_CAT_SAVE_KEY";

    /// Stat bounds for the cat snapshot
    pub const MIN_STAT: u8 = 0;
    pub const MAX_STAT: u8 = 100;
}
