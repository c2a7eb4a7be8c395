//! Save/load persistence with integrity verification
//!
//! Features:
//! - Versioned JSON envelope with a zlib + base64 payload
//! - HMAC-SHA256 signature over the canonical payload
//! - Installation key sealed per user, with an environment override
//! - Legacy format detection and migration on load
//! - Atomic writes (tmp -> save)

pub mod codec;
pub mod envelope;
pub mod error;
pub mod integrity;
pub mod keystore;
pub mod payload;
pub mod store;
pub mod validation;

pub use envelope::{Envelope, EnvelopeFormat};
pub use error::PersistenceError;
pub use integrity::{IntegrityGuard, KeyMatch};
pub use keystore::{FixedKey, KeyProvider, KeyStore, KeyStoreError, SecretKey};
pub use payload::{CatSnapshot, EvolutionStage, SavePayload, TimePhase};
pub use store::{LoadedSave, SaveLocation, SaveStore};
pub use validation::SchemaError;
