//! Failure taxonomy at the save store boundary

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::keystore::KeyStoreError;
use super::validation::SchemaError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o failure on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("decode failure: {0}")]
    Decode(String),
    #[error("encode failure: {0}")]
    Encode(String),
    #[error("integrity failure: {0} save matches no known key")]
    Integrity(&'static str),
    #[error("schema failure: {0}")]
    Schema(#[from] SchemaError),
    #[error("signing key unavailable: {0}")]
    Key(#[from] KeyStoreError),
}

impl PersistenceError {
    /// Message suitable for showing the player
    pub fn user_message(&self) -> &'static str {
        match self {
            PersistenceError::Integrity(_) => {
                "The save file appears to have been modified or corrupted. Starting a new game."
            }
            PersistenceError::Decode(_) | PersistenceError::Schema(_) => {
                "The save file could not be read. Starting a new game."
            }
            PersistenceError::Io { .. } | PersistenceError::Encode(_) | PersistenceError::Key(_) => {
                "Saved progress is unavailable right now."
            }
        }
    }
}
