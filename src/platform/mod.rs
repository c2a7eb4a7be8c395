//! Platform abstraction layer
//!
//! Handles OS differences for:
//! - Secret sealing (DPAPI on Windows, permission-restricted plaintext elsewhere)
//! - Private and atomic file writes

pub mod fs;
pub mod sealer;

pub use sealer::{PlaintextSealer, SealError, SecretSealer, default_sealer};
#[cfg(windows)]
pub use sealer::DpapiSealer;
