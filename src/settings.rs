//! Storage settings
//!
//! Where the save store looks for files and how much it trusts old ones.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Locations and policy for the save store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Per-user application data directory (holds the current save and the key)
    pub app_dir: PathBuf,

    // === Save files ===
    /// Current versioned save, relative to `app_dir`
    pub save_file: String,
    /// Legacy per-user JSON save, relative to `app_dir`
    pub legacy_save_file: String,
    /// Legacy save in the working directory (relative paths resolve against the cwd)
    pub legacy_working_dir_file: PathBuf,

    // === Signing key ===
    /// Sealed key file, relative to `app_dir`
    pub key_file: String,
    /// Environment variable that overrides the key file (`None` disables the override)
    pub key_env_var: Option<String>,

    // === Policy ===
    /// Accept saves that carry no signature at all (the oldest format)
    pub trust_unsigned_legacy: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            app_dir: default_app_dir(),

            save_file: SAVE_FILE_NAME.to_string(),
            legacy_save_file: LEGACY_SAVE_FILE_NAME.to_string(),
            legacy_working_dir_file: PathBuf::from(LEGACY_WORKING_DIR_SAVE),

            key_file: KEY_FILE_NAME.to_string(),
            key_env_var: Some(KEY_ENV_VAR.to_string()),

            trust_unsigned_legacy: true,
        }
    }
}

impl StorageSettings {
    /// Settings resolved from the process environment
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Settings with every location (including the legacy working-directory
    /// save) under `root`, and no environment override.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            app_dir: root.join(APP_DIR_NAME),
            legacy_working_dir_file: root.join(LEGACY_WORKING_DIR_SAVE),
            key_env_var: None,
            ..Self::default()
        }
    }

    /// Current versioned save path
    pub fn save_path(&self) -> PathBuf {
        self.app_dir.join(&self.save_file)
    }

    /// Legacy per-user save path
    pub fn legacy_save_path(&self) -> PathBuf {
        self.app_dir.join(&self.legacy_save_file)
    }

    /// Legacy working-directory save path
    pub fn legacy_working_dir_path(&self) -> PathBuf {
        self.legacy_working_dir_file.clone()
    }

    /// Sealed key path
    pub fn key_path(&self) -> PathBuf {
        self.app_dir.join(&self.key_file)
    }
}

/// `$APPDATA/growing-cat`, falling back to the home directory when unset
fn default_app_dir() -> PathBuf {
    let root = std::env::var_os("APPDATA")
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var_os("HOME").filter(|v| !v.is_empty()))
        .or_else(|| std::env::var_os("USERPROFILE").filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    root.join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_paths() {
        let settings = StorageSettings::rooted_at("/tmp/cat");
        assert_eq!(settings.save_path(), Path::new("/tmp/cat/growing-cat/save_v2.json"));
        assert_eq!(settings.legacy_save_path(), Path::new("/tmp/cat/growing-cat/save.json"));
        assert_eq!(settings.legacy_working_dir_path(), Path::new("/tmp/cat/save.json"));
        assert_eq!(settings.key_path(), Path::new("/tmp/cat/growing-cat/save_hmac_key.bin"));
        assert!(settings.key_env_var.is_none());
        assert!(settings.trust_unsigned_legacy);
    }

    #[test]
    fn test_default_uses_app_dir_name() {
        let settings = StorageSettings::default();
        assert!(settings.app_dir.ends_with(APP_DIR_NAME));
        assert_eq!(settings.key_env_var.as_deref(), Some(KEY_ENV_VAR));
        assert_eq!(settings.legacy_working_dir_path(), PathBuf::from("save.json"));
    }

    #[test]
    fn test_settings_serde() {
        let settings = StorageSettings::rooted_at("/srv/cat");
        let json = serde_json::to_string(&settings).unwrap();
        let back: StorageSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }
}
