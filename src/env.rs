//! Environment constants and path utilities for quizflow.
//!
//! This module centralizes the well-known directory names, file names and
//! storage keys so the store, the config discovery and the CLI agree on them.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git)
pub const APP_DIR_NAME: &str = ".quizflow";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "quizflow.toml";

/// Storage names for the persisted session record
pub mod storage {
    /// Well-known key of the single session record
    pub const SESSION_KEY: &str = "quizflow.session";

    /// Session record file name
    pub const SESSION_FILE_NAME: &str = "session.json";

    /// Checksum sidecar for the session record
    pub const CHECKSUM_FILE_NAME: &str = "session.checksum";

    /// Legacy quick-lookup record that only held `{currentStep}`
    pub const LEGACY_STEP_FILE_NAME: &str = "step.json";

    /// Scratch directory for atomic writes
    pub const TEMP_DIR_NAME: &str = "tmp";

    /// Prefix of quarantined corrupt records
    pub const CORRUPT_PREFIX: &str = "session.corrupt-";
}

/// Test-related constants
pub mod test {
    /// Participant name used across tests
    pub const TEST_PARTICIPANT: &str = "Ana";

    /// Participant age used across tests
    pub const TEST_AGE: u32 = 29;
}

/// Build the application directory path from a workspace root
pub fn app_dir_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(APP_DIR_NAME)
}

/// Build the session record file path inside a state directory
pub fn session_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join(storage::SESSION_FILE_NAME)
}

/// Build the checksum sidecar path inside a state directory
pub fn checksum_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join(storage::CHECKSUM_FILE_NAME)
}

/// Build the legacy step file path inside a state directory
pub fn legacy_step_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join(storage::LEGACY_STEP_FILE_NAME)
}

/// Build the scratch directory path inside a state directory
pub fn temp_dir_path(state_dir: &Path) -> PathBuf {
    state_dir.join(storage::TEMP_DIR_NAME)
}

/// Build the quarantine path for a corrupt record
pub fn corrupt_file_path(state_dir: &Path, stamp: &str) -> PathBuf {
    state_dir.join(format!("{}{}.json", storage::CORRUPT_PREFIX, stamp))
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(APP_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(CONFIG_FILE_NAME)
}
