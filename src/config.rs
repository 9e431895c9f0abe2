//! Database configuration and storage location resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default table name.
pub const DEFAULT_NAME: &str = "sql";

/// Default data directory, relative to the working directory. A missing
/// directory is created automatically only when its path ends with this text.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default database file inside the data directory.
pub const DEFAULT_FILE_NAME: &str = "simpledb.sqlite";

/// Database configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Table holding this database's records.
    pub name: String,

    /// Directory for the database file. Relative paths resolve against the
    /// current working directory.
    pub data_dir: PathBuf,

    /// File name inside `data_dir`.
    pub file_name: String,

    /// Run every read-modify-write operation inside one `BEGIN IMMEDIATE`
    /// transaction. With this off, two writers racing on the same key can
    /// lose an update, and a failure between the delete and the insert of a
    /// rewrite leaves the key absent.
    pub transactional: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            file_name: DEFAULT_FILE_NAME.to_string(),
            transactional: true,
        }
    }
}

impl DatabaseConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }
}

/// Where the records actually live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageMode {
    /// On-disk database file.
    File(PathBuf),
    /// Transient in-memory database, gone when the handle is dropped.
    Memory,
}

impl StorageMode {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageMode::Memory)
    }
}

/// Non-fatal problem found while opening; the database fell back to memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitWarning {
    pub data_dir: PathBuf,
    pub detail: String,
}

impl fmt::Display for InitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot open {}: {}", self.data_dir.display(), self.detail)
    }
}

/// Decide where `config` stores its data, creating the default directory
/// when it is missing.
pub(crate) fn resolve_storage(config: &DatabaseConfig) -> (StorageMode, Option<InitWarning>) {
    let data_dir = match std::env::current_dir() {
        Ok(cwd) => cwd.join(&config.data_dir),
        Err(_) => config.data_dir.clone(),
    };

    let mut detail = "data directory is unavailable, using in-memory storage".to_string();
    if !data_dir.exists() && is_default_dir(&data_dir) {
        if let Err(e) = fs::create_dir_all(&data_dir) {
            detail = format!("failed to create data directory: {e}");
        }
    }

    if data_dir.is_dir() {
        return (StorageMode::File(data_dir.join(&config.file_name)), None);
    }

    let warning = InitWarning { data_dir, detail };
    tracing::warn!(warning = %warning, "falling back to transient storage");
    (StorageMode::Memory, Some(warning))
}

/// Any directory whose path ends in `data` counts, so `./mydata` is created too.
fn is_default_dir(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().ends_with(DEFAULT_DATA_DIR)
}
