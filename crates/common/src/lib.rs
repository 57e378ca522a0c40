
pub mod logging;
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{fmt, fs, io, path::Path, path::PathBuf};
use thiserror::Error;

/// Byte position of a page inside a page store.
/// Examples:
/// - `let meta: Offset = 0;`
/// - `let third_page: Offset = 2 * 4096;`
/// - `let missing: Offset = NULL_OFFSET;`
pub type Offset = i64;

/// Reserved offset meaning "no page".
pub const NULL_OFFSET: Offset = -1;

/// Smallest page size a store will accept.
pub const MIN_PAGE_SIZE: usize = 64;

/// Largest page size a store will accept (1 MiB).
pub const MAX_PAGE_SIZE: usize = 1 << 20;

/// Subsystem that raised an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Module {
    Codec,
    Storage,
    Node,
    BTree,
    Config,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::Codec => "codec",
            Module::Storage => "storage",
            Module::Node => "node",
            Module::BTree => "btree",
            Module::Config => "config",
        };
        f.write_str(name)
    }
}

/// Coarse routing class for logging and alerting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    System,
    Input,
    Type,
    Io,
    Config,
}

/// Canonical error type shared across the engine.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("{module}: invalid input: {message}")]
    Input { module: Module, message: String },
    #[error("{module}: type error: {message}")]
    Type { module: Module, message: String },
    #[error("{module}: config: {message}")]
    Config { module: Module, message: String },
    #[error("{module}: corrupted page: {message}")]
    Corruption { module: Module, message: String },
    #[error("{module}: {message}")]
    Logic { module: Module, message: String },
    #[error("{module}: io: {source}")]
    Io {
        module: Module,
        #[source]
        source: io::Error,
    },
}

impl DbError {
    pub fn input(module: Module, message: impl Into<String>) -> Self {
        Self::Input {
            module,
            message: message.into(),
        }
    }

    pub fn type_error(module: Module, message: impl Into<String>) -> Self {
        Self::Type {
            module,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            module: Module::Config,
            message: message.into(),
        }
    }

    pub fn corruption(module: Module, message: impl Into<String>) -> Self {
        Self::Corruption {
            module,
            message: message.into(),
        }
    }

    pub fn logic(module: Module, message: impl Into<String>) -> Self {
        Self::Logic {
            module,
            message: message.into(),
        }
    }

    pub fn io(module: Module, source: io::Error) -> Self {
        Self::Io { module, source }
    }

    /// The subsystem that produced this error.
    pub fn module(&self) -> Module {
        match self {
            Self::Input { module, .. }
            | Self::Type { module, .. }
            | Self::Config { module, .. }
            | Self::Corruption { module, .. }
            | Self::Logic { module, .. }
            | Self::Io { module, .. } => *module,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Input { .. } => ErrorCategory::Input,
            Self::Type { .. } => ErrorCategory::Type,
            Self::Config { .. } => ErrorCategory::Config,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Corruption { .. } | Self::Logic { .. } => ErrorCategory::System,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}

impl From<io::Error> for DbError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            module: Module::Storage,
            source,
        }
    }
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Which page store backend to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Volatile offset-to-page map, lost on drop.
    Memory,
    /// One file, pages addressed by byte position.
    #[default]
    File,
}

/// Runtime configuration for the storage engine.
///
/// # Example
/// ```
/// use common::{Config, StorageMode};
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .page_size(8192)
///     .storage(StorageMode::Memory)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct Config {
    /// Directory holding the index file.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed page size in bytes; every node occupies exactly one page.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Backend used for page storage.
    #[builder(default)]
    pub storage: StorageMode,
    /// File name of the index inside `data_dir`.
    #[builder(default = String::from("index.db"))]
    pub index_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            page_size: 4096,
            storage: StorageMode::File,
            index_file: String::from("index.db"),
        }
    }
}

impl Config {
    /// Load a JSON config file, returning defaults if the file does not exist.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|e| DbError::io(Module::Config, e))?;
        let config: Config = serde_json::from_str(&data)
            .map_err(|err| DbError::config(format!("invalid config file: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the config as pretty JSON.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::config(format!("serialize failed: {err}")))?;
        fs::write(path, data).map_err(|e| DbError::io(Module::Config, e))?;
        Ok(())
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err(DbError::config(format!(
                "page size {} outside [{MIN_PAGE_SIZE}, {MAX_PAGE_SIZE}]",
                self.page_size
            )));
        }
        if self.storage == StorageMode::File && self.index_file.is_empty() {
            return Err(DbError::config("file storage needs an index file name"));
        }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }
}
