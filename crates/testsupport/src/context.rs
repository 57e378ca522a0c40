//! Isolated storage environments for tests.
//!
//! Each [`TestContext`] owns a temporary directory and a [`Config`] that
//! points into it. The directory is removed when the context is dropped.

use std::path::{Path, PathBuf};

use common::{Config, DbResult, StorageMode};
use storage::{FilePageStore, MemoryPageStore};
use tempfile::TempDir;

/// Page size used by [`TestContext::new`]. Small pages keep trees deep with
/// few keys.
pub const TEST_PAGE_SIZE: usize = 128;

/// A temporary data directory with a file-backed config.
pub struct TestContext {
    _temp_dir: TempDir,
    config: Config,
}

impl TestContext {
    /// Create a context using [`TEST_PAGE_SIZE`] pages.
    pub fn new() -> DbResult<Self> {
        Self::with_page_size(TEST_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> DbResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config = Config::builder()
            .data_dir(temp_dir.path().to_path_buf())
            .page_size(page_size)
            .storage(StorageMode::File)
            .build();
        config.validate()?;
        Ok(Self {
            _temp_dir: temp_dir,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Location of the index file inside the temporary directory.
    pub fn index_path(&self) -> PathBuf {
        self.config.index_path()
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Create (or truncate) the index file.
    pub fn create_file_store(&self) -> DbResult<FilePageStore> {
        FilePageStore::create(&self.index_path(), self.page_size())
    }

    /// Reopen the index file written by an earlier store.
    pub fn open_file_store(&self) -> DbResult<FilePageStore> {
        FilePageStore::open(&self.index_path(), self.page_size())
    }

    pub fn memory_store(&self) -> DbResult<MemoryPageStore> {
        MemoryPageStore::new(self.page_size())
    }
}
