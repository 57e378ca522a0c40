//! Fixed-size page storage addressed by byte offset.
//!
//! A [`PageStore`] hands out pages, reads and writes them whole, and zeroes
//! them on delete. Two backends share the contract:
//!
//! - [`MemoryPageStore`]: volatile offset-to-page map for tests and scratch trees
//! - [`FilePageStore`]: one file, offsets are byte positions, pages only appended
//!
//! Neither backend caches or synchronizes; callers serialize access.

mod file;
mod memory;

pub use file::FilePageStore;
pub use memory::MemoryPageStore;

use common::{Config, DbError, DbResult, Module, Offset, StorageMode};

/// Page allocation and whole-page I/O.
pub trait PageStore {
    /// Size in bytes of every page in this store.
    fn page_size(&self) -> usize;

    /// Read the page at `offset`.
    fn reader(&self, offset: Offset) -> DbResult<Vec<u8>>;

    /// Overwrite the page at `offset`; `data` must be exactly one page.
    fn writer(&mut self, offset: Offset, data: &[u8]) -> DbResult<()>;

    /// Zero the page at `offset`. The offset stays assigned.
    fn delete(&mut self, offset: Offset) -> DbResult<()>;

    /// Reserve a zeroed page and return its offset.
    fn assign_empty_page(&mut self) -> DbResult<Offset>;

    /// Number of pages assigned so far.
    fn page_count(&self) -> DbResult<u64>;

    /// Make previous writes durable.
    fn sync(&mut self) -> DbResult<()>;

    /// Release the backing resource. Later calls fail.
    fn close(&mut self) -> DbResult<()>;
}

impl<S: PageStore + ?Sized> PageStore for Box<S> {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn reader(&self, offset: Offset) -> DbResult<Vec<u8>> {
        (**self).reader(offset)
    }

    fn writer(&mut self, offset: Offset, data: &[u8]) -> DbResult<()> {
        (**self).writer(offset, data)
    }

    fn delete(&mut self, offset: Offset) -> DbResult<()> {
        (**self).delete(offset)
    }

    fn assign_empty_page(&mut self) -> DbResult<Offset> {
        (**self).assign_empty_page()
    }

    fn page_count(&self) -> DbResult<u64> {
        (**self).page_count()
    }

    fn sync(&mut self) -> DbResult<()> {
        (**self).sync()
    }

    fn close(&mut self) -> DbResult<()> {
        (**self).close()
    }
}

/// Open the backend selected by `config`.
///
/// File stores are opened if the index file exists and created otherwise.
pub fn open_page_store(config: &Config) -> DbResult<Box<dyn PageStore>> {
    config.validate()?;
    match config.storage {
        StorageMode::Memory => Ok(Box::new(MemoryPageStore::new(config.page_size)?)),
        StorageMode::File => {
            std::fs::create_dir_all(&config.data_dir)?;
            let path = config.index_path();
            let store = if path.exists() {
                FilePageStore::open(&path, config.page_size)?
            } else {
                FilePageStore::create(&path, config.page_size)?
            };
            Ok(Box::new(store))
        }
    }
}

fn check_page_size(page_size: usize) -> DbResult<()> {
    if page_size < common::MIN_PAGE_SIZE || page_size > common::MAX_PAGE_SIZE {
        return Err(DbError::input(
            Module::Storage,
            format!(
                "page size {page_size} outside [{}, {}]",
                common::MIN_PAGE_SIZE,
                common::MAX_PAGE_SIZE
            ),
        ));
    }
    Ok(())
}

/// Offsets must be non-negative and page aligned.
fn check_alignment(offset: Offset, page_size: usize) -> DbResult<()> {
    if offset < 0 || offset % page_size as i64 != 0 {
        return Err(DbError::input(
            Module::Storage,
            format!("offset {offset} is not aligned to page size {page_size}"),
        ));
    }
    Ok(())
}

fn check_buffer(data: &[u8], page_size: usize) -> DbResult<()> {
    if data.len() != page_size {
        return Err(DbError::input(
            Module::Storage,
            format!("page buffer is {} bytes, expected {page_size}", data.len()),
        ));
    }
    Ok(())
}

fn closed_error() -> DbError {
    DbError::logic(Module::Storage, "page store is closed")
}

#[cfg(test)]
mod tests;
