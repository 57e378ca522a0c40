use common::{DbError, DbResult, Module, Offset};
use hashbrown::HashMap;
use tracing::trace;

use crate::{PageStore, check_alignment, check_buffer, check_page_size, closed_error};

/// Volatile page store backed by an offset-to-page map.
#[derive(Debug)]
pub struct MemoryPageStore {
    page_size: usize,
    pages: HashMap<Offset, Vec<u8>>,
    closed: bool,
}

impl MemoryPageStore {
    pub fn new(page_size: usize) -> DbResult<Self> {
        check_page_size(page_size)?;
        Ok(Self {
            page_size,
            pages: HashMap::new(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed {
            return Err(closed_error());
        }
        Ok(())
    }

    fn ensure_assigned(&self, offset: Offset) -> DbResult<()> {
        check_alignment(offset, self.page_size)?;
        if !self.pages.contains_key(&offset) {
            return Err(DbError::input(
                Module::Storage,
                format!("no page assigned at offset {offset}"),
            ));
        }
        Ok(())
    }
}

impl PageStore for MemoryPageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn reader(&self, offset: Offset) -> DbResult<Vec<u8>> {
        self.ensure_open()?;
        self.ensure_assigned(offset)?;
        trace!(offset, "memory page read");
        self.pages
            .get(&offset)
            .cloned()
            .ok_or_else(|| DbError::logic(Module::Storage, format!("page {offset} vanished")))
    }

    fn writer(&mut self, offset: Offset, data: &[u8]) -> DbResult<()> {
        self.ensure_open()?;
        check_buffer(data, self.page_size)?;
        self.ensure_assigned(offset)?;
        trace!(offset, "memory page write");
        if let Some(page) = self.pages.get_mut(&offset) {
            page.copy_from_slice(data);
        }
        Ok(())
    }

    fn delete(&mut self, offset: Offset) -> DbResult<()> {
        self.ensure_open()?;
        self.ensure_assigned(offset)?;
        if let Some(page) = self.pages.get_mut(&offset) {
            page.fill(0);
        }
        Ok(())
    }

    /// Linear scan for the first unused multiple of the page size.
    fn assign_empty_page(&mut self) -> DbResult<Offset> {
        self.ensure_open()?;
        let step = self.page_size as Offset;
        let mut offset: Offset = 0;
        while self.pages.contains_key(&offset) {
            offset += step;
        }
        self.pages.insert(offset, vec![0u8; self.page_size]);
        trace!(offset, "memory page assigned");
        Ok(offset)
    }

    fn page_count(&self) -> DbResult<u64> {
        self.ensure_open()?;
        Ok(self.pages.len() as u64)
    }

    fn sync(&mut self) -> DbResult<()> {
        self.ensure_open()
    }

    fn close(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.pages.clear();
        self.closed = true;
        Ok(())
    }
}
