use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use common::{DbError, DbResult, Module, Offset};
use tracing::{debug, trace};

use crate::{PageStore, check_alignment, check_buffer, check_page_size, closed_error};

/// Durable page store over a single file.
///
/// Offsets are byte positions. New pages are appended at the current file
/// length; deleted pages are zeroed in place and never handed out again.
#[derive(Debug)]
pub struct FilePageStore {
    path: PathBuf,
    page_size: usize,
    file: Option<File>,
    read_only: bool,
}

impl FilePageStore {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, page_size: usize) -> DbResult<Self> {
        check_page_size(page_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        debug!(path = %path.display(), page_size, "created page file");
        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            file: Some(file),
            read_only: false,
        })
    }

    /// Open an existing file; it must hold a whole number of pages.
    pub fn open(path: &Path, page_size: usize) -> DbResult<Self> {
        Self::open_with(path, page_size, false)
    }

    /// Open an existing file without write access. Every mutating call
    /// fails with a logic error.
    pub fn open_read_only(path: &Path, page_size: usize) -> DbResult<Self> {
        Self::open_with(path, page_size, true)
    }

    fn open_with(path: &Path, page_size: usize, read_only: bool) -> DbResult<Self> {
        check_page_size(page_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len % page_size as u64 != 0 {
            return Err(DbError::corruption(
                Module::Storage,
                format!(
                    "{} is {file_len} bytes, not a multiple of page size {page_size}",
                    path.display()
                ),
            ));
        }
        debug!(path = %path.display(), pages = file_len / page_size as u64, read_only, "opened page file");
        Ok(Self {
            path: path.to_path_buf(),
            page_size,
            file: Some(file),
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn handle(&self) -> DbResult<&File> {
        self.file.as_ref().ok_or_else(closed_error)
    }

    fn writable_handle(&self) -> DbResult<&File> {
        let file = self.handle()?;
        if self.read_only {
            return Err(DbError::logic(
                Module::Storage,
                format!("{} was opened read-only", self.path.display()),
            ));
        }
        Ok(file)
    }

    fn file_len(&self) -> DbResult<u64> {
        Ok(self.handle()?.metadata()?.len())
    }

    fn ensure_assigned(&self, offset: Offset) -> DbResult<()> {
        check_alignment(offset, self.page_size)?;
        let len = self.file_len()?;
        if offset as u64 >= len {
            return Err(DbError::input(
                Module::Storage,
                format!("offset {offset} is past the end of {} ({len} bytes)", self.path.display()),
            ));
        }
        Ok(())
    }
}

impl PageStore for FilePageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn reader(&self, offset: Offset) -> DbResult<Vec<u8>> {
        self.ensure_assigned(offset)?;
        let mut buffer = vec![0u8; self.page_size];
        pio::read_exact_at(self.handle()?, &mut buffer, offset as u64)?;
        trace!(offset, "file page read");
        Ok(buffer)
    }

    fn writer(&mut self, offset: Offset, data: &[u8]) -> DbResult<()> {
        check_buffer(data, self.page_size)?;
        self.ensure_assigned(offset)?;
        pio::write_all_at(self.writable_handle()?, data, offset as u64)?;
        trace!(offset, "file page write");
        Ok(())
    }

    fn delete(&mut self, offset: Offset) -> DbResult<()> {
        self.ensure_assigned(offset)?;
        let zeroes = vec![0u8; self.page_size];
        pio::write_all_at(self.writable_handle()?, &zeroes, offset as u64)?;
        Ok(())
    }

    fn assign_empty_page(&mut self) -> DbResult<Offset> {
        let file = self.writable_handle()?;
        let len = file.metadata()?.len();
        let zeroes = vec![0u8; self.page_size];
        pio::write_all_at(file, &zeroes, len)?;
        trace!(offset = len, "file page assigned");
        Ok(len as Offset)
    }

    fn page_count(&self) -> DbResult<u64> {
        Ok(self.file_len()? / self.page_size as u64)
    }

    fn sync(&mut self) -> DbResult<()> {
        let file = self.handle()?;
        if !self.read_only {
            file.sync_all()?;
        }
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        let file = self.file.take().ok_or_else(closed_error)?;
        if !self.read_only {
            file.sync_all()?;
        }
        debug!(path = %self.path.display(), "closed page file");
        Ok(())
    }
}

/// Positioned reads and writes that leave the shared cursor alone.
#[cfg(unix)]
mod pio {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub fn read_exact_at(file: &File, buf: &mut [u8], pos: u64) -> io::Result<()> {
        file.read_exact_at(buf, pos)
    }

    pub fn write_all_at(file: &File, buf: &[u8], pos: u64) -> io::Result<()> {
        file.write_all_at(buf, pos)
    }
}

#[cfg(windows)]
mod pio {
    use std::fs::File;
    use std::io;
    use std::os::windows::fs::FileExt;

    pub fn read_exact_at(file: &File, mut buf: &mut [u8], mut pos: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match file.seek_read(buf, pos)? {
                0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                n => {
                    buf = &mut buf[n..];
                    pos += n as u64;
                }
            }
        }
        Ok(())
    }

    pub fn write_all_at(file: &File, mut buf: &[u8], mut pos: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match file.seek_write(buf, pos)? {
                0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                n => {
                    buf = &buf[n..];
                    pos += n as u64;
                }
            }
        }
        Ok(())
    }
}
