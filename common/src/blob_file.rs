//! A thin file-backed page allocator sitting between the buffer pool
//! manager and [`DiskManager`].

use std::io;
use std::path::Path;

use crate::disk_manager::DiskManager;
use crate::page::{PageId, INVALID_PAGE_ID};

/// Whether a blob file already exists at `path`.
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// A single page-addressable file backing one index or heap relation.
///
/// Distinct from [`DiskManager`] only in naming the construction intent
/// (`open` vs `create`) that callers use to decide whether to bulk-load a
/// fresh index or attach to an existing one; the I/O itself is delegated.
#[derive(Debug)]
pub struct BlobFile {
    disk_manager: DiskManager,
}

impl BlobFile {
    /// Opens an existing blob file, or creates one if `path` does not exist.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            disk_manager: DiskManager::open(path)?,
        })
    }

    /// Creates a brand-new blob file. Equivalent to [`BlobFile::open`]; kept
    /// as a distinct name so callers can express creation intent.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open(path)
    }

    /// The page id reserved for the first real page (the metadata page).
    /// Page id 0 is `INVALID_PAGE_ID` and is never allocated.
    pub fn first_page_no(&self) -> PageId {
        INVALID_PAGE_ID + 1
    }

    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> io::Result<()> {
        self.disk_manager.read_page(page_id, data)
    }

    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> io::Result<()> {
        self.disk_manager.write_page(page_id, data)
    }

    pub fn allocate_page(&self) -> PageId {
        self.disk_manager.allocate_page()
    }

    pub fn next_page_id(&self) -> PageId {
        self.disk_manager.next_page_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn first_page_no_skips_the_reserved_page() {
        let file = NamedTempFile::new().unwrap();
        let blob = BlobFile::open(file.path()).unwrap();
        assert_eq!(blob.first_page_no(), 1);
    }

    #[test]
    fn exists_reports_presence_on_the_filesystem() {
        let file = NamedTempFile::new().unwrap();
        assert!(exists(file.path()));
        assert!(!exists(file.path().with_extension("missing")));
    }
}
