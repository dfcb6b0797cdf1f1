//! Positioned-I/O disk manager backing a single blob file.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Mutex;

use tracing::trace;

use crate::page::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Manages reading and writing fixed-size pages to a single file on disk.
///
/// Uses positioned I/O (`read_at`/`write_at`) so reads and writes never need
/// to share a cursor, and only the page-id counter needs a lock.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    next_page_id: Mutex<PageId>,
}

impl DiskManager {
    /// Opens (creating if necessary) the backing file.
    ///
    /// Page id 0 is never handed out: `INVALID_PAGE_ID == 0`, and the
    /// metadata page must land on page id 1, so allocation starts at 1 for a
    /// brand-new file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();
        let existing_pages = (len / PAGE_SIZE as u64) as PageId;
        let next_page_id = existing_pages.max(INVALID_PAGE_ID + 1);
        Ok(Self {
            file,
            next_page_id: Mutex::new(next_page_id),
        })
    }

    /// Reads a page into `data`, which must be exactly `PAGE_SIZE` bytes.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> io::Result<()> {
        let offset = (page_id * PAGE_SIZE) as u64;
        trace!(page_id, offset, "disk read");
        self.file.read_exact_at(data, offset)
    }

    /// Writes a full page from `data`, which must be exactly `PAGE_SIZE` bytes.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> io::Result<()> {
        let offset = (page_id * PAGE_SIZE) as u64;
        trace!(page_id, offset, "disk write");
        self.file.write_all_at(data, offset)
    }

    /// Allocates and returns the next unused page id.
    pub fn allocate_page(&self) -> PageId {
        let mut next = self.next_page_id.lock().unwrap();
        let page_id = *next;
        *next += 1;
        page_id
    }

    /// The page id that the next call to `allocate_page` would return.
    pub fn next_page_id(&self) -> PageId {
        *self.next_page_id.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn allocation_skips_the_reserved_page_zero() {
        let file = NamedTempFile::new().unwrap();
        let dm = DiskManager::open(file.path()).unwrap();
        assert_eq!(dm.allocate_page(), 1);
        assert_eq!(dm.allocate_page(), 2);
    }

    #[test]
    fn round_trips_a_page() {
        let file = NamedTempFile::new().unwrap();
        let dm = DiskManager::open(file.path()).unwrap();
        let page_id = dm.allocate_page();

        let mut data = [0u8; PAGE_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        dm.write_page(page_id, &data).unwrap();

        let mut read_back = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_back).unwrap();
        assert_eq!(data, read_back);
    }

    #[test]
    fn reopening_resumes_allocation_after_existing_pages() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        {
            let dm = DiskManager::open(&path).unwrap();
            dm.write_page(dm.allocate_page(), &[0u8; PAGE_SIZE]).unwrap();
            dm.write_page(dm.allocate_page(), &[0u8; PAGE_SIZE]).unwrap();
        }
        let dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.next_page_id(), 3);
    }
}
