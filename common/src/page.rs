//! Defines the common API for all buffer pool manager implementations.

use std::ops::{Deref, DerefMut};

use crate::error::BpmError;

/// A unique identifier for a page in the database.
pub type PageId = usize;

/// Sentinel for "no page". Page id 0 is never allocated so it can double as
/// this sentinel without colliding with a real page (the metadata page is
/// always page 1).
pub const INVALID_PAGE_ID: PageId = 0;

/// The size of a single page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// A smart pointer representing a pinned page.
///
/// This guard provides mutable access to the page's byte data. When the guard
/// is dropped, it informs the buffer pool manager that the page should be
/// unpinned, and whether the page is dirty (`DerefMut` was used).
pub trait PageGuard: Deref<Target = [u8]> + DerefMut {
    /// Returns the ID of the page being held.
    fn page_id(&self) -> PageId;
}

/// The main trait defining the behavior of a Buffer Pool Manager.
///
/// Object-safe so it can be shared behind `Arc<dyn BufferPoolManager>`. The
/// engine itself drives it from a single thread at a time (see the
/// concurrency model in the crate-level docs), but the trait still requires
/// `Sync` so an `Arc<dyn BufferPoolManager>` can be handed to a different
/// thread between uses without `unsafe`.
pub trait BufferPoolManager: Send + Sync {
    /// Fetches a page from the buffer pool, reading from disk if necessary.
    ///
    /// Pins the page; it stays pinned until the returned `PageGuard` is dropped.
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BpmError>;

    /// Allocates and pins a brand-new, zeroed page.
    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BpmError>;

    /// Flushes a specific page to disk if it is dirty.
    fn flush_page(&self, page_id: PageId) -> Result<(), BpmError>;

    /// Flushes every dirty page currently resident in the pool.
    fn flush_all_pages(&self) -> Result<(), BpmError>;
}
