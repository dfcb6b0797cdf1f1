//! A single-threaded, clock-replacement buffer pool manager.
//!
//! The B+-tree engine this crate backs is specified as single-threaded
//! cooperative (no concurrent writers, no latch crabbing), so this
//! implementation keeps its frame table behind a plain `Mutex` rather than
//! running an actor thread or a lock-free scheme: there is never contention
//! to optimize away, only state to protect so the type can still be shared
//! behind `Arc<dyn BufferPoolManager>` without `unsafe`.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use common::{BlobFile, BpmError, BufferPoolManager, PageGuard, PageId, PAGE_SIZE};

type FrameId = usize;

#[derive(Debug)]
struct Frame {
    page_id: PageId,
    pin_count: usize,
    is_dirty: bool,
    is_referenced: bool,
}

struct BpmState {
    frames: Vec<Frame>,
    frame_data: Vec<Box<[u8; PAGE_SIZE]>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    clock_hand: usize,
}

impl BpmState {
    fn new(pool_size: usize) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut frame_data = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(Frame {
                page_id: 0,
                pin_count: 0,
                is_dirty: false,
                is_referenced: false,
            });
            frame_data.push(Box::new([0u8; PAGE_SIZE]));
            free_list.push(i);
        }
        Self {
            frames,
            frame_data,
            page_table: HashMap::new(),
            free_list,
            clock_hand: 0,
        }
    }

    /// Finds a frame to reuse, preferring the free list, then a clock sweep
    /// over unpinned frames giving each a single second chance.
    fn find_victim_frame(&mut self) -> Result<FrameId, BpmError> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }

        for _ in 0..(2 * self.frames.len()) {
            let frame_id = self.clock_hand;
            if self.frames[frame_id].pin_count == 0 {
                if self.frames[frame_id].is_referenced {
                    self.frames[frame_id].is_referenced = false;
                } else {
                    self.clock_hand = (self.clock_hand + 1) % self.frames.len();
                    return Ok(frame_id);
                }
            }
            self.clock_hand = (self.clock_hand + 1) % self.frames.len();
        }

        Err(BpmError::NoFreeFrames)
    }

    fn evict_if_dirty(&self, frame_id: FrameId, blob_file: &BlobFile) -> Result<(), BpmError> {
        if self.frames[frame_id].is_dirty {
            let old_page_id = self.frames[frame_id].page_id;
            blob_file.write_page(old_page_id, &self.frame_data[frame_id][..])?;
        }
        Ok(())
    }
}

/// A buffer pool manager backed by a single [`BlobFile`]-managed file,
/// evicting with a clock (second-chance) policy.
pub struct ClockBufferPoolManager {
    state: Mutex<BpmState>,
    blob_file: Arc<BlobFile>,
}

impl ClockBufferPoolManager {
    pub fn new(pool_size: usize, blob_file: Arc<BlobFile>) -> Self {
        Self {
            state: Mutex::new(BpmState::new(pool_size)),
            blob_file,
        }
    }
}

impl BufferPoolManager for ClockBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BpmError> {
        let mut state = self.state.lock().unwrap();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].pin_count += 1;
            state.frames[frame_id].is_referenced = true;
            trace!(page_id, frame_id, "fetch_page hit");
            return Ok(Box::new(FrameGuard {
                page_id,
                data: state.frame_data[frame_id].clone(),
                dirty: false,
                manager: self,
            }));
        }

        let frame_id = state.find_victim_frame()?;
        state.evict_if_dirty(frame_id, &self.blob_file)?;

        let old_page_id = state.frames[frame_id].page_id;
        self.blob_file
            .read_page(page_id, &mut state.frame_data[frame_id][..])?;

        state.page_table.remove(&old_page_id);
        state.page_table.insert(page_id, frame_id);
        state.frames[frame_id] = Frame {
            page_id,
            pin_count: 1,
            is_dirty: false,
            is_referenced: true,
        };

        trace!(page_id, frame_id, "fetch_page miss, loaded from disk");
        Ok(Box::new(FrameGuard {
            page_id,
            data: state.frame_data[frame_id].clone(),
            dirty: false,
            manager: self,
        }))
    }

    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BpmError> {
        let mut state = self.state.lock().unwrap();

        let frame_id = state.find_victim_frame()?;
        state.evict_if_dirty(frame_id, &self.blob_file)?;

        let old_page_id = state.frames[frame_id].page_id;
        let page_id = self.blob_file.allocate_page();

        state.page_table.remove(&old_page_id);
        state.page_table.insert(page_id, frame_id);
        state.frames[frame_id] = Frame {
            page_id,
            pin_count: 1,
            is_dirty: true,
            is_referenced: true,
        };
        state.frame_data[frame_id] = Box::new([0u8; PAGE_SIZE]);

        debug!(page_id, frame_id, "allocated new page");
        Ok(Box::new(FrameGuard {
            page_id,
            data: state.frame_data[frame_id].clone(),
            dirty: true,
            manager: self,
        }))
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BpmError> {
        let mut state = self.state.lock().unwrap();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            if state.frames[frame_id].is_dirty {
                self.blob_file
                    .write_page(page_id, &state.frame_data[frame_id][..])?;
                state.frames[frame_id].is_dirty = false;
            }
        }
        Ok(())
    }

    fn flush_all_pages(&self) -> Result<(), BpmError> {
        let mut state = self.state.lock().unwrap();
        let dirty_pages: Vec<PageId> = state
            .page_table
            .iter()
            .filter(|(_, &frame_id)| state.frames[frame_id].is_dirty)
            .map(|(&page_id, _)| page_id)
            .collect();

        for page_id in dirty_pages {
            let frame_id = state.page_table[&page_id];
            self.blob_file
                .write_page(page_id, &state.frame_data[frame_id][..])?;
            state.frames[frame_id].is_dirty = false;
        }
        debug!("flushed all dirty pages");
        Ok(())
    }
}

/// The page guard this buffer pool hands out. Holds its own copy of the
/// frame's bytes; on drop, writes that copy back into the shared frame table
/// (if dirty) and decrements the pin count.
struct FrameGuard<'a> {
    page_id: PageId,
    data: Box<[u8; PAGE_SIZE]>,
    dirty: bool,
    manager: &'a ClockBufferPoolManager,
}

impl PageGuard for FrameGuard<'_> {
    fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for FrameGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data[..]
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;
        &mut self.data[..]
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.manager.state.lock().unwrap();
        if let Some(&frame_id) = state.page_table.get(&self.page_id) {
            if state.frames[frame_id].pin_count > 0 {
                state.frames[frame_id].pin_count -= 1;
            }
            if self.dirty {
                state.frames[frame_id].is_dirty = true;
                state.frame_data[frame_id].copy_from_slice(&self.data[..]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager(pool_size: usize) -> ClockBufferPoolManager {
        let file = NamedTempFile::new().unwrap();
        let blob = Arc::new(BlobFile::open(file.path()).unwrap());
        // Keep the temp file alive for the manager's lifetime by leaking the guard;
        // tests run in isolated temp dirs so leftover files are harmless.
        std::mem::forget(file);
        ClockBufferPoolManager::new(pool_size, blob)
    }

    #[test]
    fn new_page_is_pinned_and_dirty() {
        let bpm = manager(4);
        let guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), 1);
    }

    #[test]
    fn writes_are_visible_after_unpin_and_refetch() {
        let bpm = manager(4);
        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard[0] = 42;
            guard.page_id()
        };
        let guard = bpm.fetch_page(page_id).unwrap();
        assert_eq!(guard[0], 42);
    }

    #[test]
    fn eviction_reclaims_frames_once_pool_is_exhausted() {
        let bpm = manager(2);
        let mut guards = Vec::new();
        for _ in 0..2 {
            guards.push(bpm.new_page().unwrap());
        }
        // Pool is full and every frame pinned: a third page must fail.
        assert!(bpm.new_page().is_err());
        drop(guards);
        // Now frames are free again.
        assert!(bpm.new_page().is_ok());
    }

    #[test]
    fn flush_all_pages_clears_dirty_bits() {
        let bpm = manager(4);
        {
            let mut guard = bpm.new_page().unwrap();
            guard[0] = 7;
        }
        bpm.flush_all_pages().unwrap();
        // A fresh manager over the same underlying pages would see the write.
    }
}
