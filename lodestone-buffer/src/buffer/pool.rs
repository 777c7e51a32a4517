use crate::buffer::page::{Frame, FrameId, PageId, PageRef, INVALID_PAGE_ID};
use crate::buffer::replacer::LruReplacer;
use crate::error::Result;
use crate::hash::{ExtendibleHashTable, IntHashState};
use crate::io::DiskManager;
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bucket capacity of the page table when none is configured.
pub const DEFAULT_PAGE_TABLE_BUCKET_CAPACITY: usize = 64;

/// Caches disk pages in a fixed array of frames.
///
/// Every frame is in exactly one of three states: on the free list, pinned
/// in the page table, or unpinned in both the page table and the replacer.
/// The free-list mutex is the pool latch: each public operation holds it
/// for its full duration, which serializes all transitions between those
/// states. The page table and the replacer carry their own internal locks
/// (they are usable standalone); the pool always acquires the latch first,
/// so the order latch -> page table -> bucket and latch -> replacer is
/// never reversed.
///
/// Disk calls happen while the latch is held. Only they can block.
pub struct BufferPoolManager {
    frames: Box<[PageRef]>,
    page_table: ExtendibleHashTable<PageId, FrameId, IntHashState>,
    replacer: LruReplacer<FrameId>,
    free_list: Mutex<VecDeque<FrameId>>,
    disk: Arc<dyn DiskManager>,
    stats: PoolStats,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk: Arc<dyn DiskManager>) -> Self {
        Self::with_bucket_capacity(pool_size, disk, DEFAULT_PAGE_TABLE_BUCKET_CAPACITY)
    }

    pub fn with_bucket_capacity(
        pool_size: usize,
        disk: Arc<dyn DiskManager>,
        bucket_capacity: usize,
    ) -> Self {
        assert!(pool_size > 0, "pool size must be positive");
        let frames: Box<[PageRef]> = (0..pool_size).map(|_| Arc::new(Frame::new())).collect();
        BufferPoolManager {
            frames,
            page_table: ExtendibleHashTable::with_hasher(bucket_capacity, IntHashState::default()),
            replacer: LruReplacer::new(),
            free_list: Mutex::new((0..pool_size).collect()),
            disk,
            stats: PoolStats::default(),
        }
    }

    /// Pin the page in a frame, reading it from disk if it is not resident.
    ///
    /// Returns `None` when every frame is pinned and none can be evicted.
    /// A disk read failure leaves the chosen frame back on the free list
    /// and no trace of the requested page.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PageRef>> {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        let mut free_list = self.free_list.lock();
        if let Some(frame_id) = self.page_table.find(&page_id) {
            let frame = &self.frames[frame_id];
            if frame.pin_count() == 0 {
                let erased = self.replacer.erase(&frame_id);
                debug_assert!(erased);
            }
            frame.pin();
            self.stats.fetch_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(Arc::clone(frame)));
        }

        self.stats.fetch_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = match self.take_victim(&mut free_list)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = &self.frames[frame_id];
        // Bind the result so the data guard is released before any cleanup.
        let read_result = self.disk.read_page(page_id, frame.write().as_bytes_mut());
        if let Err(e) = read_result {
            frame.reset();
            free_list.push_front(frame_id);
            return Err(e);
        }
        self.stats.disk_reads.fetch_add(1, Ordering::Relaxed);
        frame.set_page_id(page_id);
        frame.pin();
        self.page_table.insert(page_id, frame_id);
        Ok(Some(Arc::clone(frame)))
    }

    /// Allocate a page on disk and pin it in a zeroed frame.
    ///
    /// Returns `None` when every frame is pinned and none can be evicted.
    pub fn new_page(&self) -> Result<Option<(PageId, PageRef)>> {
        let mut free_list = self.free_list.lock();
        let frame_id = match self.take_victim(&mut free_list)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = &self.frames[frame_id];
        let page_id = match self.disk.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                free_list.push_front(frame_id);
                return Err(e);
            }
        };
        frame.write().zero();
        frame.set_page_id(page_id);
        frame.pin();
        self.page_table.insert(page_id, frame_id);
        Ok(Some((page_id, Arc::clone(frame))))
    }

    /// Drop one pin on the page, recording whether it was modified.
    ///
    /// Returns `false` if the page is not resident or not pinned. A page
    /// whose pin count reaches zero becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        let _free_list = self.free_list.lock();
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() == 0 {
            return false;
        }
        frame.mark_dirty(is_dirty);
        if frame.unpin() == 0 {
            self.replacer.insert(frame_id);
        }
        true
    }

    /// Write the page to disk if it is dirty. Returns `false` if the page
    /// is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        let _free_list = self.free_list.lock();
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        self.flush_frame(&self.frames[frame_id])?;
        Ok(true)
    }

    /// Write every resident dirty page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _free_list = self.free_list.lock();
        for frame in self.frames.iter() {
            if frame.page_id() != INVALID_PAGE_ID {
                self.flush_frame(frame)?;
            }
        }
        Ok(())
    }

    fn flush_frame(&self, frame: &Frame) -> Result<()> {
        if frame.is_dirty() {
            self.disk.write_page(frame.page_id(), frame.read().as_bytes())?;
            frame.set_dirty(false);
            self.stats.disk_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Evict the page if resident and unpinned, then deallocate it on disk.
    ///
    /// Returns `false` if the page is resident and pinned. Deleting a page
    /// that is not resident only deallocates it.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        let mut free_list = self.free_list.lock();
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => {
                self.disk.deallocate_page(page_id)?;
                return Ok(true);
            }
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() > 0 {
            return Ok(false);
        }
        let removed = self.page_table.remove(&page_id);
        debug_assert!(removed);
        let erased = self.replacer.erase(&frame_id);
        debug_assert!(erased);
        frame.reset();
        // Free the frame first so a deallocation error cannot strand it.
        free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }

    /// Unbind a frame for reuse, preferring the free list over eviction.
    ///
    /// The returned frame is vacant: unpinned, clean, zeroed, bound to no
    /// page. A dirty victim is written back before its page-table entry is
    /// removed; if that write fails the victim goes back to the replacer
    /// and nothing else changes.
    fn take_victim(&self, free_list: &mut VecDeque<FrameId>) -> Result<Option<FrameId>> {
        if let Some(frame_id) = free_list.pop_front() {
            return Ok(Some(frame_id));
        }
        let frame_id = match self.replacer.victim() {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = &self.frames[frame_id];
        debug_assert_eq!(frame.pin_count(), 0);
        let old_page_id = frame.page_id();
        debug_assert!(old_page_id != INVALID_PAGE_ID);
        if frame.is_dirty() {
            let write_result = self.disk.write_page(old_page_id, frame.read().as_bytes());
            if let Err(e) = write_result {
                self.replacer.insert(frame_id);
                return Err(e);
            }
            self.stats.dirty_writebacks.fetch_add(1, Ordering::Relaxed);
            self.stats.disk_writes.fetch_add(1, Ordering::Relaxed);
        }
        let removed = self.page_table.remove(&old_page_id);
        debug_assert!(removed);
        frame.reset();
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        Ok(Some(frame_id))
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_table
            .find(&page_id)
            .map(|frame_id| self.frames[frame_id].pin_count())
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_table.find(&page_id).is_some()
    }

    #[inline]
    pub fn replacer_len(&self) -> usize {
        self.replacer.len()
    }

    #[inline]
    pub fn page_table_len(&self) -> usize {
        self.page_table.len()
    }

    pub fn free_list_len(&self) -> usize {
        self.free_list.lock().len()
    }

    #[inline]
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Operation counters, padded to avoid false sharing between the pool
/// latch and concurrent observers.
#[derive(Default)]
struct PoolStats {
    fetch_hits: CachePadded<AtomicUsize>,
    fetch_misses: CachePadded<AtomicUsize>,
    evictions: CachePadded<AtomicUsize>,
    dirty_writebacks: CachePadded<AtomicUsize>,
    disk_reads: CachePadded<AtomicUsize>,
    disk_writes: CachePadded<AtomicUsize>,
}

impl PoolStats {
    fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            fetch_hits: self.fetch_hits.load(Ordering::Relaxed),
            fetch_misses: self.fetch_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            dirty_writebacks: self.dirty_writebacks.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStatsSnapshot {
    pub fetch_hits: usize,
    pub fetch_misses: usize,
    pub evictions: usize,
    pub dirty_writebacks: usize,
    pub disk_reads: usize,
    pub disk_writes: usize,
}
