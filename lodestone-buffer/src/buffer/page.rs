use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Size in bytes of a single page, on disk and in memory.
pub const PAGE_SIZE: usize = 4096;

pub type PageId = i32;
pub const INVALID_PAGE_ID: PageId = -1;

/// Log sequence number. Owned by the log subsystem; the buffer layer only
/// stores it per frame.
pub type Lsn = u64;

/// Index of a frame within the pool array. Frames never move, so the page
/// table and the replacer track frames by this index.
pub type FrameId = usize;

/// Shared handle to a frame. Holding one does not by itself keep the page
/// resident; the pin count does.
pub type PageRef = Arc<Frame>;

/// Fixed-size page buffer.
pub struct PageBuf([u8; PAGE_SIZE]);

impl PageBuf {
    #[inline]
    pub(crate) fn new() -> Self {
        PageBuf([0u8; PAGE_SIZE])
    }

    #[inline]
    pub fn zero(&mut self) {
        self.0.fill(0);
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.0
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.0
    }
}

impl Deref for PageBuf {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for PageBuf {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// An in-memory slot holding one page at a time.
///
/// Metadata lives in atomics so observers never block; every metadata
/// mutation happens under the pool latch. The page bytes sit behind their
/// own lock, governed by the pin protocol: callers may only take a data
/// guard while they hold a pin, and must drop their guards on a page before
/// flushing or unpinning it from the same thread.
pub struct Frame {
    page_id: AtomicI32,
    pin_count: AtomicU32,
    dirty: AtomicBool,
    lsn: AtomicU64,
    data: RwLock<PageBuf>,
}

impl Frame {
    #[inline]
    pub(crate) fn new() -> Self {
        Frame {
            page_id: AtomicI32::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            lsn: AtomicU64::new(0),
            data: RwLock::new(PageBuf::new()),
        }
    }

    /// Id of the resident page, or [`INVALID_PAGE_ID`] if the frame is free.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Acquire)
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub fn lsn(&self) -> Lsn {
        self.lsn.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_lsn(&self, lsn: Lsn) {
        self.lsn.store(lsn, Ordering::Release);
    }

    /// Shared access to the page bytes. Requires a pin.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, PageBuf> {
        self.data.read()
    }

    /// Exclusive access to the page bytes. Requires a pin; remember to
    /// unpin with `is_dirty = true` after modifying.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, PageBuf> {
        self.data.write()
    }

    #[inline]
    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    #[inline]
    pub(crate) fn mark_dirty(&self, is_dirty: bool) {
        self.dirty.fetch_or(is_dirty, Ordering::AcqRel);
    }

    /// Returns the new pin count.
    #[inline]
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the new pin count. Callers check for zero before invoking.
    #[inline]
    pub(crate) fn unpin(&self) -> u32 {
        self.pin_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Return the frame to its vacant state: no page bound, clean, zeroed.
    pub(crate) fn reset(&self) {
        self.page_id.store(INVALID_PAGE_ID, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.lsn.store(0, Ordering::Release);
        self.data.write().zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_starts_free() {
        let frame = Frame::new();
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.read().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_frame_reset() {
        let frame = Frame::new();
        frame.set_page_id(3);
        frame.pin();
        frame.mark_dirty(true);
        frame.set_lsn(17);
        frame.write()[0] = 0xab;

        frame.reset();
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert_eq!(frame.lsn(), 0);
        assert!(frame.read().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mark_dirty_is_sticky() {
        let frame = Frame::new();
        frame.mark_dirty(true);
        frame.mark_dirty(false);
        assert!(frame.is_dirty());
    }
}
