use crate::buffer::page::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::error::Result;
use crate::io::DiskManager;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

/// Disk manager backed by a single database file.
///
/// Pages are addressed by `page_id * PAGE_SIZE` and accessed with
/// positioned I/O, so reads and writes of distinct pages need no lock.
/// Page ids are handed out sequentially; reopening an existing file resumes
/// allocation after the pages it already contains.
pub struct FileDiskManager {
    file: File,
    next_page_id: AtomicI32,
}

impl FileDiskManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();
        Ok(FileDiskManager {
            file,
            next_page_id: AtomicI32::new((len / PAGE_SIZE as u64) as PageId),
        })
    }

    #[inline]
    fn offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        let offset = Self::offset(page_id);
        let mut pos = 0;
        while pos < PAGE_SIZE {
            match self.file.read_at(&mut buf[pos..], offset + pos as u64) {
                Ok(0) => break,
                Ok(n) => pos += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        // An allocated page that was never written reads back as zeroes.
        buf[pos..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        self.file.write_all_at(buf, Self::offset(page_id))?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        Ok(self.next_page_id.fetch_add(1, Ordering::Relaxed))
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        assert!(page_id != INVALID_PAGE_ID, "invalid page id");
        // Ids are never reused and the file is not punched; a freed page
        // simply becomes available garbage.
        Ok(())
    }
}
