pub mod buffer;
pub mod config;
pub mod error;
pub mod hash;
pub mod io;

pub mod prelude {
    pub use crate::buffer::page::{
        Frame, FrameId, Lsn, PageBuf, PageId, PageRef, INVALID_PAGE_ID, PAGE_SIZE,
    };
    pub use crate::buffer::pool::BufferPoolManager;
    pub use crate::buffer::replacer::LruReplacer;
    pub use crate::config::BufferPoolConfig;
    pub use crate::error::{Error, Result};
    pub use crate::hash::ExtendibleHashTable;
    pub use crate::io::{DiskManager, FileDiskManager};
}
