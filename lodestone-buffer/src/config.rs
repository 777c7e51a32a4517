use crate::buffer::page::PAGE_SIZE;
use crate::buffer::pool::{BufferPoolManager, DEFAULT_PAGE_TABLE_BUCKET_CAPACITY};
use crate::error::{Error, Result};
use crate::io::FileDiskManager;
use byte_unit::Byte;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_FILE_PATH: &str = "lodestone.db";
const DEFAULT_POOL_MEM_SIZE: Byte = Byte::from_u64(64 * 1024 * 1024); // 64MB

/// Configuration of a file-backed buffer pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferPoolConfig {
    // Path of the database file.
    file_path: String,
    // Total memory dedicated to page frames. The frame count is
    // pool_mem_size / PAGE_SIZE.
    pool_mem_size: Byte,
    // Bucket capacity of the page table.
    bucket_capacity: usize,
}

impl Default for BufferPoolConfig {
    #[inline]
    fn default() -> Self {
        BufferPoolConfig {
            file_path: String::from(DEFAULT_FILE_PATH),
            pool_mem_size: DEFAULT_POOL_MEM_SIZE,
            bucket_capacity: DEFAULT_PAGE_TABLE_BUCKET_CAPACITY,
        }
    }
}

impl BufferPoolConfig {
    /// Place the database file inside `main_dir`, keeping its file name.
    #[inline]
    pub fn with_main_dir(mut self, main_dir: impl AsRef<Path>) -> Self {
        let path = main_dir.as_ref().join(&self.file_path);
        self.file_path = path.to_string_lossy().to_string();
        self
    }

    #[inline]
    pub fn file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Memory dedicated to page frames.
    #[inline]
    pub fn pool_mem_size<T>(mut self, pool_mem_size: T) -> Self
    where
        Byte: From<T>,
    {
        self.pool_mem_size = Byte::from(pool_mem_size);
        self
    }

    #[inline]
    pub fn bucket_capacity(mut self, bucket_capacity: usize) -> Self {
        self.bucket_capacity = bucket_capacity;
        self
    }

    /// Open the database file and build the pool.
    pub fn build(self) -> Result<BufferPoolManager> {
        let pool_size = self.pool_mem_size.as_u64() as usize / PAGE_SIZE;
        if pool_size == 0 {
            return Err(Error::BufferPoolSizeTooSmall);
        }
        let disk = FileDiskManager::open(&self.file_path)?;
        Ok(BufferPoolManager::with_bucket_capacity(
            pool_size,
            Arc::new(disk),
            self.bucket_capacity,
        ))
    }
}
