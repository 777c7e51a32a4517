use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// Maximum number of low-order hash bits used to index the directory.
/// Growing past this means the hash function is degenerate.
pub const MAX_GLOBAL_DEPTH: u32 = 31;

#[inline]
fn low_bits(n: u32) -> u64 {
    (1u64 << n) - 1
}

/// Concurrent extendible hash table.
///
/// The directory is a vector of bucket references indexed by the low
/// `global_depth` bits of the key hash. A full bucket is split in two and
/// the directory doubled when the bucket's local depth has caught up with
/// the global depth; other buckets are untouched, so growth never rehashes
/// the whole table.
///
/// Readers take the directory lock shared, pin the target bucket shared and
/// release the directory before scanning. Writers hold the directory
/// exclusively for their full duration because splits mutate it. Lock order
/// is always directory first, then bucket.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_capacity: usize,
    hash_builder: S,
    dir: RwLock<Directory<K, V>>,
}

struct Directory<K, V> {
    slots: Vec<Arc<Bucket<K, V>>>,
    global_depth: u32,
    num_buckets: usize,
    num_entries: usize,
}

struct Bucket<K, V> {
    entries: RwLock<BucketEntries<K, V>>,
}

impl<K, V> Bucket<K, V> {
    #[inline]
    fn new(local_depth: u32) -> Self {
        Bucket {
            entries: RwLock::new(BucketEntries {
                local_depth,
                keys: Vec::new(),
                values: Vec::new(),
            }),
        }
    }
}

/// Unordered parallel key/value arrays, scanned linearly.
struct BucketEntries<K, V> {
    local_depth: u32,
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K: Eq, V> BucketEntries<K, V> {
    #[inline]
    fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V> {
    /// Create a table with a single empty bucket holding up to
    /// `bucket_capacity` entries.
    #[inline]
    pub fn new(bucket_capacity: usize) -> Self {
        Self::with_hasher(bucket_capacity, RandomState::new())
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_capacity: usize, hash_builder: S) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity must be positive");
        ExtendibleHashTable {
            bucket_capacity,
            hash_builder,
            dir: RwLock::new(Directory {
                slots: vec![Arc::new(Bucket::new(0))],
                global_depth: 0,
                num_buckets: 1,
                num_entries: 0,
            }),
        }
    }

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    #[inline]
    fn dir_index(hash: u64, global_depth: u32) -> usize {
        (hash & low_bits(global_depth)) as usize
    }

    /// Look up the value stored under `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash(key);
        let dir = self.dir.read();
        let bucket = Arc::clone(&dir.slots[Self::dir_index(hash, dir.global_depth)]);
        let entries = bucket.entries.read();
        drop(dir);
        entries.position(key).map(|pos| entries.values[pos].clone())
    }

    /// Insert a mapping, overwriting any existing value for `key`.
    /// A full bucket is split, doubling the directory when required, until
    /// the new entry fits.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        let mut dir = self.dir.write();
        loop {
            let idx = Self::dir_index(hash, dir.global_depth);
            let bucket = Arc::clone(&dir.slots[idx]);
            let mut entries = bucket.entries.write();
            if let Some(pos) = entries.position(&key) {
                entries.values[pos] = value;
                return;
            }
            if entries.keys.len() < self.bucket_capacity {
                entries.keys.push(key);
                entries.values.push(value);
                dir.num_entries += 1;
                return;
            }
            self.split(&mut dir, idx, entries);
        }
    }

    /// Remove the mapping for `key`, reporting whether one existed.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);
        let mut dir = self.dir.write();
        let bucket = Arc::clone(&dir.slots[Self::dir_index(hash, dir.global_depth)]);
        let mut entries = bucket.entries.write();
        match entries.position(key) {
            Some(pos) => {
                entries.keys.swap_remove(pos);
                entries.values.swap_remove(pos);
                dir.num_entries -= 1;
                true
            }
            None => false,
        }
    }

    /// Split the full bucket referenced by directory slot `idx`.
    ///
    /// Entries whose hash has the old-local-depth bit set move into a fresh
    /// bucket; directory slots that carry that bit are redirected to it.
    /// The caller retries its insert afterwards, which may split again if
    /// the hash distribution is pathological.
    fn split(
        &self,
        dir: &mut Directory<K, V>,
        idx: usize,
        mut entries: RwLockWriteGuard<'_, BucketEntries<K, V>>,
    ) {
        let local_depth = entries.local_depth;
        if local_depth == dir.global_depth {
            assert!(
                dir.global_depth < MAX_GLOBAL_DEPTH,
                "extendible hash directory exceeded max depth {}",
                MAX_GLOBAL_DEPTH
            );
            // Double the directory: slot i + 2^global_depth mirrors slot i.
            dir.slots.extend_from_within(..);
            dir.global_depth += 1;
        }

        entries.local_depth = local_depth + 1;
        let new_bucket = Arc::new(Bucket::new(local_depth + 1));
        dir.num_buckets += 1;

        // Redirect every slot that shares the split bucket's low-bit
        // signature and has the split bit set.
        let signature = idx as u64 & low_bits(local_depth);
        let split_bit = 1u64 << local_depth;
        for (slot_idx, slot) in dir.slots.iter_mut().enumerate() {
            let slot_idx = slot_idx as u64;
            if slot_idx & low_bits(local_depth) == signature && slot_idx & split_bit != 0 {
                *slot = Arc::clone(&new_bucket);
            }
        }

        // Rehash the old bucket's entries into the new one.
        let mut moved = new_bucket.entries.write();
        let mut i = 0;
        while i < entries.keys.len() {
            if self.hash(&entries.keys[i]) & split_bit != 0 {
                let key = entries.keys.swap_remove(i);
                let value = entries.values.swap_remove(i);
                moved.keys.push(key);
                moved.values.push(value);
            } else {
                i += 1;
            }
        }
    }

    /// Number of low-order hash bits currently indexing the directory.
    #[inline]
    pub fn global_depth(&self) -> u32 {
        self.dir.read().global_depth
    }

    /// Local depth of the bucket referenced by directory slot `slot_idx`.
    pub fn local_depth(&self, slot_idx: usize) -> u32 {
        let dir = self.dir.read();
        let bucket = Arc::clone(&dir.slots[slot_idx]);
        let entries = bucket.entries.read();
        drop(dir);
        entries.local_depth
    }

    /// Number of distinct buckets.
    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.dir.read().num_buckets
    }

    /// Number of stored mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.dir.read().num_entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }
}
