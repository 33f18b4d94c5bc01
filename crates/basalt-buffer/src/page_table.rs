//! Extendible hash table used as the buffer pool page table.
//!
//! The directory is a power-of-two array of bucket references indexed by
//! the low `global_depth` bits of the key's hash. Full buckets split in
//! place, doubling the directory when their local depth has caught up
//! with the global depth. The directory never contracts.

use crate::frame::FrameId;
use basalt_common::page::PageId;
use basalt_common::{BufferConfig, Result};
use log::debug;
use parking_lot::Mutex;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

/// The canonical page table instantiation: page ID to frame handle.
pub type PageTable = ExtendibleHashTable<PageId, FrameId>;

/// A bounded bucket of key/value pairs discriminating on the low
/// `local_depth` bits of the key hash.
struct Bucket<K, V> {
    local_depth: u32,
    entries: Vec<(K, V)>,
}

struct TableInner<K, V> {
    global_depth: u32,
    /// Count of distinct buckets referenced by the directory.
    num_buckets: usize,
    /// Total live entries across all buckets.
    len: usize,
    /// Directory slot -> bucket arena index. Length is `1 << global_depth`.
    dir: Vec<usize>,
    /// Bucket arena. A slot is live while some directory entry names it;
    /// split releases the old slot through `free` once the last
    /// referencing directory entry is rewired away.
    buckets: Vec<Bucket<K, V>>,
    free: Vec<usize>,
}

impl<K, V> TableInner<K, V> {
    fn alloc_bucket(&mut self, local_depth: u32) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.buckets[slot].local_depth = local_depth;
                slot
            }
            None => {
                self.buckets.push(Bucket {
                    local_depth,
                    entries: Vec::new(),
                });
                self.buckets.len() - 1
            }
        }
    }

    fn release_bucket(&mut self, slot: usize) {
        self.buckets[slot].entries.clear();
        self.free.push(slot);
    }
}

/// Thread-safe extendible hash table.
///
/// The hasher is fixed at construction so that rehashing during a split
/// reproduces the bits observed at insertion. All operations run under a
/// single per-instance mutex.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    hasher: S,
    bucket_size: usize,
    inner: Mutex<TableInner<K, V>>,
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V> {
    /// Creates a table with the given bucket capacity and a random hash
    /// state.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }

    /// Builds a table from a validated buffer configuration.
    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.bucket_size))
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S> {
    /// Creates a table with an explicit hasher.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");

        Self {
            hasher,
            bucket_size,
            inner: Mutex::new(TableInner {
                global_depth: 0,
                num_buckets: 1,
                len: 0,
                dir: vec![0],
                buckets: vec![Bucket {
                    local_depth: 0,
                    entries: Vec::new(),
                }],
                free: Vec::new(),
            }),
        }
    }

    /// Returns the entry capacity of each bucket.
    #[inline]
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Returns the number of low hash bits the directory indexes on.
    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    /// Returns the local depth of the bucket referenced at `dir_index`,
    /// or None if the slot does not exist.
    pub fn local_depth(&self, dir_index: usize) -> Option<u32> {
        let inner = self.inner.lock();
        let slot = *inner.dir.get(dir_index)?;
        Some(inner.buckets[slot].local_depth)
    }

    /// Returns the count of distinct buckets referenced by the directory.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().num_buckets
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn dir_index(hash: u64, global_depth: u32) -> usize {
        (hash as usize) & ((1usize << global_depth) - 1)
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Looks up a key and returns a copy of its value.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash(key);
        let inner = self.inner.lock();
        let slot = inner.dir[Self::dir_index(hash, inner.global_depth)];
        inner.buckets[slot]
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &K) -> bool {
        let hash = self.hash(key);
        let inner = self.inner.lock();
        let slot = inner.dir[Self::dir_index(hash, inner.global_depth)];
        inner.buckets[slot].entries.iter().any(|(k, _)| k == key)
    }

    /// Inserts a key/value pair, overwriting any existing value for the
    /// key. A full target bucket is split until the new entry fits.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        let mut inner = self.inner.lock();

        // A single split can leave the target bucket full for this key
        // when every redistributed entry lands on the same side, so keep
        // splitting until there is room. Each round grows either the
        // global depth or the target's local depth.
        loop {
            let slot = inner.dir[Self::dir_index(hash, inner.global_depth)];
            let bucket = &inner.buckets[slot];
            if bucket.entries.len() < self.bucket_size
                || bucket.entries.iter().any(|(k, _)| k == &key)
            {
                break;
            }
            self.split(&mut inner, slot);
        }

        let slot = inner.dir[Self::dir_index(hash, inner.global_depth)];
        let bucket = &mut inner.buckets[slot];
        match bucket.entries.iter_mut().find(|(k, _)| k == &key) {
            Some(entry) => entry.1 = value,
            None => {
                bucket.entries.push((key, value));
                inner.len += 1;
            }
        }
    }

    /// Removes a key. Returns whether an entry was deleted. The directory
    /// never contracts and buckets never merge.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);
        let mut inner = self.inner.lock();
        let slot = inner.dir[Self::dir_index(hash, inner.global_depth)];
        let bucket = &mut inner.buckets[slot];
        match bucket.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                bucket.entries.swap_remove(pos);
                inner.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Splits the full bucket in arena slot `slot`, growing the directory
    /// first when its local depth has caught up with the global depth.
    fn split(&self, inner: &mut TableInner<K, V>, slot: usize) {
        let local_depth = inner.buckets[slot].local_depth;
        if local_depth == inner.global_depth {
            // Mirror the lower half slot-for-slot: every bucket's
            // referencing slots reappear at the same low bits in the new
            // upper half, so no bucket needs rewiring yet.
            let len = inner.dir.len();
            inner.dir.extend_from_within(..len);
            inner.global_depth += 1;
            debug!(
                "page table directory doubled, global depth {}",
                inner.global_depth
            );
        }

        // The next bit above the previously shared low bits discriminates
        // the two halves.
        let discriminator = 1usize << local_depth;
        let entries = std::mem::take(&mut inner.buckets[slot].entries);
        let zero = inner.alloc_bucket(local_depth + 1);
        let one = inner.alloc_bucket(local_depth + 1);
        for (key, value) in entries {
            let target = if (self.hash(&key) as usize) & discriminator != 0 {
                one
            } else {
                zero
            };
            inner.buckets[target].entries.push((key, value));
        }

        for (i, entry) in inner.dir.iter_mut().enumerate() {
            if *entry == slot {
                *entry = if i & discriminator != 0 { one } else { zero };
            }
        }
        inner.release_bucket(slot);
        inner.num_buckets += 1;

        debug!(
            "split bucket to local depth {}, {} buckets live",
            local_depth + 1,
            inner.num_buckets
        );
    }
}

#[cfg(test)]
impl<K: Hash + Eq, V, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    /// Asserts the structural invariants. Called after mutations in tests.
    fn verify_invariants(&self) {
        use std::collections::HashSet;

        let inner = self.inner.lock();
        assert_eq!(inner.dir.len(), 1usize << inner.global_depth);

        let mut referenced = HashSet::new();
        for (i, &slot) in inner.dir.iter().enumerate() {
            referenced.insert(slot);
            let bucket = &inner.buckets[slot];
            assert!(bucket.local_depth <= inner.global_depth);
            assert!(bucket.entries.len() <= self.bucket_size);

            // Every slot referencing this bucket shares the same low
            // local_depth bits, and so does every key it holds.
            let mask = (1usize << bucket.local_depth) - 1;
            let first = inner.dir.iter().position(|&s| s == slot).unwrap();
            assert_eq!(i & mask, first & mask);
            for (key, _) in &bucket.entries {
                let mut hasher = self.hasher.build_hasher();
                key.hash(&mut hasher);
                assert_eq!(hasher.finish() as usize & mask, i & mask);
            }
        }

        assert_eq!(referenced.len(), inner.num_buckets);
        for slot in 0..inner.buckets.len() {
            assert!(referenced.contains(&slot) || inner.free.contains(&slot));
        }

        let live: usize = referenced
            .iter()
            .map(|&slot| inner.buckets[slot].entries.len())
            .sum();
        assert_eq!(live, inner.len);
    }
}
