//! Sharded async locks for per-key critical sections

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Fixed set of mutexes indexed by key hash
///
/// Keys on the same shard serialize; keys on different shards proceed in
/// parallel. Guards must not be held across transport I/O.
#[derive(Debug)]
pub struct ShardedLocks {
    shards: Vec<Mutex<()>>,
}

impl ShardedLocks {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Wait for and hold the shard owning `key`
    pub async fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.shards[self.shard_index(key)].lock().await
    }

    pub fn shard_index<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }
}

impl Default for ShardedLocks {
    fn default() -> Self {
        Self::new(64)
    }
}
