use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, LazyLock};

use crossbeam_queue::ArrayQueue;

use crate::BufferSet;

const POOL_CAPACITY: usize = 128;

pub static GLOBAL_BUFFER_POOL: LazyLock<Arc<BufferPool>> =
    LazyLock::new(|| Arc::new(BufferPool::default()));

/// A pooled `BufferSet` that returns itself to the pool on drop.
pub struct PooledBufferSet {
    pool: Arc<BufferPool>,
    inner: ManuallyDrop<BufferSet>,
}

impl Deref for PooledBufferSet {
    type Target = BufferSet;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PooledBufferSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for PooledBufferSet {
    fn drop(&mut self) {
        // SAFETY: inner is never accessed after this
        let buffer_set = unsafe { ManuallyDrop::take(&mut self.inner) };
        self.pool.return_buffer_set(buffer_set);
    }
}

impl std::fmt::Debug for PooledBufferSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

#[derive(Debug)]
pub struct BufferPool {
    buffer_sets: ArrayQueue<BufferSet>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer_sets: ArrayQueue::new(capacity),
        }
    }

    pub fn get_buffer_set(self: &Arc<Self>) -> PooledBufferSet {
        let buffer_set = self.buffer_sets.pop().unwrap_or_default();
        PooledBufferSet {
            pool: Arc::clone(self),
            inner: ManuallyDrop::new(buffer_set),
        }
    }

    pub fn return_buffer_set(&self, mut buffer_set: BufferSet) {
        buffer_set.clear();
        // Ignore if pool is full
        let _ = self.buffer_sets.push(buffer_set);
    }

    pub fn idle(&self) -> usize {
        self.buffer_sets.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_set_is_recycled_cleared() {
        let pool = Arc::new(BufferPool::new(2));
        {
            let mut set = pool.get_buffer_set();
            set.read_buffer.extend_from_slice(b"leftover");
        }
        assert_eq!(pool.idle(), 1);
        let set = pool.get_buffer_set();
        assert!(set.read_buffer.is_empty());
        assert!(set.read_buffer.capacity() >= 8);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn full_pool_drops_extra_sets() {
        let pool = Arc::new(BufferPool::new(1));
        let a = pool.get_buffer_set();
        let b = pool.get_buffer_set();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
