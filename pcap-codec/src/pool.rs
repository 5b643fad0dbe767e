// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A pool of fixed-size payload buffers.
//!
//! Every buffer handed out by a [`BufferPool`] has the same length, fixed
//! when the pool is created. Buffers come back to the pool when their
//! [`PooledBuffer`] guard is dropped, from whichever thread drops it.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;

/// A thread-safe pool of byte buffers of one size.
pub struct BufferPool {
    buffer_size: usize,
    max_idle: usize,
    idle: Mutex<Vec<Vec<u8>>>,
    allocations: AtomicUsize,
}

impl BufferPool {
    /// Creates a pool of `buffer_size`-byte buffers keeping at most
    /// `max_idle` released buffers for reuse.
    pub fn new(buffer_size: usize, max_idle: usize) -> Arc<BufferPool> {
        Arc::new(BufferPool {
            buffer_size,
            max_idle,
            idle: Mutex::new(Vec::new()),
            allocations: AtomicUsize::new(0),
        })
    }

    /// Length of every buffer this pool hands out.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers ever freshly allocated by this pool.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of released buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    // The idle list stays consistent across a panic elsewhere, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<Vec<Vec<u8>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes an idle buffer, or allocates a zero-filled one if none is idle.
    ///
    /// Reused buffers keep whatever bytes their previous holder left.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let reused = self.lock().pop();
        let data = reused.unwrap_or_else(|| {
            let count = self.allocations.fetch_add(1, Ordering::Relaxed) + 1;
            trace!("Allocating pool buffer #{} of {} bytes", count, self.buffer_size);
            vec![0u8; self.buffer_size]
        });
        PooledBuffer { data, pool: Some(Arc::clone(self)) }
    }

    fn release(&self, data: Vec<u8>) {
        if data.len() != self.buffer_size {
            return;
        }
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(data);
        }
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size)
            .field("max_idle", &self.max_idle)
            .field("idle", &self.idle())
            .field("allocations", &self.allocations())
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Dropping the guard returns the buffer to its pool. A detached buffer
/// has no pool and is simply freed.
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Option<Arc<BufferPool>>,
}

impl PooledBuffer {
    /// Wraps a buffer that belongs to no pool.
    pub fn detached(data: Vec<u8>) -> PooledBuffer {
        PooledBuffer { data, pool: None }
    }

    /// Returns true while the buffer is still tied to a pool.
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Returns the buffer to its pool now.
    pub fn release(self) {
        drop(self)
    }

    /// Takes the bytes out of the pool's reach; they will never be reused.
    pub fn detach(mut self) -> Vec<u8> {
        self.pool = None;
        std::mem::take(&mut self.data)
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.data.len())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_acquire_allocates_zeroed() {
        let pool = BufferPool::new(8, 4);
        let buffer = pool.acquire();
        assert_eq!(&buffer[..], &[0u8; 8]);
        assert!(buffer.is_pooled());
        assert_eq!(pool.allocations(), 1);
    }

    #[test]
    fn test_drop_returns_buffer() {
        let pool = BufferPool::new(4, 4);
        let mut buffer = pool.acquire();
        buffer[0] = 0xaa;
        drop(buffer);
        assert_eq!(pool.idle(), 1);

        let buffer = pool.acquire();
        assert_eq!(buffer[0], 0xaa);
        assert_eq!(pool.allocations(), 1);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_detach_is_not_reused() {
        let pool = BufferPool::new(4, 4);
        let bytes = pool.acquire().detach();
        assert_eq!(bytes.len(), 4);
        assert_eq!(pool.idle(), 0);
        pool.acquire().release();
        assert_eq!(pool.allocations(), 2);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_max_idle_bound() {
        let pool = BufferPool::new(2, 1);
        let first = pool.acquire();
        let second = pool.acquire();
        drop(first);
        drop(second);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_detached_buffer_has_no_pool() {
        let buffer = PooledBuffer::detached(vec![1, 2, 3]);
        assert!(!buffer.is_pooled());
        assert_eq!(&buffer[..], &[1, 2, 3]);
    }

    #[test]
    fn test_release_from_other_thread() {
        let pool = BufferPool::new(16, 8);
        let buffers: Vec<PooledBuffer> = (0..4).map(|_| pool.acquire()).collect();
        thread::spawn(move || drop(buffers)).join().unwrap();
        assert_eq!(pool.idle(), 4);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.acquire().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 16);
        }
        assert_eq!(pool.allocations(), 4);
    }
}
