//! Reusable read buffers for streaming responses
//!
//! Buffers are zeroed when they come back so nothing read for one request
//! can surface in another, even across mounts.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Default number of idle buffers kept around
pub const DEFAULT_POOL_CAPACITY: usize = 64;

#[derive(Debug)]
struct PoolInner {
    buffer_size: usize,
    capacity: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

/// Bounded free list of fixed-size buffers
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffer_size: buffer_size.max(1),
                capacity,
                free: Mutex::new(Vec::with_capacity(capacity)),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Take a buffer, allocating when the free list is empty
    pub fn get(&self) -> PooledBuf {
        let buf = self
            .inner
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.inner.buffer_size].into_boxed_slice());
        PooledBuf {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        }
    }
}

/// A buffer on loan from a [`BufferPool`]
#[derive(Debug)]
pub struct PooledBuf {
    buf: Option<Box<[u8]>>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let Some(mut buf) = self.buf.take() else {
            return;
        };
        buf.fill(0);
        let mut free = self.pool.free.lock();
        if free.len() < self.pool.capacity {
            free.push(buf);
        }
    }
}
