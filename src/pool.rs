//! Byte buffer pool for allocation-free metric building.
//!
//! Builders draw their backing `Vec<u8>` from a [`BufferPool`] and hand it back
//! when they render. After warmup, building a metric costs no allocation
//! besides the returned `String`.
//!
//! # Architecture
//!
//! ```text
//! BufferPool (Clone, shared)
//!   └── Arc<PoolInner>
//!         ├── ArrayQueue<Vec<u8>>   idle buffers, lock-free
//!         ├── Limits                handed to every builder
//!         └── BuilderMetrics        prometheus counters
//! ```
//!
//! Ownership of a `Vec<u8>` moves out of the queue on [`BufferPool::acquire`]
//! and back in on [`BufferPool::release`], so a buffer can never have two
//! owners at once.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tracing::{debug, trace};

use crate::builder::{BuilderOption, MetricBuilder};
use crate::config::{BuilderConfig, Limits};
use crate::error::Result;
use crate::metrics::BuilderMetrics;

/// A thread-safe pool of reusable byte buffers.
///
/// Cloning is cheap and yields a handle to the same pool.
///
/// # Examples
///
/// ```ignore
/// use metric_builder::BufferPool;
///
/// let pool = BufferPool::new();
/// let metric = pool
///     .metric("cassandra_query_count")?
///     .label("cluster", "guava")
///     .render();
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    idle: ArrayQueue<Vec<u8>>,
    buffer_capacity: usize,
    max_retained_capacity: usize,
    limits: Limits,
    metrics: BuilderMetrics,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("idle", &self.inner.idle.len())
            .field("capacity", &self.inner.idle.capacity())
            .field("buffer_capacity", &self.inner.buffer_capacity)
            .field("limits", &self.inner.limits)
            .finish()
    }
}

impl BufferPool {
    /// Create a pool with default configuration.
    pub fn new() -> Self {
        Self::from_config(&BuilderConfig::default())
    }

    /// Create a pool keeping at most `capacity` idle buffers, otherwise default.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_config(&BuilderConfig {
            pool_capacity: capacity,
            ..BuilderConfig::default()
        })
    }

    /// Create a pool from a loaded configuration.
    ///
    /// A `pool_capacity` of zero still keeps a single idle buffer.
    pub fn from_config(config: &BuilderConfig) -> Self {
        let capacity = config.pool_capacity.max(1);
        debug!(
            capacity,
            buffer_capacity = config.effective_buffer_capacity(),
            max_retained_capacity = config.max_retained_capacity,
            "created buffer pool"
        );
        Self {
            inner: Arc::new(PoolInner {
                idle: ArrayQueue::new(capacity),
                buffer_capacity: config.effective_buffer_capacity(),
                max_retained_capacity: config.max_retained_capacity,
                limits: config.limits,
                metrics: BuilderMetrics::with_prefix(&config.metrics_prefix),
            }),
        }
    }

    /// Take an empty buffer from the pool, allocating one if none is idle.
    ///
    /// The returned buffer has zero length and non-zero capacity.
    pub fn acquire(&self) -> Vec<u8> {
        match self.inner.idle.pop() {
            Some(buf) => {
                self.inner.metrics.record_acquire(false);
                buf
            }
            None => {
                self.inner.metrics.record_acquire(true);
                Vec::with_capacity(self.inner.buffer_capacity)
            }
        }
    }

    /// Return a buffer to the pool.
    ///
    /// The buffer is cleared but keeps its capacity. A zero-capacity buffer
    /// (for example one already taken with `std::mem::take`) counts as absent
    /// and is ignored. Buffers grown past the configured retention limit, or
    /// released while the pool is full, are dropped.
    pub fn release(&self, mut buf: Vec<u8>) {
        let capacity = buf.capacity();
        if capacity == 0 {
            return;
        }
        if self.inner.max_retained_capacity > 0 && capacity > self.inner.max_retained_capacity {
            trace!(capacity, "dropping oversized buffer");
            self.inner.metrics.record_release(false);
            return;
        }
        buf.clear();
        // Ignore error if pool is full - the buffer will just be dropped
        let retained = self.inner.idle.push(buf).is_ok();
        if !retained {
            trace!(capacity, "pool full, dropping buffer");
        }
        self.inner.metrics.record_release(retained);
    }

    /// Number of buffers currently idle.
    pub fn idle(&self) -> usize {
        self.inner.idle.len()
    }

    /// Drop every idle buffer and return the total capacity freed, in bytes.
    pub fn shrink(&self) -> usize {
        let mut dropped = 0;
        let mut reclaimed = 0;
        while let Some(buf) = self.inner.idle.pop() {
            dropped += 1;
            reclaimed += buf.capacity();
        }
        self.inner.metrics.record_shrink(dropped);
        debug!(dropped, reclaimed, "shrunk buffer pool");
        reclaimed
    }

    /// Limits given to builders acquired from this pool.
    pub fn limits(&self) -> Limits {
        self.inner.limits
    }

    /// This pool's prometheus metrics.
    pub fn metrics(&self) -> &BuilderMetrics {
        &self.inner.metrics
    }

    /// Acquire an empty builder backed by a pooled buffer.
    ///
    /// The buffer returns to this pool when the builder renders or is dropped.
    pub fn builder(&self) -> MetricBuilder {
        MetricBuilder::pooled(self.clone())
    }

    /// Acquire a builder and set its metric name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidName`](crate::MetricError::InvalidName) if
    /// the name is empty, too long, or contains a double quote.
    pub fn metric(&self, name: &str) -> Result<MetricBuilder> {
        self.builder().set_name(name)
    }

    /// Like [`metric`](Self::metric), applying `options` before the name is validated.
    pub fn metric_with(&self, name: &str, options: &[BuilderOption]) -> Result<MetricBuilder> {
        self.builder().set_name_with(name, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_allocates_when_empty() {
        let pool = BufferPool::with_capacity(4);
        assert_eq!(pool.idle(), 0);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.metrics().buffers_allocated.get(), 1);
    }

    #[test]
    fn test_release_then_acquire_reuses() {
        let pool = BufferPool::with_capacity(4);

        let mut buf = pool.acquire();
        buf.extend_from_slice(b"some_metric{a=\"b\"}");
        let ptr = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(buf.as_ptr(), ptr);
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.metrics().buffers_acquired.get(), 2);
        assert_eq!(pool.metrics().buffers_allocated.get(), 1);
    }

    #[test]
    fn test_release_keeps_capacity() {
        let pool = BufferPool::with_capacity(4);

        let mut buf = pool.acquire();
        buf.resize(500, b'x');
        let capacity = buf.capacity();
        pool.release(buf);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), capacity);
    }

    #[test]
    fn test_release_absent_is_noop() {
        let pool = BufferPool::with_capacity(4);
        pool.release(Vec::new());
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.metrics().buffers_released.get(), 0);
        assert_eq!(pool.metrics().buffers_discarded.get(), 0);
    }

    #[test]
    fn test_pool_overflow() {
        let pool = BufferPool::with_capacity(2);

        pool.release(Vec::with_capacity(8));
        pool.release(Vec::with_capacity(8));
        // This should not panic, just drop the buffer
        pool.release(Vec::with_capacity(8));

        assert_eq!(pool.idle(), 2);
        assert_eq!(pool.metrics().buffers_discarded.get(), 1);
    }

    #[test]
    fn test_oversized_buffer_not_retained() {
        let pool = BufferPool::from_config(&BuilderConfig {
            max_retained_capacity: 128,
            ..BuilderConfig::default()
        });

        pool.release(Vec::with_capacity(4096));
        assert_eq!(pool.idle(), 0);

        pool.release(Vec::with_capacity(128));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_shrink() {
        let pool = BufferPool::with_capacity(8);
        pool.release(Vec::with_capacity(100));
        pool.release(Vec::with_capacity(200));

        let reclaimed = pool.shrink();
        assert!(reclaimed >= 300);
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.metrics().idle_buffers.get(), 0);
    }

    #[test]
    fn test_zero_capacity_config_keeps_one() {
        let pool = BufferPool::with_capacity(0);
        pool.release(Vec::with_capacity(8));
        pool.release(Vec::with_capacity(8));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_clones_share_idle_set() {
        let pool = BufferPool::with_capacity(4);
        let other = pool.clone();

        other.release(Vec::with_capacity(16));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_pool_concurrent_access() {
        use std::thread;

        let pool = BufferPool::with_capacity(16);
        let mut handles = vec![];

        for id in 0..4u8 {
            let pool = pool.clone();
            handles.push(thread::spawn(move || {
                for round in 0..200u8 {
                    let mut buf = pool.acquire();
                    assert!(buf.is_empty());
                    buf.extend_from_slice(&[id, round, id]);
                    thread::yield_now();
                    // Nobody else wrote into our buffer meanwhile
                    assert_eq!(buf, [id, round, id]);
                    pool.release(buf);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.metrics().buffers_acquired.get(), 800);
    }
}
