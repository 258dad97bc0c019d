use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Capacity given to freshly allocated buffers when the requested size does
/// not dominate it. 1 MiB comfortably holds an uncompressed 640x480 YUYV
/// frame with room to spare.
const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20;

/// Thread-safe pool of reusable heap byte buffers.
///
/// Frame payloads range from hundreds of KB to several MB; allocating one
/// per captured frame would dominate the capture loop. The pool hands out
/// buffers whose capacity is at least the requested size and takes them back
/// once the consumer releases the frame.
///
/// A single mutex around the free list is sufficient at frame cadence; the
/// counters are atomics so [`BufferPool::stats`] never contends with the
/// hot path.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    default_capacity: usize,

    gets: AtomicU64,
    puts: AtomicU64,
    allocs: AtomicU64,
    resizes: AtomicU64,
}

/// Snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolStats {
    /// Buffers handed out since creation (or the last reset)
    pub gets: u64,
    /// Buffers returned
    pub puts: u64,
    /// Buffers that had to be allocated because nothing in the pool fit
    pub allocs: u64,
    /// Allocations that grew past the default capacity
    pub resizes: u64,
    /// Buffers currently held by consumers (`gets - puts`)
    pub outstanding: u64,
    /// Fraction of gets served without allocating
    pub hit_rate: f64,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gets={} puts={} allocs={} resizes={} outstanding={} hit_rate={:.2}",
            self.gets, self.puts, self.allocs, self.resizes, self.outstanding, self.hit_rate
        )
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_default_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// A pool whose fresh allocations start at `capacity` bytes unless the
    /// requested size forces more.
    pub fn with_default_capacity(capacity: usize) -> Self {
        BufferPool {
            free: Mutex::new(Vec::new()),
            default_capacity: capacity,
            gets: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            allocs: AtomicU64::new(0),
            resizes: AtomicU64::new(0),
        }
    }

    /// The process-wide pool used by devices that were not given their own.
    pub fn default_pool() -> &'static Arc<BufferPool> {
        static POOL: OnceLock<Arc<BufferPool>> = OnceLock::new();
        POOL.get_or_init(|| Arc::new(BufferPool::new()))
    }

    /// Returns a zeroed buffer of length `min_size`.
    ///
    /// A pooled buffer with sufficient capacity is reused when available;
    /// otherwise a new one is allocated with capacity
    /// `max(2 * min_size, default_capacity)`.
    pub fn get(&self, min_size: usize) -> Vec<u8> {
        self.gets.fetch_add(1, Ordering::Relaxed);

        {
            let mut free = self.free.lock().unwrap();
            if let Some(pos) = free.iter().position(|buf| buf.capacity() >= min_size) {
                let mut buf = free.swap_remove(pos);
                drop(free);
                buf.resize(min_size, 0);
                return buf;
            }
        }

        self.allocs.fetch_add(1, Ordering::Relaxed);
        let capacity = (2 * min_size).max(self.default_capacity);
        if capacity > self.default_capacity {
            self.resizes.fetch_add(1, Ordering::Relaxed);
        }
        let mut buf = Vec::with_capacity(capacity);
        buf.resize(min_size, 0);
        buf
    }

    /// Returns a buffer to the pool for reuse.
    ///
    /// The buffer's length is reset to zero, its capacity is preserved.
    /// Zero-capacity buffers are dropped on the floor; there is nothing to
    /// reuse.
    pub fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() == 0 {
            return;
        }
        buf.clear();
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.free.lock().unwrap().push(buf);
    }

    pub fn stats(&self) -> PoolStats {
        let gets = self.gets.load(Ordering::Relaxed);
        let puts = self.puts.load(Ordering::Relaxed);
        let allocs = self.allocs.load(Ordering::Relaxed);
        let resizes = self.resizes.load(Ordering::Relaxed);
        PoolStats {
            gets,
            puts,
            allocs,
            resizes,
            outstanding: gets.saturating_sub(puts),
            hit_rate: if gets == 0 {
                0.0
            } else {
                (gets.saturating_sub(allocs) as f64 / gets as f64).clamp(0.0, 1.0)
            },
        }
    }

    /// Zeroes the counters. Pooled buffers stay available for reuse.
    pub fn reset(&self) {
        self.gets.store(0, Ordering::Relaxed);
        self.puts.store(0, Ordering::Relaxed);
        self.allocs.store(0, Ordering::Relaxed);
        self.resizes.store(0, Ordering::Relaxed);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_returned_buffers() {
        let pool = BufferPool::new();

        let buf = pool.get(1024);
        assert_eq!(buf.len(), 1024);
        pool.put(buf);

        let buf = pool.get(512);
        assert_eq!(buf.len(), 512);

        let stats = pool.stats();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.allocs, 1);
        assert_eq!(stats.outstanding, 1);
    }

    #[test]
    fn grows_past_the_default_capacity_when_needed() {
        let pool = BufferPool::with_default_capacity(64);

        let small = pool.get(16);
        assert!(small.capacity() >= 16);

        let large = pool.get(4096);
        assert!(large.capacity() >= 8192);

        let stats = pool.stats();
        assert_eq!(stats.allocs, 2);
        assert_eq!(stats.resizes, 1);
    }

    #[test]
    fn small_requests_are_served_from_larger_pooled_buffers() {
        let pool = BufferPool::with_default_capacity(64);
        pool.put(Vec::with_capacity(4096));

        let buf = pool.get(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.capacity() >= 4096);
        assert_eq!(pool.stats().allocs, 0);
    }

    #[test]
    fn zero_capacity_put_is_a_no_op() {
        let pool = BufferPool::new();
        pool.put(Vec::new());
        assert_eq!(pool.stats().puts, 0);
    }

    #[test]
    fn returned_buffers_come_back_empty() {
        let pool = BufferPool::new();
        let mut buf = pool.get(8);
        buf.fill(0xaa);
        pool.put(buf);

        let buf = pool.get(8);
        assert_eq!(&buf[..], &[0u8; 8]);
    }

    #[test]
    fn reset_clears_counters_but_keeps_buffers() {
        let pool = BufferPool::with_default_capacity(64);
        let buf = pool.get(32);
        pool.put(buf);
        pool.reset();

        assert_eq!(pool.stats(), PoolStats {
            gets: 0,
            puts: 0,
            allocs: 0,
            resizes: 0,
            outstanding: 0,
            hit_rate: 0.0,
        });

        // The pooled buffer survives the reset.
        pool.get(32);
        assert_eq!(pool.stats().allocs, 0);
    }

    #[test]
    fn hit_rate_stays_within_unit_interval() {
        let pool = BufferPool::new();
        assert_eq!(pool.stats().hit_rate, 0.0);

        let a = pool.get(16);
        pool.put(a);
        let _b = pool.get(16);

        let rate = pool.stats().hit_rate;
        assert!((0.0..=1.0).contains(&rate));
        assert_eq!(rate, 0.5);
    }
}
