//! Pool behavior under concurrent producers and consumers, the way the
//! capture task and frame consumers use it at runtime.

use std::sync::Arc;
use std::thread;

use v4l2_stream::BufferPool;

#[test]
fn accounting_stays_consistent_under_contention() {
    let pool = Arc::new(BufferPool::new());
    let mut handles = Vec::new();

    for worker in 0..8 {
        let pool = pool.clone();
        handles.push(thread::spawn(move || {
            for i in 0..250 {
                let size = 1024 * (1 + (worker + i) % 7);
                let buf = pool.get(size);
                assert_eq!(buf.len(), size);
                pool.put(buf);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.gets, 8 * 250);
    assert_eq!(stats.puts, 8 * 250);
    assert_eq!(stats.outstanding, 0);
    assert!((0.0..=1.0).contains(&stats.hit_rate));
}

#[test]
fn outstanding_tracks_buffers_held_by_consumers() {
    let pool = BufferPool::new();

    let held: Vec<Vec<u8>> = (0..4).map(|_| pool.get(640 * 480 * 2)).collect();
    assert_eq!(pool.stats().outstanding, 4);

    for buf in held {
        pool.put(buf);
    }
    assert_eq!(pool.stats().outstanding, 0);
}

#[test]
fn reuse_across_varying_frame_sizes_avoids_fresh_allocations() {
    let pool = BufferPool::new();

    // Prime the pool with one large frame buffer.
    pool.put(pool.get(1920 * 1080 * 2));
    pool.reset();

    // Every subsequent smaller frame fits in the pooled buffer.
    for size in [640 * 480 * 2, 1280 * 720 * 2, 320 * 240 * 2] {
        let buf = pool.get(size);
        assert_eq!(buf.len(), size);
        pool.put(buf);
    }

    let stats = pool.stats();
    assert_eq!(stats.allocs, 0);
    assert_eq!(stats.hit_rate, 1.0);
}
