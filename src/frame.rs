use std::fmt;
use std::sync::Arc;

use crate::buffer::{Flags, Metadata};
use crate::pool::BufferPool;
use crate::timestamp::Timestamp;

/// A captured frame delivered to the consumer.
///
/// The payload lives in a buffer borrowed from a [`BufferPool`] and is an
/// independent copy of the kernel buffer, so it stays valid across stream
/// reconfiguration and shutdown. Call [`Frame::release`] (or just drop the
/// frame) to hand the buffer back; after release the data is gone and
/// [`Frame::data`] returns an empty slice.
pub struct Frame {
    data: Option<Vec<u8>>,
    timestamp: Timestamp,
    sequence: u32,
    flags: Flags,
    index: u32,

    pool: Option<Arc<BufferPool>>,
    released: bool,
}

impl Frame {
    pub(crate) fn new(data: Vec<u8>, meta: &Metadata, pool: Arc<BufferPool>) -> Self {
        Frame {
            data: Some(data),
            timestamp: meta.timestamp,
            sequence: meta.sequence,
            flags: meta.flags,
            index: meta.index,
            pool: Some(pool),
            released: false,
        }
    }

    /// A frame that does not participate in pooling.
    ///
    /// Releasing such a frame is a no-op and keeps the data readable, which
    /// makes fabricated frames convenient in tests and synthetic pipelines.
    pub fn detached(data: Vec<u8>, meta: &Metadata) -> Self {
        Frame {
            data: Some(data),
            timestamp: meta.timestamp,
            sequence: meta.sequence,
            flags: meta.flags,
            index: meta.index,
            pool: None,
            released: false,
        }
    }

    /// The frame payload. Empty after [`Frame::release`].
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Time of capture as reported by the driver.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Monotonically increasing frame counter; gaps indicate frames dropped
    /// by the driver or by backpressure.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Raw driver flags of the originating buffer slot.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Index of the kernel buffer slot this frame was captured from.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_key_frame(&self) -> bool {
        self.flags.contains(Flags::KEYFRAME)
    }

    pub fn is_p_frame(&self) -> bool {
        self.flags.contains(Flags::PFRAME)
    }

    pub fn is_b_frame(&self) -> bool {
        self.flags.contains(Flags::BFRAME)
    }

    pub fn has_error(&self) -> bool {
        self.flags.contains(Flags::ERROR)
    }

    /// Returns the payload buffer to the pool and invalidates the data view.
    ///
    /// Idempotent: additional calls do nothing. Frames created without a
    /// pool keep their data (see [`Frame::detached`]).
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(pool) = &self.pool {
            if let Some(data) = self.data.take() {
                pool.put(data);
            }
            self.released = true;
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data().len())
            .field("sequence", &self.sequence)
            .field("index", &self.index)
            .field("flags", &self.flags)
            .field("timestamp", &self.timestamp)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(sequence: u32, flags: Flags) -> Metadata {
        Metadata {
            index: 1,
            bytesused: 4,
            flags,
            timestamp: Timestamp::new(10, 500),
            sequence,
        }
    }

    #[test]
    fn release_returns_the_buffer_exactly_once() {
        let pool = Arc::new(BufferPool::new());
        let data = pool.get(4);
        let mut frame = Frame::new(data, &meta(7, Flags::MAPPED), pool.clone());

        assert_eq!(frame.data().len(), 4);
        frame.release();
        frame.release();
        frame.release();

        assert!(frame.data().is_empty());
        let stats = pool.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.outstanding, 0);
    }

    #[test]
    fn drop_releases_implicitly() {
        let pool = Arc::new(BufferPool::new());
        {
            let data = pool.get(16);
            let _frame = Frame::new(data, &meta(1, Flags::MAPPED), pool.clone());
        }
        assert_eq!(pool.stats().outstanding, 0);
    }

    #[test]
    fn explicit_release_then_drop_puts_once() {
        let pool = Arc::new(BufferPool::new());
        {
            let data = pool.get(16);
            let mut frame = Frame::new(data, &meta(1, Flags::MAPPED), pool.clone());
            frame.release();
        }
        assert_eq!(pool.stats().puts, 1);
    }

    #[test]
    fn detached_frames_keep_their_data_across_release() {
        let mut frame = Frame::detached(vec![1, 2, 3], &meta(3, Flags::empty()));
        frame.release();
        assert_eq!(frame.data(), &[1, 2, 3]);
    }

    #[test]
    fn predicates_follow_the_flag_mask() {
        let frame = Frame::detached(vec![], &meta(0, Flags::KEYFRAME | Flags::ERROR));
        assert!(frame.is_key_frame());
        assert!(!frame.is_p_frame());
        assert!(!frame.is_b_frame());
        assert!(frame.has_error());
    }

    #[test]
    fn metadata_is_carried_through() {
        let frame = Frame::detached(vec![0; 8], &meta(42, Flags::MAPPED));
        assert_eq!(frame.sequence(), 42);
        assert_eq!(frame.index(), 1);
        assert_eq!(frame.timestamp(), Timestamp::new(10, 500));
    }
}
