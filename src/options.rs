use std::sync::Arc;

use crate::buffer;
use crate::format::Format;
use crate::memory::Memory;
use crate::pool::BufferPool;

/// Builder-style configuration applied when opening a device.
///
/// # Example
///
/// ```
/// use v4l2_stream::{Format, FourCC, Options};
///
/// let options = Options::new()
///     .buffer_count(4)
///     .pixel_format(Format::new(640, 480, FourCC::new(b"YUYV")))
///     .fps(30);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) buffer_count: u32,
    pub(crate) format: Option<Format>,
    pub(crate) fps: Option<u32>,
    pub(crate) io_type: Memory,
    pub(crate) buffer_type: Option<buffer::Type>,
    pub(crate) pool: Option<Arc<BufferPool>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            buffer_count: 0,
            format: None,
            fps: None,
            io_type: Memory::Mmap,
            buffer_type: None,
            pool: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Desired number of in-flight kernel buffers.
    ///
    /// Zero (the default) means "pick a default", currently 2. The driver
    /// may grant fewer buffers than requested.
    pub fn buffer_count(mut self, count: u32) -> Self {
        self.buffer_count = count;
        self
    }

    /// Pixel format to negotiate during open. Without it, the device's
    /// current format is read and kept.
    pub fn pixel_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Frame rate in frames per second, applied through the stream
    /// parameters after format negotiation.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// I/O memory model. Reserved: only [`Memory::Mmap`] is honored, and it
    /// is forced regardless of this setting.
    pub fn io_type(mut self, io_type: Memory) -> Self {
        self.io_type = io_type;
        self
    }

    /// Pins the buffer type instead of auto-detecting it from the device
    /// capabilities. Opening fails if the pinned type disagrees with what
    /// the device supports.
    pub fn buffer_type(mut self, buffer_type: buffer::Type) -> Self {
        self.buffer_type = Some(buffer_type);
        self
    }

    /// Buffer pool backing delivered frames. Defaults to the process-wide
    /// pool.
    pub fn pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::FourCC;

    #[test]
    fn defaults_leave_everything_unset() {
        let options = Options::new();
        assert_eq!(options.buffer_count, 0);
        assert!(options.format.is_none());
        assert!(options.fps.is_none());
        assert_eq!(options.io_type, Memory::Mmap);
        assert!(options.buffer_type.is_none());
        assert!(options.pool.is_none());
    }

    #[test]
    fn builder_accumulates_settings() {
        let options = Options::new()
            .buffer_count(4)
            .pixel_format(Format::new(1280, 720, FourCC::new(b"MJPG")))
            .fps(60)
            .buffer_type(buffer::Type::VideoCapture);

        assert_eq!(options.buffer_count, 4);
        assert_eq!(options.format.unwrap().width, 1280);
        assert_eq!(options.fps, Some(60));
        assert_eq!(options.buffer_type, Some(buffer::Type::VideoCapture));
    }
}
