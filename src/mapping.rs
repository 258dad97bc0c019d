use std::os::raw::c_int;
use std::{io, slice};

use crate::v4l2;

/// One memory-mapped kernel buffer slot.
///
/// The backing memory is owned by the kernel; this type only owns the
/// mapping, which is released on drop. The view must not be read after the
/// stream that produced it has been torn down, which the device core
/// enforces by only handing out references while streaming is active.
pub(crate) struct MappedBuffer {
    ptr: *mut u8,
    len: usize,
}

// The mapping is a plain byte region; the raw pointer is only ever
// dereferenced through `as_slice`, and the device core serializes creation
// and destruction against the capture task.
unsafe impl Send for MappedBuffer {}
unsafe impl Sync for MappedBuffer {}

impl MappedBuffer {
    /// Maps `length` bytes of the device file at `offset`.
    pub(crate) fn new(fd: c_int, offset: u32, length: usize) -> io::Result<Self> {
        let ptr = unsafe { v4l2::mmap(length, fd, libc::off_t::from(offset))? };
        Ok(MappedBuffer {
            ptr: ptr.cast(),
            len: length,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        if let Err(err) = unsafe { v4l2::munmap(self.ptr.cast(), self.len) } {
            log::error!("failed to unmap kernel buffer: {err}");
        }
    }
}
