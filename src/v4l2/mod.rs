//! Thin wrappers around the system calls used to drive a v4l2 device node.
//!
//! Everything in here is synchronous; the streaming machinery on top decides
//! how the calls are scheduled. Errors are reported as the last OS error
//! (errno on Linux).

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::{io, path::Path, ptr};

pub mod vidioc;

/// Opens a device node.
///
/// Returns the raw file descriptor on success.
///
/// # Arguments
///
/// * `path` - Path to the device node
/// * `flags` - Open flags, e.g. `O_RDWR | O_NONBLOCK`
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<std::os::raw::c_int> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };

    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// Closes a previously opened file descriptor.
pub fn close(fd: std::os::raw::c_int) -> io::Result<()> {
    let ret = unsafe { libc::close(fd) };

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Issues an ioctl request on a device file descriptor.
///
/// Interrupted calls (`EINTR`) are retried transparently. `EAGAIN` is passed
/// through as [`io::ErrorKind::WouldBlock`] so callers on a non-blocking
/// descriptor can distinguish "try again" from real failures.
///
/// # Safety
///
/// `argp` must point to a properly initialized argument struct matching
/// `request`, as dictated by the kernel UAPI.
pub unsafe fn ioctl(
    fd: std::os::raw::c_int,
    request: vidioc::RequestCode,
    argp: *mut std::os::raw::c_void,
) -> io::Result<()> {
    loop {
        /*
         * The libc crate (and libc itself!) defines ioctl() with different,
         * incompatible argument types on different platforms. To hack around
         * this without conditional compilation, use syscall() instead as a
         * drop-in replacement. Details:
         * https://github.com/rust-lang/libc/issues/1036
         */
        let ret = libc::syscall(libc::SYS_ioctl, fd, request, argp) as std::os::raw::c_int;
        if ret != -1 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Maps `length` bytes of the device file at `offset` into the process.
///
/// The mapping is shared and readable + writable, as required for buffer
/// exchange with the driver.
///
/// # Safety
///
/// The returned pointer aliases kernel-owned memory; it must not be
/// dereferenced after [`munmap`] or after the stream owning the buffer is
/// torn down.
pub unsafe fn mmap(
    length: usize,
    fd: std::os::raw::c_int,
    offset: libc::off_t,
) -> io::Result<*mut std::os::raw::c_void> {
    let ptr = libc::mmap(
        ptr::null_mut(),
        length,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        offset,
    );

    if ptr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ptr)
    }
}

/// Releases a mapping created by [`mmap`].
///
/// # Safety
///
/// `start` must be the exact pointer returned by [`mmap`] and `length` the
/// length it was created with.
pub unsafe fn munmap(start: *mut std::os::raw::c_void, length: usize) -> io::Result<()> {
    let ret = libc::munmap(start, length);

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
