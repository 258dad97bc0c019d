//! Typed helpers for the VIDIOC requests used by the streaming core.
//!
//! Each helper zero-initializes the kernel argument struct, fills in the
//! fields the request reads, issues the ioctl through the
//! [`v4l2`](crate::v4l2) gateway and converts the result into crate types.
//! Errors are wrapped with the name of the failed request, except for
//! [`dequeue_buffer`] which hands `EAGAIN` through untouched so the capture
//! loop can treat it as a spurious wakeup.

use std::os::raw::{c_int, c_void};
use std::{io, mem, ptr};

use v4l2_sys::{
    v4l2_buffer, v4l2_capability, v4l2_crop, v4l2_cropcap, v4l2_fmtdesc, v4l2_format,
    v4l2_requestbuffers, v4l2_streamparm,
};

use crate::buffer;
use crate::capability::Capabilities;
use crate::error::{Error, Result};
use crate::format::{Description, Format};
use crate::memory::Memory;
use crate::params::Parameters;
use crate::timestamp::Timestamp;
use crate::v4l2::{self, vidioc};

pub fn query_capability(fd: c_int) -> Result<Capabilities> {
    let mut caps: v4l2_capability = unsafe { mem::zeroed() };
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_QUERYCAP,
            ptr::addr_of_mut!(caps).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_QUERYCAP", e))?;
    Ok(Capabilities::from(caps))
}

/// Reads the format currently configured for `buf_type`.
pub fn pixel_format(fd: c_int, buf_type: buffer::Type) -> Result<Format> {
    let mut fmt: v4l2_format = unsafe { mem::zeroed() };
    fmt.type_ = buf_type as u32;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_G_FMT,
            ptr::addr_of_mut!(fmt).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_G_FMT", e))?;
    Ok(Format::from(unsafe { fmt.fmt.pix }))
}

/// Writes a format and returns what the driver actually granted.
///
/// The kernel is allowed to round width, height, stride and image size to
/// hardware-feasible values; the configured format is re-read so the caller
/// learns the granted values.
pub fn set_pixel_format(fd: c_int, buf_type: buffer::Type, format: &Format) -> Result<Format> {
    let mut fmt: v4l2_format = unsafe { mem::zeroed() };
    fmt.type_ = buf_type as u32;
    format.fill(unsafe { &mut fmt.fmt.pix });
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_S_FMT,
            ptr::addr_of_mut!(fmt).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_S_FMT", e))?;

    pixel_format(fd, buf_type)
}

/// Enumerates the pixel formats the driver offers for `buf_type`.
///
/// The kernel terminates the enumeration by returning `EINVAL` for the first
/// index past the end.
pub fn format_descriptions(fd: c_int, buf_type: buffer::Type) -> Result<Vec<Description>> {
    let mut descriptions = Vec::new();

    for index in 0.. {
        let mut desc: v4l2_fmtdesc = unsafe { mem::zeroed() };
        desc.index = index;
        desc.type_ = buf_type as u32;

        match unsafe {
            v4l2::ioctl(
                fd,
                vidioc::VIDIOC_ENUM_FMT,
                ptr::addr_of_mut!(desc).cast::<c_void>(),
            )
        } {
            Ok(()) => descriptions.push(Description::from(desc)),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => break,
            Err(e) => return Err(Error::ioctl("VIDIOC_ENUM_FMT", e)),
        }
    }

    Ok(descriptions)
}

pub fn stream_params(fd: c_int, buf_type: buffer::Type) -> Result<Parameters> {
    let mut parm: v4l2_streamparm = unsafe { mem::zeroed() };
    parm.type_ = buf_type as u32;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_G_PARM,
            ptr::addr_of_mut!(parm).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_G_PARM", e))?;

    Ok(match buf_type {
        buffer::Type::VideoCapture => Parameters::from(unsafe { parm.parm.capture }),
        buffer::Type::VideoOutput => Parameters::from(unsafe { parm.parm.output }),
    })
}

/// Writes stream parameters and returns what the driver granted after
/// rounding the frame interval.
pub fn set_stream_params(
    fd: c_int,
    buf_type: buffer::Type,
    params: &Parameters,
) -> Result<Parameters> {
    let mut parm: v4l2_streamparm = unsafe { mem::zeroed() };
    parm.type_ = buf_type as u32;
    match buf_type {
        buffer::Type::VideoCapture => parm.parm.capture = (*params).into(),
        buffer::Type::VideoOutput => parm.parm.output = (*params).into(),
    }
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_S_PARM,
            ptr::addr_of_mut!(parm).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_S_PARM", e))?;

    stream_params(fd, buf_type)
}

/// Asks the driver to allocate `count` buffers and returns the granted
/// count, which the driver may reduce.
pub fn request_buffers(
    fd: c_int,
    buf_type: buffer::Type,
    memory: Memory,
    count: u32,
) -> Result<u32> {
    let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
    req.count = count;
    req.type_ = buf_type as u32;
    req.memory = memory as u32;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_REQBUFS,
            ptr::addr_of_mut!(req).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_REQBUFS", e))?;
    Ok(req.count)
}

/// Queries one buffer slot and returns its `(offset, length)` for mmap.
pub fn query_buffer(
    fd: c_int,
    buf_type: buffer::Type,
    memory: Memory,
    index: u32,
) -> Result<(u32, usize)> {
    let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
    buf.type_ = buf_type as u32;
    buf.memory = memory as u32;
    buf.index = index;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_QUERYBUF,
            ptr::addr_of_mut!(buf).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_QUERYBUF", e))?;
    Ok((unsafe { buf.m.offset }, buf.length as usize))
}

/// Hands the slot at `index` to the driver to be filled (capture) or
/// drained (output).
pub fn queue_buffer(fd: c_int, buf_type: buffer::Type, memory: Memory, index: u32) -> Result<()> {
    let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
    buf.type_ = buf_type as u32;
    buf.memory = memory as u32;
    buf.index = index;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_QBUF,
            ptr::addr_of_mut!(buf).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_QBUF", e))
}

/// Reclaims a slot from the driver's outgoing queue.
///
/// On a non-blocking descriptor this fails with
/// [`io::ErrorKind::WouldBlock`] when no buffer is ready; callers must treat
/// that as "try again", not as an error.
pub fn dequeue_buffer(
    fd: c_int,
    buf_type: buffer::Type,
    memory: Memory,
) -> io::Result<buffer::Metadata> {
    let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
    buf.type_ = buf_type as u32;
    buf.memory = memory as u32;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_DQBUF,
            ptr::addr_of_mut!(buf).cast::<c_void>(),
        )?;
    }

    Ok(buffer::Metadata {
        index: buf.index,
        bytesused: buf.bytesused,
        flags: buffer::Flags::from(buf.flags),
        timestamp: Timestamp::from(buf.timestamp),
        sequence: buf.sequence,
    })
}

pub fn stream_on(fd: c_int, buf_type: buffer::Type) -> Result<()> {
    let mut typ = buf_type as c_int;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_STREAMON,
            ptr::addr_of_mut!(typ).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_STREAMON", e))
}

/// Stops streaming. The kernel guarantees that all queued buffers are
/// returned to user space, which the teardown path relies on.
pub fn stream_off(fd: c_int, buf_type: buffer::Type) -> Result<()> {
    let mut typ = buf_type as c_int;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_STREAMOFF,
            ptr::addr_of_mut!(typ).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_STREAMOFF", e))
}

/// Resets the crop rectangle to the driver-reported default.
///
/// Callers treat this as best-effort; devices without crop support fail the
/// CROPCAP query and the error is ignored upstream.
pub fn reset_crop(fd: c_int, buf_type: buffer::Type) -> Result<()> {
    let mut cropcap: v4l2_cropcap = unsafe { mem::zeroed() };
    cropcap.type_ = buf_type as u32;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_CROPCAP,
            ptr::addr_of_mut!(cropcap).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_CROPCAP", e))?;

    let mut crop: v4l2_crop = unsafe { mem::zeroed() };
    crop.type_ = buf_type as u32;
    crop.c = cropcap.defrect;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_S_CROP,
            ptr::addr_of_mut!(crop).cast::<c_void>(),
        )
    }
    .map_err(|e| Error::ioctl("VIDIOC_S_CROP", e))
}
