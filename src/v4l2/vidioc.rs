//! Request codes for the VIDIOC ioctls issued by this crate.
//!
//! The encoding mirrors `<linux/ioctl.h>`: a request code packs the transfer
//! direction, the magic byte (`'V'` for video), a request number and the size
//! of the argument struct. These values are part of the kernel ABI.

use std::mem::size_of;
use std::os::raw::c_int;

use v4l2_sys::{
    v4l2_buffer, v4l2_capability, v4l2_crop, v4l2_cropcap, v4l2_fmtdesc, v4l2_format,
    v4l2_requestbuffers, v4l2_streamparm,
};

#[cfg(not(target_env = "musl"))]
#[allow(non_camel_case_types)]
pub type RequestCode = std::os::raw::c_ulong;
#[cfg(target_env = "musl")]
#[allow(non_camel_case_types)]
pub type RequestCode = std::os::raw::c_int;

// linux ioctl.h
const NRBITS: u8 = 8;
const TYPEBITS: u8 = 8;
const SIZEBITS: u8 = 14;

const NRSHIFT: u8 = 0;
const TYPESHIFT: u8 = NRSHIFT + NRBITS;
const SIZESHIFT: u8 = TYPESHIFT + TYPEBITS;
const DIRSHIFT: u8 = SIZESHIFT + SIZEBITS;

const WRITE: u8 = 1;
const READ: u8 = 2;

const MAGIC: u8 = b'V';

const fn code(dir: u8, nr: u8, size: usize) -> RequestCode {
    ((dir as RequestCode) << DIRSHIFT)
        | ((MAGIC as RequestCode) << TYPESHIFT)
        | ((nr as RequestCode) << NRSHIFT)
        | ((size as RequestCode) << SIZESHIFT)
}

pub const VIDIOC_QUERYCAP: RequestCode = code(READ, 0, size_of::<v4l2_capability>());
pub const VIDIOC_ENUM_FMT: RequestCode = code(READ | WRITE, 2, size_of::<v4l2_fmtdesc>());
pub const VIDIOC_G_FMT: RequestCode = code(READ | WRITE, 4, size_of::<v4l2_format>());
pub const VIDIOC_S_FMT: RequestCode = code(READ | WRITE, 5, size_of::<v4l2_format>());
pub const VIDIOC_REQBUFS: RequestCode = code(READ | WRITE, 8, size_of::<v4l2_requestbuffers>());
pub const VIDIOC_QUERYBUF: RequestCode = code(READ | WRITE, 9, size_of::<v4l2_buffer>());
pub const VIDIOC_QBUF: RequestCode = code(READ | WRITE, 15, size_of::<v4l2_buffer>());
pub const VIDIOC_DQBUF: RequestCode = code(READ | WRITE, 17, size_of::<v4l2_buffer>());
pub const VIDIOC_STREAMON: RequestCode = code(WRITE, 18, size_of::<c_int>());
pub const VIDIOC_STREAMOFF: RequestCode = code(WRITE, 19, size_of::<c_int>());
pub const VIDIOC_G_PARM: RequestCode = code(READ | WRITE, 21, size_of::<v4l2_streamparm>());
pub const VIDIOC_S_PARM: RequestCode = code(READ | WRITE, 22, size_of::<v4l2_streamparm>());
pub const VIDIOC_CROPCAP: RequestCode = code(READ | WRITE, 58, size_of::<v4l2_cropcap>());
pub const VIDIOC_G_CROP: RequestCode = code(READ | WRITE, 59, size_of::<v4l2_crop>());
pub const VIDIOC_S_CROP: RequestCode = code(WRITE, 60, size_of::<v4l2_crop>());
