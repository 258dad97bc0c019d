//! Raw bindings to the v4l2 kernel UAPI (`<linux/videodev2.h>`).
//!
//! Generated at build time with bindgen so the struct layouts always match
//! the headers of the build host.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/v4l2_bindings.rs"));
