//! This crate drives video4linux (v4l2) capture and output devices through
//! the kernel's streaming-I/O interface.
//!
//! Video devices on Linux are character special files such as "/dev/video0".
//! After opening one, a pixel format and frame rate are negotiated, a set of
//! kernel frame buffers is allocated and memory-mapped into the process, and
//! a capture task continuously exchanges those buffers with the driver:
//!
//! 1. device --[DMA]--> kernel buffer *i*
//! 2. capture task dequeues *i*, copies the payload, re-queues *i*
//! 3. the copy is delivered to the consumer over a bounded channel
//!
//! Payload copies are heap buffers borrowed from a [`BufferPool`], so a
//! delivered [`Frame`] stays valid however long the consumer holds it, while
//! the kernel buffer is already being filled with the next image. Delivery
//! uses non-blocking sends: a slow consumer causes frames to be dropped
//! (reported on the error channel) rather than stalling the driver.
//!
//! Only memory-mapped, single-planar streaming is implemented; user-pointer
//! and DMA-BUF I/O as well as the multi-planar formats are out of scope.
//!
//! Here is a very brief example of capturing a few frames:
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use v4l2_stream::{Device, Format, FourCC, Options};
//!
//! #[tokio::main]
//! async fn main() -> v4l2_stream::Result<()> {
//!     let mut dev = Device::open(
//!         "/dev/video0",
//!         Options::new()
//!             .buffer_count(4)
//!             .pixel_format(Format::new(640, 480, FourCC::new(b"YUYV")))
//!             .fps(30),
//!     )?;
//!
//!     let mut frames = dev.request_frame_channel();
//!     dev.start(&CancellationToken::new())?;
//!
//!     for _ in 0..10 {
//!         let Some(mut frame) = frames.recv().await else { break };
//!         println!(
//!             "frame {}: {} bytes at {}",
//!             frame.sequence(),
//!             frame.data().len(),
//!             frame.timestamp()
//!         );
//!         frame.release();
//!     }
//!
//!     dev.stop().await?;
//!     dev.close().await
//! }
//! ```

pub mod v4l2;

pub mod ioctl;

pub mod buffer;

mod capability;
pub use capability::Capabilities;

mod device;
pub use device::Device;

mod error;
pub use error::{Error, Result};

mod format;
pub use format::{Description, DescriptionFlags, FieldOrder, Format};

mod fourcc;
pub use fourcc::FourCC;

mod frame;
pub use frame::Frame;

mod mapping;

mod memory;
pub use memory::Memory;

mod options;
pub use options::Options;

mod params;
pub use params::{Fraction, Parameters};

mod pool;
pub use pool::{BufferPool, PoolStats};

mod timestamp;
pub use timestamp::Timestamp;

mod wait;
