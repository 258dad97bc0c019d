use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::buffer::{self, Flags};
use crate::capability::Capabilities;
use crate::error::{Error, Result};
use crate::format::{Description, Format};
use crate::frame::Frame;
use crate::ioctl;
use crate::mapping::MappedBuffer;
use crate::memory::Memory;
use crate::options::Options;
use crate::params::Parameters;
use crate::pool::BufferPool;
use crate::v4l2;
use crate::wait::{self, DeviceFd, Readable};

/// How long [`Device::stop`] waits for the capture task to confirm exit
/// before proceeding with teardown.
const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// The error channel holds a single pending error; under a burst only the
/// first one survives. The channel is observational, not reliable delivery.
const ERROR_CHANNEL_CAPACITY: usize = 1;

/// Buffer count used when the caller did not configure one.
const DEFAULT_BUFFER_COUNT: u32 = 2;

const MODE_UNSET: u8 = 0;
const MODE_BYTES: u8 = 1;
const MODE_FRAMES: u8 = 2;

/// Owned device file descriptor.
///
/// Configuration ioctls and the capture task share the descriptor through
/// an `Arc<Handle>`; the kernel serializes concurrent ioctls on it. The
/// descriptor is closed when the last reference goes away. Kept internal so
/// all fd access stays on the crate's control and capture paths.
pub(crate) struct Handle {
    fd: c_int,
}

impl Handle {
    fn new(fd: c_int) -> Self {
        Handle { fd }
    }

    /// Returns the raw file descriptor.
    pub(crate) fn fd(&self) -> c_int {
        self.fd
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(err) = v4l2::close(self.fd) {
            log::error!("failed to close device descriptor: {err}");
        }
    }
}

/// State shared between the control path and the capture task.
struct Shared {
    handle: Arc<Handle>,
    buf_type: buffer::Type,
    memory: Memory,
    /// Primary stop signal; the capture task re-checks it between dequeueing
    /// a buffer and touching the mapped memory.
    streaming: AtomicBool,
    /// Claimed delivery mode for the current stream lifetime.
    mode: AtomicU8,
    /// Mapped kernel buffers, filled during start and cleared during stop.
    /// The capture task reads entries under the read lock; stop clears the
    /// vector under the write lock only after the task has exited (or the
    /// join timed out, in which case the lock itself prevents a
    /// use-after-unmap).
    buffers: RwLock<Vec<MappedBuffer>>,
}

enum Sink {
    Bytes(mpsc::Sender<Vec<u8>>),
    Frames {
        tx: mpsc::Sender<Frame>,
        pool: Arc<BufferPool>,
    },
}

/// A v4l2 capture or output device.
///
/// Configuration (open, format, frame rate, start, stop, close) is
/// single-threaded by contract: do not call these concurrently. Reading the
/// delivery and error channels from other tasks while configuring is fine.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use v4l2_stream::{Device, Options};
///
/// # async fn demo() -> v4l2_stream::Result<()> {
/// let mut dev = Device::open("/dev/video0", Options::new().buffer_count(4))?;
/// let mut frames = dev.request_frame_channel();
///
/// dev.start(&CancellationToken::new())?;
/// while let Some(mut frame) = frames.recv().await {
///     println!("frame {} ({} bytes)", frame.sequence(), frame.data().len());
///     frame.release();
/// }
/// dev.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct Device {
    path: PathBuf,
    handle: Arc<Handle>,
    capability: Capabilities,
    buf_type: buffer::Type,
    memory: Memory,
    options: Options,
    format: Format,
    params: Parameters,
    pool: Arc<BufferPool>,
    shared: Arc<Shared>,

    frame_tx: Option<mpsc::Sender<Frame>>,
    bytes_tx: Option<mpsc::Sender<Vec<u8>>>,
    error_tx: Option<mpsc::Sender<Error>>,
    error_rx: Option<mpsc::Receiver<Error>>,
    stop_token: Option<CancellationToken>,
    done: Option<oneshot::Receiver<()>>,
}

impl Device {
    /// Opens a device node and negotiates the configuration in `options`.
    ///
    /// The node is opened read-write and non-blocking. The device must
    /// support streaming I/O and either video capture or video output; the
    /// matching buffer type is detected from the capabilities unless pinned
    /// via [`Options::buffer_type`].
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fd =
            v4l2::open(&path, libc::O_RDWR | libc::O_NONBLOCK).map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
        let handle = Arc::new(Handle::new(fd));

        let mut options = options;
        if options.buffer_count == 0 {
            options.buffer_count = DEFAULT_BUFFER_COUNT;
        }

        // An early return drops `handle` and thereby closes the descriptor.
        let capability = ioctl::query_capability(handle.fd())?;
        if !capability.supports_streaming() {
            return Err(Error::UnsupportedFeature("streaming I/O"));
        }

        let buf_type = if capability.supports_video_capture() {
            buffer::Type::VideoCapture
        } else if capability.supports_video_output() {
            buffer::Type::VideoOutput
        } else {
            return Err(Error::UnsupportedFeature("video capture or output"));
        };
        if let Some(requested) = options.buffer_type {
            if requested != buf_type {
                return Err(Error::UnsupportedFeature(
                    "the requested buffer type on this node",
                ));
            }
        }

        // Only memory-mapped buffers are implemented.
        let memory = Memory::Mmap;

        // Best effort: put the crop rectangle back to the driver default so
        // a previous user of the node does not leak its crop into ours.
        if let Err(err) = ioctl::reset_crop(handle.fd(), buf_type) {
            log::debug!("crop reset skipped: {err}");
        }

        let format = match &options.format {
            Some(want) => ioctl::set_pixel_format(handle.fd(), buf_type, want)?,
            None => ioctl::pixel_format(handle.fd(), buf_type)?,
        };
        let params = match options.fps {
            Some(fps) => {
                ioctl::set_stream_params(handle.fd(), buf_type, &Parameters::with_fps(fps))?
            }
            None => ioctl::stream_params(handle.fd(), buf_type)?,
        };

        let pool = options
            .pool
            .clone()
            .unwrap_or_else(|| BufferPool::default_pool().clone());
        let shared = Arc::new(Shared {
            handle: handle.clone(),
            buf_type,
            memory,
            streaming: AtomicBool::new(false),
            mode: AtomicU8::new(MODE_UNSET),
            buffers: RwLock::new(Vec::new()),
        });

        log::debug!(
            "opened {} ({}, {}), {} {}x{}",
            path.display(),
            capability.driver,
            capability.card,
            format.fourcc,
            format.width,
            format.height,
        );

        Ok(Device {
            path,
            handle,
            capability,
            buf_type,
            memory,
            options,
            format,
            params,
            pool,
            shared,
            frame_tx: None,
            bytes_tx: None,
            error_tx: None,
            error_rx: None,
            stop_token: None,
            done: None,
        })
    }

    /// The path this device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capability snapshot taken at open.
    pub fn capability(&self) -> &Capabilities {
        &self.capability
    }

    /// The buffer type detected (or pinned) at open.
    pub fn buffer_type(&self) -> buffer::Type {
        self.buf_type
    }

    /// The configured in-flight buffer count. After a start this reflects
    /// what the driver actually granted.
    pub fn buffer_count(&self) -> u32 {
        self.options.buffer_count
    }

    /// The pool backing frames delivered by this device.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// The last negotiated pixel format.
    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Negotiates a new pixel format and returns what the driver granted,
    /// which may differ from the request by driver rounding.
    pub fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.format = ioctl::set_pixel_format(self.handle.fd(), self.buf_type, format)?;
        Ok(self.format)
    }

    /// Enumerates the pixel formats the driver offers.
    pub fn format_descriptions(&self) -> Result<Vec<Description>> {
        ioctl::format_descriptions(self.handle.fd(), self.buf_type)
    }

    /// Reads the current frame rate in frames per second.
    pub fn frame_rate(&mut self) -> Result<u32> {
        self.params = ioctl::stream_params(self.handle.fd(), self.buf_type)?;
        Ok(self.params.fps())
    }

    /// Requests a frame rate and returns what the driver granted after
    /// rounding the underlying frame interval.
    pub fn set_frame_rate(&mut self, fps: u32) -> Result<u32> {
        self.params =
            ioctl::set_stream_params(self.handle.fd(), self.buf_type, &Parameters::with_fps(fps))?;
        Ok(self.params.fps())
    }

    /// Claims the plain-bytes delivery mode and returns its channel.
    ///
    /// Each delivered item is a freshly allocated copy of one captured
    /// buffer; zero-length items signal driver stalls or error-flagged
    /// buffers. Exactly one delivery mode can be claimed per stream
    /// lifetime: if the frame mode was claimed first, the returned channel
    /// never receives anything.
    pub fn request_plain_bytes_channel(&mut self) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.delivery_capacity());
        if claim_mode(&self.shared.mode, MODE_BYTES) {
            self.bytes_tx = Some(tx);
        } else {
            abandon_sender(tx);
        }
        rx
    }

    /// Claims the frame delivery mode and returns its channel.
    ///
    /// Frames carry capture metadata and borrow their payload buffers from
    /// the device's pool. Exactly one delivery mode can be claimed per
    /// stream lifetime: if the plain-bytes mode was claimed first, the
    /// returned channel never receives anything.
    pub fn request_frame_channel(&mut self) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.delivery_capacity());
        if claim_mode(&self.shared.mode, MODE_FRAMES) {
            self.frame_tx = Some(tx);
        } else {
            abandon_sender(tx);
        }
        rx
    }

    /// Returns the channel streaming-path errors are published on.
    ///
    /// Call this once, before [`Device::start`]. The channel is closed when
    /// the capture task exits; closure of the delivery channel is the
    /// canonical end-of-stream signal either way.
    pub fn error_channel(&mut self) -> mpsc::Receiver<Error> {
        if let Some(rx) = self.error_rx.take() {
            return rx;
        }
        let (tx, rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        self.error_tx = Some(tx);
        rx
    }

    fn delivery_capacity(&self) -> usize {
        self.options.buffer_count.max(1) as usize
    }

    /// Starts streaming and spawns the capture task.
    ///
    /// A delivery mode must have been claimed first. Must be called from
    /// within a tokio runtime. Cancelling `cancel` makes the capture task
    /// exit on its next wakeup; [`Device::stop`] does the same internally.
    pub fn start(&mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.shared.streaming.swap(true, Ordering::AcqRel) {
            return Err(Error::Configuration("stream is already active"));
        }

        match self.start_inner(cancel) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shared.buffers.write().unwrap().clear();
                self.shared.streaming.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn start_inner(&mut self, cancel: &CancellationToken) -> Result<()> {
        let sink = match self.shared.mode.load(Ordering::Acquire) {
            MODE_BYTES => Sink::Bytes(self.bytes_tx.take().ok_or(Error::Configuration(
                "plain-bytes channel was consumed by an earlier start",
            ))?),
            MODE_FRAMES => Sink::Frames {
                tx: self.frame_tx.take().ok_or(Error::Configuration(
                    "frame channel was consumed by an earlier start",
                ))?,
                pool: self.pool.clone(),
            },
            _ => {
                return Err(Error::Configuration(
                    "no delivery mode selected: request a channel before starting",
                ))
            }
        };

        let fd = self.handle.fd();
        let afd = wait::register(fd).map_err(|e| Error::ioctl("EPOLL_CTL_ADD", e))?;

        let granted =
            ioctl::request_buffers(fd, self.buf_type, self.memory, self.options.buffer_count)?;
        self.options.buffer_count = granted;

        {
            let mut buffers = self.shared.buffers.write().unwrap();
            for index in 0..granted {
                let (offset, length) = ioctl::query_buffer(fd, self.buf_type, self.memory, index)?;
                buffers.push(MappedBuffer::new(fd, offset, length).map_err(Error::Map)?);
            }
        }

        for index in 0..granted {
            ioctl::queue_buffer(fd, self.buf_type, self.memory, index)?;
        }
        ioctl::stream_on(fd, self.buf_type)?;

        let error_tx = match self.error_tx.take() {
            Some(tx) => tx,
            None => {
                // Nobody asked for the error channel yet; keep the receiver
                // around in case they do later.
                let (tx, rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
                self.error_rx = Some(rx);
                tx
            }
        };

        let token = cancel.child_token();
        self.stop_token = Some(token.clone());
        let (done_tx, done_rx) = oneshot::channel();
        self.done = Some(done_rx);

        tokio::spawn(capture_task(
            self.shared.clone(),
            afd,
            sink,
            error_tx,
            token,
            done_tx,
        ));

        log::debug!("streaming started with {granted} kernel buffers");
        Ok(())
    }

    /// Stops streaming and releases the kernel buffers.
    ///
    /// Idempotent: stopping a device that is not streaming succeeds without
    /// touching it. Waits up to 500 ms for the capture task to exit before
    /// tearing down; the shared lock on the mapped buffers keeps a straggler
    /// task from touching unmapped memory even when the wait times out.
    pub async fn stop(&mut self) -> Result<()> {
        let streaming = self.shared.streaming.load(Ordering::Acquire);
        let mapped = !self.shared.buffers.read().unwrap().is_empty();
        if !streaming && !mapped {
            self.stop_token = None;
            self.done = None;
            return Ok(());
        }

        self.shared.streaming.store(false, Ordering::Release);
        if let Some(token) = self.stop_token.take() {
            token.cancel();
        }
        if let Some(done) = self.done.take() {
            if tokio::time::timeout(STOP_TIMEOUT, done).await.is_err() {
                log::warn!(
                    "capture task did not confirm exit within {STOP_TIMEOUT:?}, continuing teardown"
                );
            }
        }

        self.shared.buffers.write().unwrap().clear();

        // The mode reset and channel teardown below must run even when
        // stream-off fails; a mode left claimed here could never be reset.
        let result = ioctl::stream_off(self.handle.fd(), self.buf_type);
        self.shared.mode.store(MODE_UNSET, Ordering::Release);

        // Dropping stale channel ends lets the next start create new ones.
        self.frame_tx = None;
        self.bytes_tx = None;
        self.error_tx = None;
        self.error_rx = None;

        result?;
        log::debug!("streaming stopped");
        Ok(())
    }

    /// Stops streaming if necessary and closes the device.
    ///
    /// The descriptor is closed when the last internal reference is gone,
    /// which in the regular case is right here.
    pub async fn close(mut self) -> Result<()> {
        self.stop().await?;
        log::debug!("closed {}", self.path.display());
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.shared.streaming.load(Ordering::Acquire) {
            log::warn!(
                "{} dropped while streaming, cancelling the capture task",
                self.path.display()
            );
            self.shared.streaming.store(false, Ordering::Release);
            if let Some(token) = self.stop_token.take() {
                token.cancel();
            }
            // The capture task holds the shared state alive; mappings and
            // the descriptor are released once it observes the cancel.
        }
    }
}

fn claim_mode(mode: &AtomicU8, want: u8) -> bool {
    mode.compare_exchange(MODE_UNSET, want, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Keeps the channel open forever without ever sending.
///
/// Handed out when a second delivery mode is requested within one stream
/// lifetime; the receiver hangs instead of observing a close, which is the
/// documented misuse indication.
fn abandon_sender<T>(tx: mpsc::Sender<T>) {
    std::mem::forget(tx);
}

async fn capture_task(
    shared: Arc<Shared>,
    afd: AsyncFd<DeviceFd>,
    sink: Sink,
    error_tx: mpsc::Sender<Error>,
    cancel: CancellationToken,
    done: oneshot::Sender<()>,
) {
    let fd = shared.handle.fd();
    let buf_type = shared.buf_type;
    let memory = shared.memory;

    loop {
        let mut guard = match wait::wait_for_read(&afd, &cancel).await {
            Ok(Readable::Ready(guard)) => guard,
            Ok(Readable::Cancelled) => break,
            Err(err) => {
                let _ = error_tx.try_send(Error::ioctl("readiness wait", err));
                break;
            }
        };

        let slot = match guard.try_io(|_| ioctl::dequeue_buffer(fd, buf_type, memory)) {
            // EAGAIN: spurious wakeup; readiness was cleared, wait again.
            Err(_) => continue,
            Ok(Ok(slot)) => slot,
            Ok(Err(err)) => {
                let _ = error_tx.try_send(Error::ioctl("VIDIOC_DQBUF", err));
                break;
            }
        };
        drop(guard);

        if !deliver(&shared, &sink, &error_tx, &slot) {
            break;
        }

        // Recycle the slot so the driver never starves.
        if let Err(err) = ioctl::queue_buffer(fd, buf_type, memory, slot.index) {
            let _ = error_tx.try_send(err);
            break;
        }
    }

    shared.streaming.store(false, Ordering::Release);
    drop(sink); // closes the delivery channel
    drop(error_tx); // closes the error channel
    shared.mode.store(MODE_UNSET, Ordering::Release);
    drop(done); // resolves the capture-done signal
    log::debug!("capture task exited");
}

/// Classifies one dequeued slot and pushes it to the consumer.
///
/// Returns false when the task must exit because stop has begun and the
/// mapped memory can no longer be trusted.
fn deliver(
    shared: &Shared,
    sink: &Sink,
    error_tx: &mpsc::Sender<Error>,
    slot: &buffer::Metadata,
) -> bool {
    if slot.flags.contains(Flags::ERROR) {
        let _ = error_tx.try_send(Error::StreamData {
            index: slot.index,
            flags: slot.flags,
        });
        // Keep the plain-bytes consumer's cadence with an empty item.
        if let Sink::Bytes(tx) = sink {
            let _ = tx.try_send(Vec::new());
        }
        return true;
    }

    let valid = slot.flags.contains(Flags::MAPPED) && slot.bytesused > 0;
    if !valid {
        // Stall: nothing usable in the buffer.
        if let Sink::Bytes(tx) = sink {
            let _ = tx.try_send(Vec::new());
        }
        return true;
    }

    // Between the dequeue and this point, stop may have begun. Do not touch
    // the mappings once the flag has flipped; they are about to disappear.
    if !shared.streaming.load(Ordering::Acquire) {
        return false;
    }
    let buffers = match shared.buffers.read() {
        Ok(buffers) => buffers,
        Err(_) => return false,
    };
    let Some(mapped) = buffers.get(slot.index as usize) else {
        return false;
    };

    let used = (slot.bytesused as usize).min(mapped.len());
    let view = &mapped.as_slice()[..used];

    match sink {
        Sink::Bytes(tx) => {
            // Fresh heap copy: the consumer must never alias kernel memory.
            if let Err(err) = tx.try_send(view.to_vec()) {
                let bytes = match &err {
                    TrySendError::Full(data) | TrySendError::Closed(data) => data.len(),
                };
                let _ = error_tx.try_send(Error::Backpressure { bytes });
            }
        }
        Sink::Frames { tx, pool } => {
            let mut data = pool.get(used);
            data.copy_from_slice(view);
            let frame = Frame::new(data, slot, pool.clone());
            if let Err(err) = tx.try_send(frame) {
                let (TrySendError::Full(mut frame) | TrySendError::Closed(mut frame)) = err;
                let bytes = frame.data().len();
                frame.release();
                let _ = error_tx.try_send(Error::Backpressure { bytes });
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_is_claimed_exactly_once() {
        let mode = AtomicU8::new(MODE_UNSET);
        assert!(claim_mode(&mode, MODE_FRAMES));
        assert!(!claim_mode(&mode, MODE_BYTES));
        assert!(!claim_mode(&mode, MODE_FRAMES));

        mode.store(MODE_UNSET, Ordering::Release);
        assert!(claim_mode(&mode, MODE_BYTES));
    }

    #[test]
    fn abandoned_sender_keeps_the_channel_silent_but_open() {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1);
        abandon_sender(tx);

        // Never a message, never a close: the receiver only ever observes
        // an empty channel.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));
    }
}
