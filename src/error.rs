use std::{io, path::PathBuf};

use thiserror::Error;

use crate::buffer;

pub type Result<T, E = self::Error> = std::result::Result<T, E>;

/// Everything that can go wrong when driving a device.
///
/// Configuration-path errors are returned synchronously; streaming-path
/// errors ([`Error::StreamData`], [`Error::Backpressure`] and fatal ioctl
/// failures inside the capture task) are published on the device's error
/// channel instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("device does not support {0}")]
    UnsupportedFeature(&'static str),

    #[error("{0}")]
    Configuration(&'static str),

    #[error("{name} failed: {source}")]
    Ioctl {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("memory mapping failed: {0}")]
    Map(#[source] io::Error),

    #[error("driver signaled corrupted data in buffer {index} (flags: {flags})")]
    StreamData { index: u32, flags: buffer::Flags },

    #[error("consumer too slow: dropped frame of {bytes} bytes")]
    Backpressure { bytes: usize },

    #[error("capture was cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn ioctl(name: &'static str, source: io::Error) -> Self {
        Error::Ioctl { name, source }
    }
}
