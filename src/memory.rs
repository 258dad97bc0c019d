use std::fmt;

/// Memory model used for buffer exchange with the driver.
///
/// Only [`Memory::Mmap`] is currently honored; the other models are reserved
/// for future work.
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Mmap        = 1,
    UserPtr     = 2,
    DmaBuf      = 4,
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Memory::Mmap => write!(f, "memory-mapped"),
            Memory::UserPtr => write!(f, "user pointer"),
            Memory::DmaBuf => write!(f, "DMA buffered"),
        }
    }
}
