use std::{fmt, str};

/// Four character code identifying a pixel format, e.g. `YUYV` or `MJPG`.
///
/// The code is stored in the byte order the kernel expects: the first
/// character occupies the least significant byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC {
    repr: [u8; 4],
}

impl FourCC {
    /// Builds a code from its four ASCII characters.
    ///
    /// # Example
    ///
    /// ```
    /// use v4l2_stream::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// ```
    pub const fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }

    /// The four characters as a string slice, if they are valid UTF-8.
    pub fn str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.repr)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.str() {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "{:02x?}", self.repr),
        }
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC {
            repr: code.to_le_bytes(),
        }
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        u32::from_le_bytes(fourcc.repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_kernel_representation() {
        let fourcc = FourCC::new(b"YUYV");
        assert_eq!(FourCC::from(u32::from(fourcc)), fourcc);
        assert_eq!(fourcc.str().unwrap(), "YUYV");
    }

    #[test]
    fn character_order_matches_the_kernel() {
        // V4L2_PIX_FMT_YUYV from videodev2.h
        assert_eq!(u32::from(FourCC::new(b"YUYV")), 0x5659_5559);
    }
}
