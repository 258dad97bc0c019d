use bitflags::bitflags;
use std::{convert::TryFrom, fmt};

use v4l2_sys::{v4l2_fmtdesc, v4l2_pix_format};

use crate::fourcc::FourCC;

/// Represents how fields are interlaced (if they are)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum FieldOrder {
    /// Progressive, Top, Bottom, or Interlaced is acceptable; driver will pick one
    Any = 0,
    /// progressive, not interlaced
    Progressive = 1,
    /// top, or odd, field
    Top = 2,
    /// bottom, or even, field
    Bottom = 3,
    /// both fields interlaced
    Interlaced = 4,
    /// top field stored first, then bottom field
    SequentialTB = 5,
    /// bottom field stored first, then top field
    SequentialBT = 6,
    /// one field at a time, alternates between top and bottom
    Alternate = 7,
    /// both fields interlaced, starts with top
    InterlacedTB = 8,
    /// both fields interlaced, starts with bottom
    InterlacedBT = 9,
}

impl fmt::Display for FieldOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Progressive => "progressive",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Interlaced => "interlaced",
            Self::SequentialTB => "sequential, top then bottom",
            Self::SequentialBT => "sequential, bottom then top",
            Self::Alternate => "alternate between fields",
            Self::InterlacedTB => "interlaced, starting with top",
            Self::InterlacedBT => "interlaced, starting with bottom",
        };
        write!(f, "{}", name)
    }
}

impl TryFrom<u32> for FieldOrder {
    type Error = ();

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Any),
            1 => Ok(Self::Progressive),
            2 => Ok(Self::Top),
            3 => Ok(Self::Bottom),
            4 => Ok(Self::Interlaced),
            5 => Ok(Self::SequentialTB),
            6 => Ok(Self::SequentialBT),
            7 => Ok(Self::Alternate),
            8 => Ok(Self::InterlacedTB),
            9 => Ok(Self::InterlacedBT),
            _ => Err(()),
        }
    }
}

/// Streaming pixel format (single-planar).
///
/// The colorspace triple is carried as the raw kernel values; the driver
/// fills them in and this crate never interprets them.
#[derive(Debug, Clone, Copy)]
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// field order for interlacing
    pub field_order: FieldOrder,

    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store an image
    pub size: u32,

    /// supplements the pixelformat (fourcc) information
    pub colorspace: u32,
    /// the way colors are mapped
    pub quantization: u32,
    /// the transfer function for the colorspace
    pub xfer_func: u32,
}

impl Format {
    /// Returns a format suitable for passing to a set-format call.
    ///
    /// Stride, size and the colorspace metadata are left zeroed for the
    /// driver to fill in.
    ///
    /// # Example
    ///
    /// ```
    /// use v4l2_stream::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"YUYV"));
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            stride: 0,
            size: 0,
            colorspace: 0,
            quantization: 0,
            xfer_func: 0,
        }
    }

    pub(crate) fn fill(&self, pix: &mut v4l2_pix_format) {
        pix.width = self.width;
        pix.height = self.height;
        pix.pixelformat = self.fourcc.into();
        pix.field = self.field_order as u32;
        pix.bytesperline = self.stride;
        pix.sizeimage = self.size;
        pix.colorspace = self.colorspace;
        pix.quantization = self.quantization;
        pix.xfer_func = self.xfer_func;
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "field          : {}", self.field_order)?;
        writeln!(f, "stride         : {}", self.stride)?;
        writeln!(f, "size           : {}", self.size)?;
        writeln!(f, "colorspace     : {}", self.colorspace)?;
        writeln!(f, "quantization   : {}", self.quantization)?;
        writeln!(f, "transfer       : {}", self.xfer_func)?;
        Ok(())
    }
}

impl From<v4l2_pix_format> for Format {
    fn from(pix: v4l2_pix_format) -> Self {
        Self {
            width: pix.width,
            height: pix.height,
            fourcc: FourCC::from(pix.pixelformat),
            field_order: FieldOrder::try_from(pix.field).unwrap_or(FieldOrder::Any),
            stride: pix.bytesperline,
            size: pix.sizeimage,
            colorspace: pix.colorspace,
            quantization: pix.quantization,
            xfer_func: pix.xfer_func,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DescriptionFlags: u32 {
        const COMPRESSED            = 0x0001;
        const EMULATED              = 0x0002;
        const CONTINUOUS_BITSTREAM  = 0x0004;
        const DYN_RESOLUTION        = 0x0008;
    }
}

impl From<u32> for DescriptionFlags {
    fn from(flags: u32) -> Self {
        Self::from_bits_truncate(flags)
    }
}

impl fmt::Display for DescriptionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One entry of the driver's pixel format enumeration.
#[derive(Debug, Clone)]
pub struct Description {
    pub index: u32,
    pub flags: DescriptionFlags,
    pub description: String,
    pub fourcc: FourCC,
}

impl Description {
    /// Whether frames of this format carry a compressed bitstream.
    pub fn is_compressed(&self) -> bool {
        self.flags.contains(DescriptionFlags::COMPRESSED)
    }

    /// Whether the format is emulated in software rather than produced by
    /// the hardware.
    pub fn is_emulated(&self) -> bool {
        self.flags.contains(DescriptionFlags::EMULATED)
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}){}{}",
            self.index,
            self.fourcc,
            self.description,
            if self.is_compressed() { " compressed" } else { "" },
            if self.is_emulated() { " emulated" } else { "" },
        )
    }
}

impl From<v4l2_fmtdesc> for Description {
    fn from(desc: v4l2_fmtdesc) -> Self {
        let end = desc
            .description
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(desc.description.len());
        Self {
            index: desc.index,
            flags: DescriptionFlags::from(desc.flags),
            description: String::from_utf8_lossy(&desc.description[..end]).into_owned(),
            fourcc: FourCC::from(desc.pixelformat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_rejects_unknown_codes() {
        assert!(FieldOrder::try_from(10).is_err());
        assert_eq!(FieldOrder::try_from(1), Ok(FieldOrder::Progressive));
    }

    #[test]
    fn description_predicates_follow_the_flag_mask() {
        let desc = Description {
            index: 0,
            flags: DescriptionFlags::COMPRESSED,
            description: "Motion-JPEG".into(),
            fourcc: FourCC::new(b"MJPG"),
        };
        assert!(desc.is_compressed());
        assert!(!desc.is_emulated());
    }
}
