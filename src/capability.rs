use bitflags::bitflags;
use std::fmt;

use v4l2_sys::v4l2_capability;

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x00000001;
        const VIDEO_OUTPUT          = 0x00000002;
        const VIDEO_OVERLAY         = 0x00000004;
        const VBI_CAPTURE           = 0x00000010;
        const VBI_OUTPUT            = 0x00000020;
        const SLICED_VBI_CAPTURE    = 0x00000040;
        const SLICED_VBI_OUTPUT     = 0x00000080;
        const RDS_CAPTURE           = 0x00000100;
        const VIDEO_OUTPUT_OVERLAY  = 0x00000200;
        const HW_FREQ_SEEK          = 0x00000400;
        const RDS_OUTPUT            = 0x00000800;

        const VIDEO_CAPTURE_MPLANE  = 0x00001000;
        const VIDEO_OUTPUT_MPLANE   = 0x00002000;
        const VIDEO_M2M_MPLANE      = 0x00004000;
        const VIDEO_M2M             = 0x00008000;

        const TUNER                 = 0x00010000;
        const AUDIO                 = 0x00020000;
        const RADIO                 = 0x00040000;
        const MODULATOR             = 0x00080000;

        const SDR_CAPTURE           = 0x00100000;
        const EXT_PIX_FORMAT        = 0x00200000;
        const SDR_OUTPUT            = 0x00400000;
        const META_CAPTURE          = 0x00800000;

        const READ_WRITE            = 0x01000000;
        const ASYNC_IO              = 0x02000000;
        const STREAMING             = 0x04000000;
        const META_OUTPUT           = 0x08000000;

        const TOUCH                 = 0x10000000;

        const DEVICE_CAPS           = 0x80000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_truncate(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Device capabilities, queried once at open and never mutated.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capabilities of the physical device as a whole
    pub capabilities: Flags,
    /// Capabilities of the opened device node
    pub device_caps: Flags,
}

impl Capabilities {
    /// The flags that apply to the node that was actually opened.
    ///
    /// Multi-function devices report per-node capabilities in `device_caps`;
    /// older drivers only fill the device-wide mask.
    pub fn node_caps(&self) -> Flags {
        if self.capabilities.contains(Flags::DEVICE_CAPS) {
            self.device_caps
        } else {
            self.capabilities
        }
    }

    /// Whether the opened node can capture video frames.
    pub fn supports_video_capture(&self) -> bool {
        self.node_caps().contains(Flags::VIDEO_CAPTURE)
    }

    /// Whether the opened node can output video frames.
    pub fn supports_video_output(&self) -> bool {
        self.node_caps().contains(Flags::VIDEO_OUTPUT)
    }

    /// Whether the opened node supports streaming (queue/dequeue) I/O.
    pub fn supports_streaming(&self) -> bool {
        self.node_caps().contains(Flags::STREAMING)
    }
}

// Fixed-size, NUL-padded string fields of the kernel struct.
fn fixed_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        Self {
            driver: fixed_string(&cap.driver),
            card: fixed_string(&cap.card),
            bus: fixed_string(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            capabilities: Flags::from(cap.capabilities),
            device_caps: Flags::from(cap.device_caps),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilities: {}", self.capabilities)?;
        writeln!(f, "Device caps : {}", self.device_caps)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(capabilities: u32, device_caps: u32) -> Capabilities {
        Capabilities {
            driver: "uvcvideo".into(),
            card: "test cam".into(),
            bus: "usb-0000:00:14.0-1".into(),
            version: (6, 1, 0),
            capabilities: Flags::from(capabilities),
            device_caps: Flags::from(device_caps),
        }
    }

    #[test]
    fn node_caps_prefer_device_caps_when_advertised() {
        let c = caps(
            (Flags::DEVICE_CAPS | Flags::VIDEO_CAPTURE | Flags::VIDEO_OUTPUT | Flags::STREAMING)
                .bits(),
            (Flags::VIDEO_CAPTURE | Flags::STREAMING).bits(),
        );
        assert!(c.supports_video_capture());
        assert!(!c.supports_video_output());
        assert!(c.supports_streaming());
    }

    #[test]
    fn node_caps_fall_back_to_device_wide_mask() {
        let c = caps((Flags::VIDEO_OUTPUT | Flags::STREAMING).bits(), 0);
        assert!(!c.supports_video_capture());
        assert!(c.supports_video_output());
        assert!(c.supports_streaming());
    }

    #[test]
    fn fixed_strings_stop_at_nul() {
        let mut raw = [0u8; 16];
        raw[..4].copy_from_slice(b"uvc\0");
        assert_eq!(fixed_string(&raw), "uvc");
    }
}
