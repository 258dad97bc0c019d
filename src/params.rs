use bitflags::bitflags;
use std::{fmt, mem};

use v4l2_sys::{v4l2_captureparm, v4l2_fract, v4l2_outputparm};

/// Fraction used for timing settings, e.g. the seconds-per-frame interval.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    /// # Example
    ///
    /// ```
    /// use v4l2_stream::Fraction;
    /// let interval = Fraction::new(1, 30);
    /// ```
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Fraction {
            numerator,
            denominator,
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<v4l2_fract> for Fraction {
    fn from(frac: v4l2_fract) -> Self {
        Fraction {
            numerator: frac.numerator,
            denominator: frac.denominator,
        }
    }
}

impl From<Fraction> for v4l2_fract {
    fn from(frac: Fraction) -> Self {
        v4l2_fract {
            numerator: frac.numerator,
            denominator: frac.denominator,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParamCapabilities: u32 {
        #[allow(clippy::unreadable_literal)]
        const TIME_PER_FRAME    = 0x1000;
    }
}

impl From<u32> for ParamCapabilities {
    fn from(caps: u32) -> Self {
        Self::from_bits_truncate(caps)
    }
}

impl fmt::Display for ParamCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modes: u32 {
        const HIGH_QUALITY      = 0x1000;
    }
}

impl From<u32> for Modes {
    fn from(modes: u32) -> Self {
        Self::from_bits_truncate(modes)
    }
}

impl fmt::Display for Modes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Streaming parameters (single-planar).
///
/// The frame interval is a rational in seconds per frame; the driver may
/// round any value written to it.
#[derive(Debug, Clone, Copy)]
pub struct Parameters {
    pub capabilities: ParamCapabilities,
    pub modes: Modes,
    pub interval: Fraction,
}

impl Parameters {
    pub fn new(interval: Fraction) -> Self {
        Parameters {
            capabilities: ParamCapabilities::empty(),
            modes: Modes::empty(),
            interval,
        }
    }

    /// Parameters describing `fps` frames per second.
    pub fn with_fps(fps: u32) -> Self {
        Parameters::new(Fraction::new(1, fps))
    }

    /// The frame rate in frames per second, rounded down.
    ///
    /// Returns 0 for a degenerate interval.
    pub fn fps(&self) -> u32 {
        if self.interval.numerator == 0 {
            return 0;
        }
        self.interval.denominator / self.interval.numerator
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "capabilities : {}", self.capabilities)?;
        writeln!(f, "modes        : {}", self.modes)?;
        writeln!(f, "interval     : {} [s]", self.interval)?;
        Ok(())
    }
}

impl From<v4l2_captureparm> for Parameters {
    fn from(parm: v4l2_captureparm) -> Self {
        Parameters {
            capabilities: ParamCapabilities::from(parm.capability),
            modes: Modes::from(parm.capturemode),
            interval: Fraction::from(parm.timeperframe),
        }
    }
}

impl From<Parameters> for v4l2_captureparm {
    fn from(params: Parameters) -> Self {
        let mut parm: v4l2_captureparm = unsafe { mem::zeroed() };
        parm.capability = params.capabilities.bits();
        parm.capturemode = params.modes.bits();
        parm.timeperframe = params.interval.into();
        parm
    }
}

impl From<v4l2_outputparm> for Parameters {
    fn from(parm: v4l2_outputparm) -> Self {
        Parameters {
            capabilities: ParamCapabilities::from(parm.capability),
            modes: Modes::from(parm.outputmode),
            interval: Fraction::from(parm.timeperframe),
        }
    }
}

impl From<Parameters> for v4l2_outputparm {
    fn from(params: Parameters) -> Self {
        let mut parm: v4l2_outputparm = unsafe { mem::zeroed() };
        parm.capability = params.capabilities.bits();
        parm.outputmode = params.modes.bits();
        parm.timeperframe = params.interval.into();
        parm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_round_trips_through_the_interval() {
        assert_eq!(Parameters::with_fps(30).fps(), 30);
        assert_eq!(Parameters::new(Fraction::new(1, 25)).fps(), 25);
    }

    #[test]
    fn degenerate_interval_reports_zero_fps() {
        assert_eq!(Parameters::new(Fraction::new(0, 0)).fps(), 0);
    }
}
