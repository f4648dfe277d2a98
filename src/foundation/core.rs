use crate::foundation::error::{CaptureError, CaptureResult};

/// 0-based index of a frame within one encoded stream.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> CaptureResult<Self> {
        if den == 0 {
            return Err(CaptureError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(CaptureError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Duration of one frame as a [`Timestamp`] in this rate's timescale.
    pub fn frame_duration(self) -> Timestamp {
        Timestamp {
            value: u64::from(self.den),
            timescale: self.num,
        }
    }

    /// Presentation timestamp of frame `idx`: exactly `idx × frame_duration`.
    pub fn timestamp_of(self, idx: FrameIndex) -> Timestamp {
        Timestamp {
            value: idx.0.saturating_mul(u64::from(self.den)),
            timescale: self.num,
        }
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 60, den: 1 }
    }
}

/// Rational presentation time: `value / timescale` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Timestamp {
    /// Tick count.
    pub value: u64,
    /// Ticks per second.
    pub timescale: u32,
}

impl Timestamp {
    /// Timestamp zero in the given timescale.
    pub fn zero(timescale: u32) -> Self {
        Self {
            value: 0,
            timescale,
        }
    }

    /// Convert to seconds.
    pub fn as_secs_f64(self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.value as f64 / f64::from(self.timescale)
    }
}

/// Pixel dimensions of a bitmap or an encoded stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Create a pixel size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Return `true` when either side is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes of a tightly packed 4-channel 8-bit buffer of this size.
    pub fn rgba8_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }

    /// Round both sides down to even values (minimum 2), as required by 4:2:0 chroma subsampling.
    pub fn even_floor(self) -> Self {
        Self {
            width: (self.width & !1).max(2),
            height: (self.height & !1).max(2),
        }
    }
}

impl std::fmt::Display for PixelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
