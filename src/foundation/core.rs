use std::{collections::HashSet, fmt, sync::Arc};

use crate::foundation::{
    error::{PixooError, PixooResult},
    math::mul_div255_u8,
};

/// Edge length of the LED panel in pixels.
pub const PANEL_SIZE: u32 = 64;

/// Bytes per RGB8 pixel.
pub const RGB_CHANNELS: usize = 3;

/// Size of one panel frame in bytes (`64 * 64 * 3`).
pub const FRAME_BYTES: usize = (PANEL_SIZE as usize) * (PANEL_SIZE as usize) * RGB_CHANNELS;

/// Pipeline phase selecting which frame ceiling applies.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Producing a savable animation (wide ceiling).
    #[default]
    Conversion,
    /// Pushing an animation to the device in one session (tight ceiling).
    Transfer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion => f.write_str("conversion"),
            Self::Transfer => f.write_str("transfer"),
        }
    }
}

/// One decoded source frame of arbitrary dimensions, row-major RGB8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGB8 bytes, `width * height * 3` long.
    pub rgb8: Vec<u8>,
}

impl RawFrame {
    /// Wrap an RGB8 buffer, checking its length against the dimensions.
    pub fn new(width: u32, height: u32, rgb8: Vec<u8>) -> PixooResult<Self> {
        let expected = buffer_len(width, height, RGB_CHANNELS)?;
        if rgb8.len() != expected {
            return Err(PixooError::validation(format!(
                "raw frame {width}x{height} expects {expected} RGB8 bytes, got {}",
                rgb8.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgb8,
        })
    }

    /// Convert straight-alpha RGBA8 into RGB8 composited over black.
    ///
    /// Transparent regions end up dark, which is what an unlit LED shows.
    pub fn from_rgba8(width: u32, height: u32, rgba8: &[u8]) -> PixooResult<Self> {
        let expected = buffer_len(width, height, 4)?;
        if rgba8.len() != expected {
            return Err(PixooError::validation(format!(
                "raw frame {width}x{height} expects {expected} RGBA8 bytes, got {}",
                rgba8.len()
            )));
        }
        let mut rgb8 = Vec::with_capacity(expected / 4 * RGB_CHANNELS);
        for px in rgba8.chunks_exact(4) {
            let a = u16::from(px[3]);
            rgb8.push(mul_div255_u8(u16::from(px[0]), a));
            rgb8.push(mul_div255_u8(u16::from(px[1]), a));
            rgb8.push(mul_div255_u8(u16::from(px[2]), a));
        }
        Ok(Self {
            width,
            height,
            rgb8,
        })
    }

    /// Return `true` when the frame has no pixels.
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Return `true` when the frame already has panel dimensions.
    pub fn is_panel_sized(&self) -> bool {
        self.width == PANEL_SIZE && self.height == PANEL_SIZE
    }
}

fn buffer_len(width: u32, height: u32, channels: usize) -> PixooResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| PixooError::validation("frame buffer size overflow"))
}

/// Immutable 64x64 RGB8 panel frame.
///
/// Cloning is cheap; every pipeline stage builds new frames instead of editing existing ones.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    rgb8: Arc<Vec<u8>>,
}

impl Frame {
    /// Wrap a row-major RGB8 buffer of exactly [`FRAME_BYTES`] bytes.
    pub fn from_rgb8(rgb8: Vec<u8>) -> PixooResult<Self> {
        if rgb8.len() != FRAME_BYTES {
            return Err(PixooError::validation(format!(
                "panel frame expects {FRAME_BYTES} RGB8 bytes, got {}",
                rgb8.len()
            )));
        }
        Ok(Self {
            rgb8: Arc::new(rgb8),
        })
    }

    /// Frame filled with a single color.
    pub fn solid(rgb: [u8; 3]) -> Self {
        Self {
            rgb8: Arc::new(rgb.repeat(FRAME_BYTES / RGB_CHANNELS)),
        }
    }

    /// Row-major RGB8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.rgb8
    }

    /// Color at `(x, y)`; both coordinates must be below [`PANEL_SIZE`].
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        debug_assert!(
            x < PANEL_SIZE && y < PANEL_SIZE,
            "pixel ({x}, {y}) outside {PANEL_SIZE}x{PANEL_SIZE} frame"
        );
        let idx = ((y * PANEL_SIZE + x) as usize) * RGB_CHANNELS;
        [self.rgb8[idx], self.rgb8[idx + 1], self.rgb8[idx + 2]]
    }

    /// Iterate pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.rgb8.chunks_exact(RGB_CHANNELS).map(|p| [p[0], p[1], p[2]])
    }

    /// Copy into an `image` buffer.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(PANEL_SIZE, PANEL_SIZE, |x, y| image::Rgb(self.pixel(x, y)))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &format_args!("{PANEL_SIZE}x{PANEL_SIZE}"))
            .field("first_px", &self.pixel(0, 0))
            .finish()
    }
}

/// Ordered, non-empty list of panel frames sharing one frame duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    frame_duration_ms: u32,
}

impl FrameSequence {
    /// Build a sequence; rejects an empty frame list or a zero duration.
    pub fn new(frames: Vec<Frame>, frame_duration_ms: u32) -> PixooResult<Self> {
        if frames.is_empty() {
            return Err(PixooError::validation("frame sequence must not be empty"));
        }
        if frame_duration_ms == 0 {
            return Err(PixooError::validation("frame duration must be > 0 ms"));
        }
        Ok(Self {
            frames,
            frame_duration_ms,
        })
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false`; sequences are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Borrow the frames in order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Give up ownership of the frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Shared per-frame duration.
    pub fn frame_duration_ms(&self) -> u32 {
        self.frame_duration_ms
    }

    /// Total playback time of one loop.
    pub fn total_duration_ms(&self) -> u64 {
        u64::from(self.frame_duration_ms) * self.frames.len() as u64
    }

    /// Same frames with a different shared duration.
    pub fn with_frame_duration_ms(self, frame_duration_ms: u32) -> PixooResult<Self> {
        Self::new(self.frames, frame_duration_ms)
    }

    /// Reject the sequence when it holds more frames than `ceiling`.
    pub fn check_ceiling(&self, phase: Phase, ceiling: usize) -> PixooResult<()> {
        if self.frames.len() > ceiling {
            return Err(PixooError::ExceedsFrameCeiling {
                phase,
                frames: self.frames.len(),
                ceiling,
            });
        }
        Ok(())
    }

    /// Count distinct RGB values across every frame.
    pub fn distinct_colors(&self) -> usize {
        let mut seen = HashSet::<[u8; 3]>::new();
        for frame in &self.frames {
            seen.extend(frame.pixels());
        }
        seen.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
