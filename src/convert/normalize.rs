use image::{RgbImage, imageops::FilterType};

use crate::{
    config::NormalizeConfig,
    foundation::{
        core::{FRAME_BYTES, Frame, FrameSequence, PANEL_SIZE, Phase, RGB_CHANNELS, RawFrame},
        error::{PixooError, PixooResult},
        math::clamp_u8,
    },
};

/// Frame count and shared duration requested from the normalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizeTarget {
    /// Upper bound on output frames. Fewer come out when the source is shorter.
    pub frame_count: usize,
    /// Shared duration stamped on the output sequence.
    pub frame_duration_ms: u32,
}

/// Resampling filter picked for a reshape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeFilter {
    /// Source already panel-sized; bytes copied as-is.
    Passthrough,
    /// Area averaging for large downscales.
    Area,
    /// Bilinear interpolation for modest scale changes.
    Smooth,
}

/// Turns decoded frames of any size and count into a bounded 64x64 [`FrameSequence`].
#[derive(Clone, Debug)]
pub struct FrameNormalizer<'a> {
    cfg: &'a NormalizeConfig,
    phase: Phase,
    ceiling: usize,
}

impl<'a> FrameNormalizer<'a> {
    /// Create a normalizer governed by the ceiling of `phase`.
    pub fn new(cfg: &'a NormalizeConfig, phase: Phase, ceiling: usize) -> Self {
        Self {
            cfg,
            phase,
            ceiling,
        }
    }

    /// Select frames at uniform stride and reshape each to panel size.
    #[tracing::instrument(skip_all, fields(phase = %self.phase, source_frames = source.len(), target = target.frame_count))]
    pub fn normalize(
        &self,
        source: &[RawFrame],
        target: NormalizeTarget,
    ) -> PixooResult<FrameSequence> {
        if source.is_empty() {
            return Err(PixooError::normalization("source has no frames"));
        }
        if target.frame_count == 0 {
            return Err(PixooError::normalization("target frame count must be > 0"));
        }
        if target.frame_duration_ms == 0 {
            return Err(PixooError::normalization("target frame duration must be > 0 ms"));
        }
        if target.frame_count > self.ceiling {
            return Err(PixooError::ExceedsFrameCeiling {
                phase: self.phase,
                frames: target.frame_count,
                ceiling: self.ceiling,
            });
        }

        let indices = select_uniform(source.len(), target.frame_count);
        let mut frames = Vec::with_capacity(indices.len());
        for idx in indices {
            let (frame, filter) = self.reshape(&source[idx]).map_err(|e| match e {
                PixooError::Normalization(msg) => {
                    PixooError::normalization(format!("source frame {idx}: {msg}"))
                }
                other => other,
            })?;
            tracing::trace!(idx, ?filter, "reshaped frame");
            frames.push(frame);
        }

        let seq = FrameSequence::new(frames, target.frame_duration_ms)
            .map_err(|e| PixooError::normalization(e.to_string()))?;
        seq.check_ceiling(self.phase, self.ceiling)?;
        tracing::debug!(frames = seq.len(), "normalized sequence");
        Ok(seq)
    }

    /// Reshape one source frame to 64x64.
    pub fn reshape(&self, raw: &RawFrame) -> PixooResult<(Frame, ResizeFilter)> {
        if raw.is_zero_area() {
            return Err(PixooError::normalization(format!(
                "frame has zero area ({}x{})",
                raw.width, raw.height
            )));
        }
        let expected = (raw.width as usize) * (raw.height as usize) * RGB_CHANNELS;
        if raw.rgb8.len() != expected {
            return Err(PixooError::normalization(format!(
                "frame {}x{} carries {} bytes, expected {expected}",
                raw.width,
                raw.height,
                raw.rgb8.len()
            )));
        }

        if raw.is_panel_sized() {
            return Ok((Frame::from_rgb8(raw.rgb8.clone())?, ResizeFilter::Passthrough));
        }

        let img = RgbImage::from_raw(raw.width, raw.height, raw.rgb8.clone())
            .ok_or_else(|| PixooError::normalization("frame buffer does not match dimensions"))?;

        let side = raw.width.min(raw.height);
        let left = (raw.width - side) / 2;
        let top = (raw.height - side) / 2;
        let square = image::imageops::crop_imm(&img, left, top, side, side).to_image();

        let filter = self.pick_filter(side);
        let mut resized = match filter {
            ResizeFilter::Passthrough => square,
            ResizeFilter::Area => image::imageops::thumbnail(&square, PANEL_SIZE, PANEL_SIZE),
            ResizeFilter::Smooth => {
                image::imageops::resize(&square, PANEL_SIZE, PANEL_SIZE, FilterType::Triangle)
            }
        };

        if self.cfg.remove_halos {
            resized = remove_dark_halos(&resized, self.cfg.halo_threshold, self.cfg.halo_radius);
        }

        let bytes = resized.into_raw();
        debug_assert_eq!(bytes.len(), FRAME_BYTES);
        Ok((Frame::from_rgb8(bytes)?, filter))
    }

    fn pick_filter(&self, square_side: u32) -> ResizeFilter {
        if square_side == PANEL_SIZE {
            return ResizeFilter::Passthrough;
        }
        let ratio = square_side as f32 / PANEL_SIZE as f32;
        if ratio >= self.cfg.area_filter_min_ratio {
            ResizeFilter::Area
        } else {
            ResizeFilter::Smooth
        }
    }
}

/// Indices of `target` frames spread evenly over `len` source frames, first and last included.
///
/// Returns every index when the source is not longer than the target.
pub fn select_uniform(len: usize, target: usize) -> Vec<usize> {
    if len <= target {
        return (0..len).collect();
    }
    if target <= 1 {
        return vec![0];
    }
    (0..target).map(|i| i * (len - 1) / (target - 1)).collect()
}

/// Replace pixels much darker than their neighborhood with the neighborhood mean.
///
/// Resampling high-contrast edges leaves thin dark outlines that read as noise on the panel.
fn remove_dark_halos(img: &RgbImage, threshold: f32, radius: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let r = radius as i64;
    let window = ((2 * r + 1) * (2 * r + 1)) as f32;
    let lum = |x: u32, y: u32| {
        let p = img.get_pixel(x, y).0;
        (f32::from(p[0]) + f32::from(p[1]) + f32::from(p[2])) / 3.0
    };
    let clamp_xy = |v: i64, max: u32| v.clamp(0, i64::from(max) - 1) as u32;

    let mut out = img.clone();
    for y in 0..h {
        for x in 0..w {
            let mut lum_sum = 0.0f32;
            let mut ch_sum = [0.0f32; 3];
            for dy in -r..=r {
                for dx in -r..=r {
                    let sx = clamp_xy(i64::from(x) + dx, w);
                    let sy = clamp_xy(i64::from(y) + dy, h);
                    let p = img.get_pixel(sx, sy).0;
                    lum_sum += lum(sx, sy);
                    for c in 0..3 {
                        ch_sum[c] += f32::from(p[c]);
                    }
                }
            }
            if lum(x, y) < lum_sum / window - threshold {
                let px = out.get_pixel_mut(x, y);
                for c in 0..3 {
                    px.0[c] = clamp_u8(ch_sum[c] / window);
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/convert/normalize.rs"]
mod tests;
