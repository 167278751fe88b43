use std::fmt;

use crate::{
    config::{DarkenBackground, EnhanceConfig, ProfileParams},
    foundation::{
        core::{FRAME_BYTES, Frame, FrameSequence, PANEL_SIZE},
        error::PixooResult,
        math::{blend_u8, clamp_u8, luma_f32, luma_u8},
    },
};

/// Named correction profile chosen from the representative frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementProfile {
    /// Low RMS brightness: lift shadows, then moderate contrast and saturation.
    Dark,
    /// Bright but flat: the strongest contrast, saturation and sharpening.
    BrightLowContrast,
    /// Bright and well defined: near-neutral, since strong correction shows up as flicker.
    BrightHighContrast,
}

impl EnhancementProfile {
    /// Parameter set for this profile from `cfg`.
    pub fn params(self, cfg: &EnhanceConfig) -> ProfileParams {
        match self {
            Self::Dark => cfg.dark,
            Self::BrightLowContrast => cfg.bright_low_contrast,
            Self::BrightHighContrast => cfg.bright_high_contrast,
        }
    }
}

impl fmt::Display for EnhancementProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dark => "dark",
            Self::BrightLowContrast => "bright-low-contrast",
            Self::BrightHighContrast => "bright-high-contrast",
        })
    }
}

/// Luminance statistics of one frame.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LuminanceStats {
    /// Root-mean-square luminance scaled to `0.0..=1.0`.
    pub brightness: f32,
    /// Standard deviation of luminance on the `0..=255` scale.
    pub contrast: f32,
}

impl LuminanceStats {
    /// Compute statistics over every pixel of `frame`.
    pub fn of_frame(frame: &Frame) -> Self {
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut n = 0.0f64;
        for px in frame.pixels() {
            let l = f64::from(luma_f32(px));
            sum += l;
            sum_sq += l * l;
            n += 1.0;
        }
        let mean = sum / n;
        let mean_sq = sum_sq / n;
        let variance = (mean_sq - mean * mean).max(0.0);
        Self {
            brightness: (mean_sq.sqrt() / 255.0) as f32,
            contrast: variance.sqrt() as f32,
        }
    }

    /// Pick the profile for these statistics.
    pub fn classify(self, cfg: &EnhanceConfig) -> EnhancementProfile {
        if self.brightness < cfg.dark_brightness_threshold {
            EnhancementProfile::Dark
        } else if self.contrast < cfg.low_contrast_threshold {
            EnhancementProfile::BrightLowContrast
        } else {
            EnhancementProfile::BrightHighContrast
        }
    }
}

/// Profile decision for one animation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct EnhancementReport {
    /// Profile applied to every frame.
    pub profile: EnhancementProfile,
    /// Statistics of the representative (first) frame.
    pub stats: LuminanceStats,
}

/// Applies one luminance-driven profile uniformly to a whole sequence.
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveEnhancer<'a> {
    cfg: &'a EnhanceConfig,
}

impl<'a> AdaptiveEnhancer<'a> {
    /// Create an enhancer using the thresholds and tables in `cfg`.
    pub fn new(cfg: &'a EnhanceConfig) -> Self {
        Self { cfg }
    }

    /// Classify the sequence by its first frame.
    pub fn classify(&self, seq: &FrameSequence) -> EnhancementReport {
        let stats = LuminanceStats::of_frame(&seq.frames()[0]);
        EnhancementReport {
            profile: stats.classify(self.cfg),
            stats,
        }
    }

    /// Classify once, then correct every frame with the same profile.
    #[tracing::instrument(skip_all, fields(frames = seq.len()))]
    pub fn enhance(&self, seq: &FrameSequence) -> PixooResult<(FrameSequence, EnhancementReport)> {
        let report = self.classify(seq);
        let params = report.profile.params(self.cfg);
        tracing::debug!(
            profile = %report.profile,
            brightness = report.stats.brightness,
            contrast = report.stats.contrast,
            "selected enhancement profile"
        );

        let frames = seq
            .frames()
            .iter()
            .map(|f| apply_profile(f, &params))
            .collect::<PixooResult<Vec<_>>>()?;
        Ok((
            FrameSequence::new(frames, seq.frame_duration_ms())?,
            report,
        ))
    }

    /// Apply the configured panel effects to every frame. Runs after the profile, whether or
    /// not adaptive enhancement is enabled.
    pub fn apply_effects(&self, seq: FrameSequence) -> PixooResult<FrameSequence> {
        if !self.cfg.has_effects() {
            return Ok(seq);
        }
        tracing::debug!(
            darken_background = ?self.cfg.darken_background,
            center_focus = ?self.cfg.center_focus,
            "applying panel effects"
        );
        let duration = seq.frame_duration_ms();
        let frames = seq
            .frames()
            .iter()
            .map(|f| apply_effects(f, self.cfg))
            .collect::<PixooResult<Vec<_>>>()?;
        FrameSequence::new(frames, duration)
    }
}

/// Background darkening, then center focus, each only when configured.
pub fn apply_effects(frame: &Frame, cfg: &EnhanceConfig) -> PixooResult<Frame> {
    let mut buf = frame.as_bytes().to_vec();
    if let Some(darken) = &cfg.darken_background {
        apply_darken_background(&mut buf, darken);
    }
    if let Some(strength) = cfg.center_focus {
        apply_center_focus(&mut buf, strength);
    }
    Frame::from_rgb8(buf)
}

/// Run gamma, contrast, saturation, brightness and sharpness, in that order.
pub fn apply_profile(frame: &Frame, params: &ProfileParams) -> PixooResult<Frame> {
    let mut buf = frame.as_bytes().to_vec();
    if let Some(gamma) = params.gamma {
        apply_gamma(&mut buf, gamma);
    }
    apply_contrast(&mut buf, params.contrast);
    apply_saturation(&mut buf, params.saturation);
    apply_brightness(&mut buf, params.brightness);
    let buf = apply_sharpness(&buf, params.sharpness);
    Frame::from_rgb8(buf)
}

fn apply_gamma(buf: &mut [u8], gamma: f32) {
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        *slot = clamp_u8(255.0 * (v as f32 / 255.0).powf(gamma));
    }
    for b in buf.iter_mut() {
        *b = lut[*b as usize];
    }
}

fn apply_contrast(buf: &mut [u8], factor: f32) {
    if factor == 1.0 {
        return;
    }
    let n = (buf.len() / 3) as u64;
    let sum: u64 = buf
        .chunks_exact(3)
        .map(|p| u64::from(luma_u8([p[0], p[1], p[2]])))
        .sum();
    let mean = ((sum as f64 / n as f64) + 0.5) as u8;
    for b in buf.iter_mut() {
        *b = blend_u8(mean, *b, factor);
    }
}

fn apply_saturation(buf: &mut [u8], factor: f32) {
    if factor == 1.0 {
        return;
    }
    for p in buf.chunks_exact_mut(3) {
        let gray = luma_u8([p[0], p[1], p[2]]);
        for c in p.iter_mut() {
            *c = blend_u8(gray, *c, factor);
        }
    }
}

fn apply_brightness(buf: &mut [u8], factor: f32) {
    if factor == 1.0 {
        return;
    }
    for b in buf.iter_mut() {
        *b = clamp_u8(f32::from(*b) * factor);
    }
}

fn apply_darken_background(buf: &mut [u8], darken: &DarkenBackground) {
    // Full effect 50 levels below the threshold, fading to none at it.
    const RAMP: f32 = 50.0;
    for p in buf.chunks_exact_mut(3) {
        let mask = ((darken.threshold - luma_f32([p[0], p[1], p[2]])) / RAMP).clamp(0.0, 1.0);
        if mask == 0.0 {
            continue;
        }
        let scale = 1.0 - mask * (1.0 - darken.factor);
        for c in p.iter_mut() {
            *c = clamp_u8(f32::from(*c) * scale);
        }
    }
}

/// Darken toward the corners by `1 - d^2 * strength`, `d` being the distance from the center
/// normalized to the corner. The scale never drops below 0.7.
fn apply_center_focus(buf: &mut [u8], strength: f32) {
    const MIN_SCALE: f32 = 0.7;
    let size = PANEL_SIZE as usize;
    let center = PANEL_SIZE as f32 / 2.0;
    let max_dist_sq = 2.0 * center * center;
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let d_sq = (dx * dx + dy * dy) / max_dist_sq;
            let scale = (1.0 - d_sq * strength).clamp(MIN_SCALE, 1.0);
            if scale == 1.0 {
                continue;
            }
            let idx = (y * size + x) * 3;
            for c in &mut buf[idx..idx + 3] {
                *c = clamp_u8(f32::from(*c) * scale);
            }
        }
    }
}

/// Blend against a 3x3 smoothed copy (`[1 1 1; 1 5 1; 1 1 1] / 13`); border pixels stay as-is.
fn apply_sharpness(buf: &[u8], factor: f32) -> Vec<u8> {
    if factor == 1.0 {
        return buf.to_vec();
    }
    const KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
    const KERNEL_SUM: u32 = 13;
    let size = PANEL_SIZE as usize;
    debug_assert_eq!(buf.len(), FRAME_BYTES);

    let mut smooth = buf.to_vec();
    for y in 1..size - 1 {
        for x in 1..size - 1 {
            for c in 0..3 {
                let mut acc = 0u32;
                for (ky, row) in KERNEL.iter().enumerate() {
                    for (kx, &w) in row.iter().enumerate() {
                        let idx = ((y + ky - 1) * size + (x + kx - 1)) * 3 + c;
                        acc += w * u32::from(buf[idx]);
                    }
                }
                smooth[(y * size + x) * 3 + c] = ((acc + KERNEL_SUM / 2) / KERNEL_SUM) as u8;
            }
        }
    }

    smooth
        .iter()
        .zip(buf)
        .map(|(&deg, &src)| blend_u8(deg, src, factor))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/convert/enhance.rs"]
mod tests;
