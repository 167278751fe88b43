//! Pipeline configuration.
//!
//! Every knob that governs conversion or transfer lives here with a named default, so the
//! processing stages stay data-driven and can be tested without touching I/O.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::{
    core::{PANEL_SIZE, Phase},
    error::{PixooError, PixooResult},
};

/// Default frame ceiling for a single device upload.
pub const DEFAULT_TRANSFER_FRAME_CEILING: usize = 40;
/// Default frame ceiling for producing a savable animation.
pub const DEFAULT_CONVERSION_FRAME_CEILING: usize = 120;
/// Default longest source clip, in seconds.
pub const DEFAULT_MAX_SOURCE_DURATION_SECS: f64 = 5.0;
/// Shortest frame duration the panel plays reliably.
pub const DEFAULT_MIN_FRAME_DURATION_MS: u32 = 50;
/// Duration used for single-image animations.
pub const DEFAULT_STILL_FRAME_DURATION_MS: u32 = 1000;
/// Duration used when the source carries no timing.
pub const DEFAULT_FALLBACK_FRAME_DURATION_MS: u32 = 100;
/// Largest palette the quantizer may produce.
pub const MAX_PALETTE_COLORS: usize = 256;

/// Top-level configuration for conversion and transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Panel edge length. Only 64 is supported.
    pub panel_size: u32,
    /// Frame ceiling while producing a savable animation.
    pub conversion_frame_ceiling: usize,
    /// Frame ceiling for what can be pushed to the device in one session.
    pub transfer_frame_ceiling: usize,
    /// Longest source clip; with the transfer ceiling this fixes the effective frame rate.
    pub max_source_duration_secs: f64,
    /// Lower bound applied to derived frame durations.
    pub min_frame_duration_ms: u32,
    /// Frame duration for single-frame sources.
    pub still_frame_duration_ms: u32,
    /// Frame duration when the source reports none.
    pub fallback_frame_duration_ms: u32,
    /// Frame reshaping options.
    pub normalize: NormalizeConfig,
    /// Adaptive enhancement options.
    pub enhance: EnhanceConfig,
    /// Shared palette options.
    pub quantize: QuantizeConfig,
    /// Device connection options.
    pub device: DeviceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            panel_size: PANEL_SIZE,
            conversion_frame_ceiling: DEFAULT_CONVERSION_FRAME_CEILING,
            transfer_frame_ceiling: DEFAULT_TRANSFER_FRAME_CEILING,
            max_source_duration_secs: DEFAULT_MAX_SOURCE_DURATION_SECS,
            min_frame_duration_ms: DEFAULT_MIN_FRAME_DURATION_MS,
            still_frame_duration_ms: DEFAULT_STILL_FRAME_DURATION_MS,
            fallback_frame_duration_ms: DEFAULT_FALLBACK_FRAME_DURATION_MS,
            normalize: NormalizeConfig::default(),
            enhance: EnhanceConfig::default(),
            quantize: QuantizeConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> PixooResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| PixooError::config(format!("parse '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> PixooResult<()> {
        if self.panel_size != PANEL_SIZE {
            return Err(PixooError::config(format!(
                "panel_size must be {PANEL_SIZE}, got {}",
                self.panel_size
            )));
        }
        if self.transfer_frame_ceiling == 0 || self.conversion_frame_ceiling == 0 {
            return Err(PixooError::config("frame ceilings must be >= 1"));
        }
        if self.transfer_frame_ceiling > self.conversion_frame_ceiling {
            return Err(PixooError::config(format!(
                "transfer_frame_ceiling ({}) must not exceed conversion_frame_ceiling ({})",
                self.transfer_frame_ceiling, self.conversion_frame_ceiling
            )));
        }
        if !self.max_source_duration_secs.is_finite() || self.max_source_duration_secs <= 0.0 {
            return Err(PixooError::config("max_source_duration_secs must be > 0"));
        }
        if self.min_frame_duration_ms == 0
            || self.still_frame_duration_ms == 0
            || self.fallback_frame_duration_ms == 0
        {
            return Err(PixooError::config("frame durations must be > 0 ms"));
        }
        self.normalize.validate()?;
        self.enhance.validate()?;
        self.quantize.validate()?;
        self.device.validate()
    }

    /// Frame ceiling for `phase`.
    pub fn ceiling(&self, phase: Phase) -> usize {
        match phase {
            Phase::Conversion => self.conversion_frame_ceiling,
            Phase::Transfer => self.transfer_frame_ceiling,
        }
    }

    /// Sampling rate for clips: the transfer ceiling spread over the longest allowed clip.
    pub fn effective_fps(&self) -> f64 {
        self.transfer_frame_ceiling as f64 / self.max_source_duration_secs
    }
}

/// Options for reshaping frames to panel size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Downscale ratio (crop side / panel side) at or above which area averaging is used.
    pub area_filter_min_ratio: f32,
    /// Replace isolated dark pixels left by resampling.
    pub remove_halos: bool,
    /// Luminance drop below the neighborhood mean that marks a halo pixel.
    pub halo_threshold: f32,
    /// Neighborhood radius for halo detection.
    pub halo_radius: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            area_filter_min_ratio: 2.0,
            remove_halos: true,
            halo_threshold: 35.0,
            halo_radius: 1,
        }
    }
}

impl NormalizeConfig {
    fn validate(&self) -> PixooResult<()> {
        if !self.area_filter_min_ratio.is_finite() || self.area_filter_min_ratio < 1.0 {
            return Err(PixooError::config("area_filter_min_ratio must be >= 1.0"));
        }
        if !self.halo_threshold.is_finite() || self.halo_threshold < 0.0 {
            return Err(PixooError::config("halo_threshold must be >= 0"));
        }
        if self.halo_radius == 0 || self.halo_radius > 4 {
            return Err(PixooError::config("halo_radius must be in 1..=4"));
        }
        Ok(())
    }
}

/// Numeric parameters of one enhancement profile.
///
/// Factors follow the usual enhancer convention: `1.0` leaves the image unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileParams {
    /// Contrast factor around the mean luminance.
    pub contrast: f32,
    /// Saturation factor around per-pixel gray.
    pub saturation: f32,
    /// Sharpness factor against a 3x3 smoothed copy.
    pub sharpness: f32,
    /// Final brightness trim.
    pub brightness: f32,
    /// Gamma exponent applied before everything else (`< 1.0` lifts shadows).
    pub gamma: Option<f32>,
}

impl ProfileParams {
    fn validate(&self, name: &str) -> PixooResult<()> {
        let factors = [self.contrast, self.saturation, self.sharpness, self.brightness];
        if factors.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(PixooError::config(format!(
                "profile '{name}' factors must be finite and >= 0"
            )));
        }
        if let Some(g) = self.gamma
            && (!g.is_finite() || g <= 0.0)
        {
            return Err(PixooError::config(format!(
                "profile '{name}' gamma must be > 0"
            )));
        }
        Ok(())
    }
}

/// Thresholds and profile tables for adaptive enhancement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnhanceConfig {
    /// Skip enhancement entirely when `false`.
    pub enabled: bool,
    /// RMS brightness (0..1) below which a frame counts as dark.
    pub dark_brightness_threshold: f32,
    /// Luminance standard deviation below which a bright frame counts as low contrast.
    pub low_contrast_threshold: f32,
    /// Parameters for dark sources.
    pub dark: ProfileParams,
    /// Parameters for bright, flat sources.
    pub bright_low_contrast: ProfileParams,
    /// Parameters for bright, well-defined sources. Kept near neutral to avoid flicker.
    pub bright_high_contrast: ProfileParams,
    /// Dim pixels darker than a threshold so a bright subject stands out. Off by default.
    pub darken_background: Option<DarkenBackground>,
    /// Vignette strength darkening the edges toward the center. Off by default.
    pub center_focus: Option<f32>,
}

/// Soft luminance mask dimming dark (background) pixels.
///
/// A pixel `50` or more below `threshold` is scaled by `factor`; the effect fades out linearly up
/// to `threshold`, and brighter pixels are left alone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DarkenBackground {
    /// Luminance (`0..=255`) at and above which pixels are untouched.
    pub threshold: f32,
    /// Scale applied to the darkest pixels, `0.0..=1.0`.
    pub factor: f32,
}

impl Default for DarkenBackground {
    fn default() -> Self {
        Self {
            threshold: 140.0,
            factor: 0.55,
        }
    }
}

/// Suggested vignette strength for [`EnhanceConfig::center_focus`].
pub const DEFAULT_CENTER_FOCUS_STRENGTH: f32 = 0.25;

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dark_brightness_threshold: 0.3,
            low_contrast_threshold: 50.0,
            dark: ProfileParams {
                contrast: 1.15,
                saturation: 1.10,
                sharpness: 1.20,
                brightness: 1.05,
                gamma: Some(0.6),
            },
            bright_low_contrast: ProfileParams {
                contrast: 1.25,
                saturation: 1.15,
                sharpness: 1.30,
                brightness: 1.05,
                gamma: None,
            },
            bright_high_contrast: ProfileParams {
                contrast: 1.15,
                saturation: 1.00,
                sharpness: 1.00,
                brightness: 1.00,
                gamma: None,
            },
            darken_background: None,
            center_focus: None,
        }
    }
}

impl EnhanceConfig {
    fn validate(&self) -> PixooResult<()> {
        if !(0.0..=1.0).contains(&self.dark_brightness_threshold) {
            return Err(PixooError::config(
                "dark_brightness_threshold must be in 0.0..=1.0",
            ));
        }
        if !self.low_contrast_threshold.is_finite() || self.low_contrast_threshold < 0.0 {
            return Err(PixooError::config("low_contrast_threshold must be >= 0"));
        }
        if let Some(d) = &self.darken_background {
            if !(0.0..=255.0).contains(&d.threshold) {
                return Err(PixooError::config(
                    "darken_background.threshold must be in 0.0..=255.0",
                ));
            }
            if !(0.0..=1.0).contains(&d.factor) {
                return Err(PixooError::config(
                    "darken_background.factor must be in 0.0..=1.0",
                ));
            }
        }
        if let Some(strength) = self.center_focus
            && (!strength.is_finite() || strength < 0.0)
        {
            return Err(PixooError::config("center_focus must be >= 0"));
        }
        self.dark.validate("dark")?;
        self.bright_low_contrast.validate("bright_low_contrast")?;
        self.bright_high_contrast.validate("bright_high_contrast")
    }

    /// Return `true` when any panel effect is configured.
    pub fn has_effects(&self) -> bool {
        self.darken_background.is_some() || self.center_focus.is_some()
    }
}

/// Options for the shared animation palette.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuantizeConfig {
    /// Palette size cap, `1..=256`.
    pub max_colors: usize,
    /// Sample every `sample_stride`-th frame when building the palette.
    pub sample_stride: usize,
    /// Cap on pixels taken from each sampled frame; `None` uses every pixel.
    pub max_pixels_per_frame: Option<usize>,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            max_colors: MAX_PALETTE_COLORS,
            sample_stride: 4,
            max_pixels_per_frame: None,
        }
    }
}

impl QuantizeConfig {
    fn validate(&self) -> PixooResult<()> {
        if self.max_colors == 0 || self.max_colors > MAX_PALETTE_COLORS {
            return Err(PixooError::config(format!(
                "max_colors must be in 1..={MAX_PALETTE_COLORS}"
            )));
        }
        if self.sample_stride == 0 {
            return Err(PixooError::config("sample_stride must be >= 1"));
        }
        if self.max_pixels_per_frame == Some(0) {
            return Err(PixooError::config("max_pixels_per_frame must be >= 1 when set"));
        }
        Ok(())
    }
}

/// Options for talking to the panel over HTTP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// HTTP port of the panel.
    pub port: u16,
    /// Per-command timeout for reset and frame uploads.
    pub command_timeout_ms: u64,
    /// Timeout for the connectivity probe.
    pub probe_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: 80,
            command_timeout_ms: 10_000,
            probe_timeout_ms: 3_000,
        }
    }
}

impl DeviceConfig {
    fn validate(&self) -> PixooResult<()> {
        if self.command_timeout_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(PixooError::config("device timeouts must be > 0 ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
