use rayon::prelude::*;

use crate::{
    config::PipelineConfig,
    convert::{
        enhance::{AdaptiveEnhancer, EnhancementProfile, LuminanceStats},
        normalize::{FrameNormalizer, NormalizeTarget},
        quantize::{Palette, TemporalPaletteQuantizer},
    },
    foundation::{
        core::{FrameSequence, Phase},
        error::{PixooError, PixooResult},
    },
    media::decode::DecodedMedia,
};

/// Frame count and shared duration derived for one source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SamplingPlan {
    /// Frames to keep, already bounded by the phase ceiling.
    pub frame_count: usize,
    /// Duration stamped on every output frame.
    pub frame_duration_ms: u32,
}

impl SamplingPlan {
    /// Derive the plan for `source_frames` frames spanning `natural_duration_ms`.
    pub fn derive(
        source_frames: usize,
        natural_duration_ms: u64,
        phase: Phase,
        cfg: &PipelineConfig,
    ) -> PixooResult<Self> {
        if source_frames == 0 {
            return Err(PixooError::normalization("source has no frames"));
        }
        let frame_count = source_frames.min(cfg.ceiling(phase));

        let frame_duration_ms = if source_frames == 1 {
            cfg.still_frame_duration_ms
        } else if natural_duration_ms == 0 {
            cfg.fallback_frame_duration_ms
        } else {
            let per_frame = natural_duration_ms / frame_count as u64;
            u32::try_from(per_frame)
                .unwrap_or(u32::MAX)
                .max(cfg.min_frame_duration_ms)
        };

        Ok(Self {
            frame_count,
            frame_duration_ms,
        })
    }

    fn target(self) -> NormalizeTarget {
        NormalizeTarget {
            frame_count: self.frame_count,
            frame_duration_ms: self.frame_duration_ms,
        }
    }
}

/// A converted, quantized animation ready to save or transfer.
#[derive(Clone, Debug)]
pub struct Animation {
    /// Quantized frames with the shared duration.
    pub sequence: FrameSequence,
    /// Palette shared by every frame.
    pub palette: Palette,
    /// Applied profile, or `None` when enhancement is disabled.
    pub profile: Option<EnhancementProfile>,
    /// Luminance statistics of the representative frame before enhancement.
    pub stats: LuminanceStats,
    /// Plan the sequence was built with.
    pub plan: SamplingPlan,
    /// Phase whose ceiling governed the conversion.
    pub phase: Phase,
}

impl Animation {
    /// Hand the sequence over for a device transfer after checking the transfer ceiling.
    pub fn for_transfer(self, ceiling: usize) -> PixooResult<FrameSequence> {
        self.sequence.check_ceiling(Phase::Transfer, ceiling)?;
        Ok(self.sequence)
    }
}

/// Run plan, normalize, enhance, panel effects and quantize on one decoded source.
pub fn convert(media: &DecodedMedia, phase: Phase, cfg: &PipelineConfig) -> PixooResult<Animation> {
    convert_with_progress(media, phase, cfg, |_, _| {})
}

/// Like [`convert`], calling `progress(done, total)` as each output frame is finished.
#[tracing::instrument(skip_all, fields(%phase, source_frames = media.frames.len()))]
pub fn convert_with_progress(
    media: &DecodedMedia,
    phase: Phase,
    cfg: &PipelineConfig,
    mut progress: impl FnMut(usize, usize),
) -> PixooResult<Animation> {
    let plan = SamplingPlan::derive(media.frames.len(), media.natural_duration_ms, phase, cfg)?;
    tracing::debug!(?plan, "derived sampling plan");

    let normalizer = FrameNormalizer::new(&cfg.normalize, phase, cfg.ceiling(phase));
    let normalized = normalizer.normalize(&media.frames, plan.target())?;

    let enhancer = AdaptiveEnhancer::new(&cfg.enhance);
    let (enhanced, profile, stats) = if cfg.enhance.enabled {
        let (seq, report) = enhancer.enhance(&normalized)?;
        (seq, Some(report.profile), report.stats)
    } else {
        let stats = enhancer.classify(&normalized).stats;
        (normalized, None, stats)
    };

    let enhanced = enhancer.apply_effects(enhanced)?;

    let quantized = TemporalPaletteQuantizer::new(&cfg.quantize)
        .quantize_with_progress(&enhanced, &mut progress)?;
    tracing::info!(
        frames = quantized.sequence.len(),
        frame_duration_ms = quantized.sequence.frame_duration_ms(),
        colors = quantized.palette.len(),
        profile = ?profile,
        "converted animation"
    );

    Ok(Animation {
        sequence: quantized.sequence,
        palette: quantized.palette,
        profile,
        stats,
        plan,
        phase,
    })
}

/// Convert independent sources in parallel. Results keep input order.
///
/// `threads` of `None` uses rayon's default pool size.
#[tracing::instrument(skip_all, fields(%phase, sources = media.len()))]
pub fn convert_batch(
    media: &[DecodedMedia],
    phase: Phase,
    cfg: &PipelineConfig,
    threads: Option<usize>,
) -> PixooResult<Vec<PixooResult<Animation>>> {
    let pool = build_thread_pool(threads)?;
    Ok(pool.install(|| {
        media
            .par_iter()
            .map(|m| convert(m, phase, cfg))
            .collect::<Vec<_>>()
    }))
}

fn build_thread_pool(threads: Option<usize>) -> PixooResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(PixooError::validation("batch 'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PixooError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/convert/pipeline.rs"]
mod tests;
