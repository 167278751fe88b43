use std::collections::HashMap;

use crate::{
    config::{MAX_PALETTE_COLORS, QuantizeConfig},
    foundation::{
        core::{Frame, FrameSequence},
        error::{PixooError, PixooResult},
    },
};

/// Up to 256 colors shared by every frame of one animation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Wrap `1..=256` colors.
    pub fn new(colors: Vec<[u8; 3]>) -> PixooResult<Self> {
        if colors.is_empty() || colors.len() > MAX_PALETTE_COLORS {
            return Err(PixooError::quantization(format!(
                "palette must hold 1..={MAX_PALETTE_COLORS} colors, got {}",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Palette entries in index order.
    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always `false`; palettes hold at least one color.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Index of the entry closest to `rgb` in squared RGB distance. Ties go to the lower index.
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = 0usize;
        let mut best_d = u32::MAX;
        for (i, c) in self.colors.iter().enumerate() {
            let d = dist2(*c, rgb);
            if d < best_d {
                best = i;
                best_d = d;
                if d == 0 {
                    break;
                }
            }
        }
        best as u8
    }

    /// Map a frame through the palette without dithering.
    pub fn remap(&self, frame: &Frame) -> PixooResult<Frame> {
        let mut cache = HashMap::new();
        self.remap_cached(frame, &mut cache)
    }

    fn remap_cached(&self, frame: &Frame, cache: &mut HashMap<[u8; 3], u8>) -> PixooResult<Frame> {
        let mut out = Vec::with_capacity(frame.as_bytes().len());
        for px in frame.pixels() {
            let idx = *cache.entry(px).or_insert_with(|| self.nearest(px));
            out.extend_from_slice(&self.colors[idx as usize]);
        }
        Frame::from_rgb8(out)
    }
}

fn dist2(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

/// Sequence mapped through one shared palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedSequence {
    /// Remapped frames; every pixel is a palette entry.
    pub sequence: FrameSequence,
    /// Shared palette.
    pub palette: Palette,
    /// Frame indices the palette was built from.
    pub sampled: Vec<usize>,
}

/// Builds one palette per animation from sampled frames and maps every frame through it.
#[derive(Clone, Copy, Debug)]
pub struct TemporalPaletteQuantizer<'a> {
    cfg: &'a QuantizeConfig,
}

impl<'a> TemporalPaletteQuantizer<'a> {
    /// Create a quantizer with the given options.
    pub fn new(cfg: &'a QuantizeConfig) -> Self {
        Self { cfg }
    }

    /// Indices of frames pooled for the palette: every `sample_stride`-th, or all for short inputs.
    pub fn sample_indices(&self, len: usize) -> Vec<usize> {
        let stride = self.cfg.sample_stride.max(1);
        if len <= stride {
            (0..len).collect()
        } else {
            (0..len).step_by(stride).collect()
        }
    }

    /// Quantize a whole sequence.
    #[tracing::instrument(skip_all, fields(frames = seq.len()))]
    pub fn quantize(&self, seq: &FrameSequence) -> PixooResult<QuantizedSequence> {
        self.quantize_frames(seq.frames(), seq.frame_duration_ms())
    }

    /// Quantize a whole sequence, calling `progress(done, total)` after each frame is remapped.
    #[tracing::instrument(skip_all, fields(frames = seq.len()))]
    pub fn quantize_with_progress(
        &self,
        seq: &FrameSequence,
        progress: &mut dyn FnMut(usize, usize),
    ) -> PixooResult<QuantizedSequence> {
        self.quantize_inner(seq.frames(), seq.frame_duration_ms(), progress)
    }

    /// Quantize loose frames sharing `frame_duration_ms`.
    pub fn quantize_frames(
        &self,
        frames: &[Frame],
        frame_duration_ms: u32,
    ) -> PixooResult<QuantizedSequence> {
        self.quantize_inner(frames, frame_duration_ms, &mut |_, _| {})
    }

    fn quantize_inner(
        &self,
        frames: &[Frame],
        frame_duration_ms: u32,
        progress: &mut dyn FnMut(usize, usize),
    ) -> PixooResult<QuantizedSequence> {
        if frames.is_empty() {
            return Err(PixooError::quantization("cannot quantize an empty sequence"));
        }

        let sampled = self.sample_indices(frames.len());
        let mut hist: HashMap<[u8; 3], u32> = HashMap::new();
        for &i in &sampled {
            self.pool_pixels(&frames[i], &mut hist);
        }
        let palette = Palette::new(median_cut(hist, self.cfg.max_colors))?;
        tracing::debug!(
            sampled = ?sampled,
            colors = palette.len(),
            "built shared palette"
        );

        let mut cache = HashMap::new();
        let mut remapped = Vec::with_capacity(frames.len());
        for frame in frames {
            remapped.push(palette.remap_cached(frame, &mut cache)?);
            progress(remapped.len(), frames.len());
        }
        let sequence = FrameSequence::new(remapped, frame_duration_ms)
            .map_err(|e| PixooError::quantization(e.to_string()))?;

        Ok(QuantizedSequence {
            sequence,
            palette,
            sampled,
        })
    }

    fn pool_pixels(&self, frame: &Frame, hist: &mut HashMap<[u8; 3], u32>) {
        let total = frame.as_bytes().len() / 3;
        let step = match self.cfg.max_pixels_per_frame {
            Some(cap) if cap < total => total.div_ceil(cap),
            _ => 1,
        };
        for px in frame.pixels().step_by(step) {
            *hist.entry(px).or_insert(0) += 1;
        }
    }
}

struct ColorBox {
    entries: Vec<([u8; 3], u32)>,
    weight: u64,
}

impl ColorBox {
    fn new(entries: Vec<([u8; 3], u32)>) -> Self {
        let weight = entries.iter().map(|(_, n)| u64::from(*n)).sum();
        Self { entries, weight }
    }

    /// Channel with the largest value range and that range.
    fn widest_channel(&self) -> (usize, u8) {
        let mut best = (0usize, 0u8);
        for c in 0..3 {
            let (lo, hi) = self
                .entries
                .iter()
                .fold((u8::MAX, u8::MIN), |(lo, hi), (rgb, _)| {
                    (lo.min(rgb[c]), hi.max(rgb[c]))
                });
            let range = hi - lo;
            if range > best.1 {
                best = (c, range);
            }
        }
        best
    }

    fn split(mut self) -> (Self, Self) {
        let (channel, _) = self.widest_channel();
        self.entries.sort_unstable_by_key(|(rgb, _)| (rgb[channel], *rgb));

        let half = self.weight.div_ceil(2);
        let mut acc = 0u64;
        let mut cut = self.entries.len() / 2;
        for (i, (_, n)) in self.entries.iter().enumerate() {
            acc += u64::from(*n);
            if acc >= half {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.entries.len() - 1);
        let upper = self.entries.split_off(cut);
        (Self::new(self.entries), Self::new(upper))
    }

    fn mean_color(&self) -> [u8; 3] {
        let mut sums = [0u64; 3];
        for (rgb, n) in &self.entries {
            for c in 0..3 {
                sums[c] += u64::from(rgb[c]) * u64::from(*n);
            }
        }
        let w = self.weight.max(1);
        sums.map(|s| ((s + w / 2) / w) as u8)
    }
}

/// Median-cut reduction of a color histogram to at most `max_colors` entries.
///
/// Histograms that already fit are returned exactly, sorted.
fn median_cut(hist: HashMap<[u8; 3], u32>, max_colors: usize) -> Vec<[u8; 3]> {
    let mut entries: Vec<([u8; 3], u32)> = hist.into_iter().collect();
    entries.sort_unstable_by_key(|(rgb, _)| *rgb);
    if entries.len() <= max_colors {
        return entries.into_iter().map(|(rgb, _)| rgb).collect();
    }

    let mut boxes = vec![ColorBox::new(entries)];
    while boxes.len() < max_colors {
        let pick = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.entries.len() > 1)
            .max_by_key(|(i, b)| (b.weight, b.widest_channel().1, std::cmp::Reverse(*i)))
            .map(|(i, _)| i);
        let Some(i) = pick else { break };
        let (a, b) = boxes.swap_remove(i).split();
        boxes.push(a);
        boxes.push(b);
    }

    let mut colors = Vec::with_capacity(boxes.len());
    for b in &boxes {
        let c = b.mean_color();
        if !colors.contains(&c) {
            colors.push(c);
        }
    }
    colors
}

#[cfg(test)]
#[path = "../../tests/unit/convert/quantize.rs"]
mod tests;
