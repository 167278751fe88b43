use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use image::{
    Delay, DynamicImage, RgbImage,
    codecs::gif::{GifEncoder, Repeat},
    imageops::FilterType,
};

use crate::foundation::{
    core::{FrameSequence, PANEL_SIZE},
    error::{PixooError, PixooResult},
};

/// Upscale factor for previews.
pub const DEFAULT_PREVIEW_SCALE: u32 = 4;

/// Encode `seq` as an infinitely looping GIF with the shared frame delay.
pub fn encode_gif<W: Write>(seq: &FrameSequence, out: W) -> PixooResult<()> {
    let frames = seq.frames().iter().map(|f| f.to_rgb_image());
    encode_rgb_frames(frames, seq.frame_duration_ms(), out)
}

/// Write `seq` to a GIF file, creating parent directories as needed.
#[tracing::instrument(skip(seq), fields(frames = seq.len()))]
pub fn write_gif(seq: &FrameSequence, path: &Path) -> PixooResult<()> {
    let file = create_file(path)?;
    encode_gif(seq, BufWriter::new(file))
}

/// Nearest-neighbor upscaled copies of every frame.
pub fn preview_frames(seq: &FrameSequence, scale: u32) -> PixooResult<Vec<RgbImage>> {
    if scale == 0 {
        return Err(PixooError::validation("preview scale must be >= 1"));
    }
    let side = PANEL_SIZE * scale;
    Ok(seq
        .frames()
        .iter()
        .map(|f| image::imageops::resize(&f.to_rgb_image(), side, side, FilterType::Nearest))
        .collect())
}

/// Write an upscaled preview GIF of `seq`.
#[tracing::instrument(skip(seq), fields(frames = seq.len()))]
pub fn write_preview_gif(seq: &FrameSequence, path: &Path, scale: u32) -> PixooResult<()> {
    let frames = preview_frames(seq, scale)?;
    let file = create_file(path)?;
    encode_rgb_frames(frames.into_iter(), seq.frame_duration_ms(), BufWriter::new(file))
}

fn create_file(path: &Path) -> PixooResult<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("create output '{}'", path.display()))?;
    Ok(file)
}

fn encode_rgb_frames<W: Write>(
    frames: impl Iterator<Item = RgbImage>,
    frame_duration_ms: u32,
    out: W,
) -> PixooResult<()> {
    let mut enc = GifEncoder::new(out);
    enc.set_repeat(Repeat::Infinite).context("set gif repeat")?;
    let delay = Delay::from_numer_denom_ms(frame_duration_ms, 1);
    for img in frames {
        let rgba = DynamicImage::ImageRgb8(img).to_rgba8();
        enc.encode_frame(image::Frame::from_parts(rgba, 0, 0, delay))
            .context("encode gif frame")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/media/export.rs"]
mod tests;
