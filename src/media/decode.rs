use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::Context;
use image::{
    AnimationDecoder, ImageFormat,
    codecs::{gif::GifDecoder, png::PngDecoder, webp::WebPDecoder},
};

use crate::{
    config::{DEFAULT_FALLBACK_FRAME_DURATION_MS, PipelineConfig},
    foundation::{
        core::RawFrame,
        error::{PixooError, PixooResult},
    },
};

/// Time range cut out of a longer clip, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipSegment {
    /// Start offset.
    pub start_secs: f64,
    /// End offset; must be greater than `start_secs`.
    pub end_secs: f64,
}

impl ClipSegment {
    /// Length of the segment in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Media file to decode, optionally restricted to a segment.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaSource {
    /// File on disk.
    pub path: PathBuf,
    /// Segment to extract from video sources.
    pub segment: Option<ClipSegment>,
}

impl MediaSource {
    /// Whole-file source.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            segment: None,
        }
    }

    /// Restrict a video source to `start_secs..end_secs`.
    pub fn with_segment(mut self, start_secs: f64, end_secs: f64) -> Self {
        self.segment = Some(ClipSegment {
            start_secs,
            end_secs,
        });
        self
    }
}

/// Decoded frames in display order plus their total playback time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedMedia {
    /// Frames of arbitrary size, RGB8.
    pub frames: Vec<RawFrame>,
    /// Sum of source frame durations; `0` for stills or untimed sources.
    pub natural_duration_ms: u64,
}

impl DecodedMedia {
    /// Single still frame.
    pub fn still(frame: RawFrame) -> Self {
        Self {
            frames: vec![frame],
            natural_duration_ms: 0,
        }
    }
}

/// Turns a media file into raw frames.
pub trait MediaDecoder {
    /// Decode `source` into frames and natural duration.
    fn decode(&self, source: &MediaSource) -> PixooResult<DecodedMedia>;
}

/// Decoder for stills and animated GIF, WebP and APNG files.
#[derive(Clone, Copy, Debug)]
pub struct ImageDecoder {
    fallback_delay_ms: u32,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self {
            fallback_delay_ms: DEFAULT_FALLBACK_FRAME_DURATION_MS,
        }
    }
}

impl ImageDecoder {
    /// Decoder using the fallback delay from `cfg` for frames without timing.
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            fallback_delay_ms: cfg.fallback_frame_duration_ms,
        }
    }

    /// Decode an in-memory file. The format is sniffed from the bytes.
    pub fn decode_bytes(&self, bytes: &[u8]) -> PixooResult<DecodedMedia> {
        let format = image::guess_format(bytes)
            .map_err(|e| PixooError::decode(format!("unrecognized image format: {e}")))?;

        let frames = match format {
            ImageFormat::Gif => {
                let dec = GifDecoder::new(Cursor::new(bytes)).context("open gif decoder")?;
                Some(dec.into_frames().collect_frames())
            }
            ImageFormat::WebP => {
                let dec = WebPDecoder::new(Cursor::new(bytes)).context("open webp decoder")?;
                dec.has_animation()
                    .then(|| dec.into_frames().collect_frames())
            }
            ImageFormat::Png => {
                let dec = PngDecoder::new(Cursor::new(bytes)).context("open png decoder")?;
                if dec.is_apng().context("inspect png animation chunk")? {
                    Some(dec.apng().context("open apng decoder")?.into_frames().collect_frames())
                } else {
                    None
                }
            }
            _ => None,
        };

        match frames {
            Some(frames) => {
                let frames = frames.map_err(|e| PixooError::decode(format!("{format:?}: {e}")))?;
                self.collect_animation(frames)
            }
            None => {
                let img = image::load_from_memory_with_format(bytes, format)
                    .map_err(|e| PixooError::decode(format!("{format:?}: {e}")))?
                    .to_rgba8();
                let (w, h) = img.dimensions();
                Ok(DecodedMedia::still(RawFrame::from_rgba8(w, h, img.as_raw())?))
            }
        }
    }

    fn collect_animation(&self, frames: Vec<image::Frame>) -> PixooResult<DecodedMedia> {
        if frames.is_empty() {
            return Err(PixooError::decode("animation has no frames"));
        }

        let mut natural_duration_ms = 0u64;
        let mut out = Vec::with_capacity(frames.len());
        for frame in frames {
            let (num, den) = frame.delay().numer_denom_ms();
            let delay_ms = if den == 0 { 0 } else { u64::from(num / den) };
            natural_duration_ms += if delay_ms == 0 {
                u64::from(self.fallback_delay_ms)
            } else {
                delay_ms
            };
            let buf = frame.into_buffer();
            let (w, h) = buf.dimensions();
            out.push(RawFrame::from_rgba8(w, h, buf.as_raw())?);
        }
        // A one-frame animation plays as a still.
        if out.len() == 1 {
            natural_duration_ms = 0;
        }
        tracing::debug!(
            frames = out.len(),
            natural_duration_ms,
            "decoded animation"
        );
        Ok(DecodedMedia {
            frames: out,
            natural_duration_ms,
        })
    }
}

impl MediaDecoder for ImageDecoder {
    #[tracing::instrument(skip_all, fields(path = %source.path.display()))]
    fn decode(&self, source: &MediaSource) -> PixooResult<DecodedMedia> {
        let bytes = std::fs::read(&source.path)
            .with_context(|| format!("read media '{}'", source.path.display()))?;
        self.decode_bytes(&bytes)
    }
}

/// File extensions routed to the video decoder.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "m4v"];

/// Return `true` when `path` looks like a video container.
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/media/decode.rs"]
mod tests;
