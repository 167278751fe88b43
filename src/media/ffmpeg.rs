use std::path::Path;

use crate::{
    config::PipelineConfig,
    foundation::{
        core::{Phase, RawFrame},
        error::{PixooError, PixooResult},
    },
    media::decode::{ClipSegment, DecodedMedia, MediaDecoder, MediaSource},
};

/// Lowest sampling rate used for clips, in frames per second.
pub const MIN_CLIP_FPS: f64 = 5.0;

/// Stream facts reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoProbe {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Source frame rate.
    pub fps: f64,
    /// Container duration in seconds; `0.0` when unknown.
    pub duration_secs: f64,
}

/// Segment and sampling rate chosen for one clip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPlan {
    /// Start offset in seconds.
    pub start_secs: f64,
    /// Segment length in seconds.
    pub duration_secs: f64,
    /// Sampling rate.
    pub fps: f64,
    /// Frames to extract.
    pub frame_count: usize,
}

impl ClipPlan {
    /// Duration of one sampled frame, rounded down to whole milliseconds.
    pub fn frame_duration_ms(&self) -> u64 {
        (1000.0 / self.fps) as u64
    }
}

/// Pick the segment and sampling rate for a clip.
///
/// The rate is the source rate, lowered so the segment fits in `frame_ceiling` frames, but never
/// below [`MIN_CLIP_FPS`]. Without an explicit segment the clip is read from the start, up to
/// `max_duration_secs`.
pub fn plan_clip(
    probe: &VideoProbe,
    segment: Option<ClipSegment>,
    max_duration_secs: f64,
    frame_ceiling: usize,
) -> PixooResult<ClipPlan> {
    let (start_secs, duration_secs) = match segment {
        Some(seg) => {
            let d = seg.duration_secs();
            if d <= 0.0 {
                return Err(PixooError::decode(format!(
                    "segment end ({:.2}s) must be after its start ({:.2}s)",
                    seg.end_secs, seg.start_secs
                )));
            }
            if d > max_duration_secs {
                return Err(PixooError::decode(format!(
                    "segment of {d:.1}s exceeds the {max_duration_secs}s limit"
                )));
            }
            (seg.start_secs.max(0.0), d)
        }
        None => {
            if probe.duration_secs <= 0.0 {
                return Err(PixooError::decode("video reports no duration"));
            }
            (0.0, probe.duration_secs.min(max_duration_secs))
        }
    };
    if probe.fps <= 0.0 {
        return Err(PixooError::decode("video reports no frame rate"));
    }

    let fps = probe
        .fps
        .min(frame_ceiling as f64 / duration_secs)
        .max(MIN_CLIP_FPS);
    let frame_count = ((duration_secs * fps) as usize).max(1);
    Ok(ClipPlan {
        start_secs,
        duration_secs,
        fps,
        frame_count,
    })
}

/// Video decoder shelling out to `ffprobe` and `ffmpeg` on `PATH`.
#[derive(Clone, Copy, Debug)]
pub struct FfmpegDecoder {
    max_duration_secs: f64,
    frame_ceiling: usize,
}

impl FfmpegDecoder {
    /// Decoder bounded by the duration limit and the ceiling of `phase`.
    pub fn new(cfg: &PipelineConfig, phase: Phase) -> Self {
        Self {
            max_duration_secs: cfg.max_source_duration_secs,
            frame_ceiling: cfg.ceiling(phase),
        }
    }
}

impl MediaDecoder for FfmpegDecoder {
    #[tracing::instrument(skip_all, fields(path = %source.path.display()))]
    fn decode(&self, source: &MediaSource) -> PixooResult<DecodedMedia> {
        let probe = probe_video(&source.path)?;
        let plan = plan_clip(
            &probe,
            source.segment,
            self.max_duration_secs,
            self.frame_ceiling,
        )?;
        tracing::debug!(?probe, ?plan, "planned clip extraction");

        let frames = decode_frames_rgb8(&source.path, &probe, &plan)?;
        let natural_duration_ms = plan.frame_duration_ms() * frames.len() as u64;
        Ok(DecodedMedia {
            frames,
            natural_duration_ms,
        })
    }
}

#[cfg(feature = "media-ffmpeg")]
fn probe_video(path: &Path) -> PixooResult<VideoProbe> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| PixooError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(PixooError::decode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| PixooError::decode(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| PixooError::decode("no video stream found"))?;
    let width = stream
        .width
        .ok_or_else(|| PixooError::decode("missing video width from ffprobe"))?;
    let height = stream
        .height
        .ok_or_else(|| PixooError::decode("missing video height from ffprobe"))?;
    let (num, den) = parse_ff_ratio(stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| PixooError::decode("invalid video r_frame_rate"))?;
    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoProbe {
        width,
        height,
        fps: f64::from(num) / f64::from(den),
        duration_secs,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
fn probe_video(_path: &Path) -> PixooResult<VideoProbe> {
    Err(PixooError::decode(
        "video sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn decode_frames_rgb8(
    path: &Path,
    probe: &VideoProbe,
    plan: &ClipPlan,
) -> PixooResult<Vec<RawFrame>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{:.6}", plan.start_secs)])
        .args(["-t", &format!("{:.6}", plan.duration_secs)])
        .arg("-i")
        .arg(path)
        .args([
            "-vf",
            &format!("fps={:.6}", plan.fps),
            "-frames:v",
            &plan.frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ])
        .output()
        .map_err(|e| PixooError::decode(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(PixooError::decode(format!(
            "ffmpeg video decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let frame_len = probe.width as usize * probe.height as usize * 3;
    if frame_len == 0 {
        return Err(PixooError::decode(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if out.stdout.len() < frame_len || !out.stdout.len().is_multiple_of(frame_len) {
        return Err(PixooError::decode(format!(
            "decoded video has invalid size: got {} bytes, expected multiples of {frame_len}",
            out.stdout.len()
        )));
    }

    out.stdout
        .chunks_exact(frame_len)
        .take(plan.frame_count)
        .map(|chunk| RawFrame::new(probe.width, probe.height, chunk.to_vec()))
        .collect()
}

#[cfg(not(feature = "media-ffmpeg"))]
fn decode_frames_rgb8(
    _path: &Path,
    _probe: &VideoProbe,
    _plan: &ClipPlan,
) -> PixooResult<Vec<RawFrame>> {
    Err(PixooError::decode(
        "video sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/media/ffmpeg.rs"]
mod tests;
