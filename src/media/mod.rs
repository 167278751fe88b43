//! Media collaborators: decoding sources into raw frames and exporting finished animations.

/// Still and animated image decoding.
pub mod decode;
/// GIF and preview export.
pub mod export;
/// Video clip decoding through ffmpeg (feature `media-ffmpeg`).
pub mod ffmpeg;
