//! Pixel pipeline: normalize, enhance and quantize decoded media into a panel animation.
//!
//! Every stage is synchronous and produces new frames; independent sources may be converted in
//! parallel with [`pipeline::convert_batch`].

/// Luminance classification and the three correction profiles.
pub mod enhance;
/// Temporal selection and 64x64 reshaping.
pub mod normalize;
/// Stage orchestration and batch conversion.
pub mod pipeline;
/// Shared-palette quantization.
pub mod quantize;
