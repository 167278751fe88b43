//! pixoo-anim converts stills, clips and animations into 64x64 panel animations and transfers them
//! to a Pixoo LED panel.
//!
//! The conversion pipeline is:
//!
//! - Decode a source into raw frames ([`media::decode::ImageDecoder`], or
//!   [`media::ffmpeg::FfmpegDecoder`] with the `media-ffmpeg` feature)
//! - Normalize to a bounded sequence of 64x64 frames ([`convert::normalize::FrameNormalizer`])
//! - Apply one luminance-driven correction profile ([`convert::enhance::AdaptiveEnhancer`])
//! - Map every frame through one shared palette
//!   ([`convert::quantize::TemporalPaletteQuantizer`])
//!
//! [`convert()`] runs all of it. A finished [`Animation`] can be saved as a GIF
//! ([`media::export::write_gif`]) or pushed to a panel over a [`DeviceConnection`] with
//! [`TransferProtocol`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod config;
pub mod convert;
pub mod device;
pub mod media;

pub use crate::foundation::core::{
    FRAME_BYTES, Frame, FrameSequence, PANEL_SIZE, Phase, RGB_CHANNELS, RawFrame,
};
pub use crate::foundation::error::{PixooError, PixooResult, TransferError};

pub use crate::config::PipelineConfig;
pub use crate::convert::enhance::{EnhancementProfile, LuminanceStats};
pub use crate::convert::pipeline::{
    Animation, SamplingPlan, convert, convert_batch, convert_with_progress,
};
pub use crate::convert::quantize::Palette;
pub use crate::device::command::{Ack, DeviceCommand};
pub use crate::device::connection::{DeviceConnection, DeviceLink};
pub use crate::device::http::HttpLink;
pub use crate::device::transfer::{TransferProtocol, TransferResult, TransferState};
pub use crate::media::decode::{DecodedMedia, ImageDecoder, MediaDecoder, MediaSource};
