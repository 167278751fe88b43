use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::foundation::{
    core::{Frame, PANEL_SIZE},
    error::TransferError,
};

/// One frame upload within a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendFrame {
    /// 0-based position in the animation.
    pub index: usize,
    /// Frames in the animation.
    pub total: usize,
    /// Shared frame duration.
    pub duration_ms: u32,
    /// Pixels to upload.
    pub payload: Frame,
}

/// Command understood by the panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Connectivity check.
    Probe,
    /// Clear any animation state held by the device.
    ResetBuffer,
    /// Deliver one frame.
    SendFrame(SendFrame),
}

#[derive(Serialize)]
#[serde(tag = "Command")]
enum WireCommand {
    #[serde(rename = "Channel/GetIndex")]
    Probe,
    #[serde(rename = "Draw/ResetHttpGifId")]
    ResetBuffer,
    #[serde(rename = "Draw/SendHttpGif", rename_all = "PascalCase")]
    SendFrame {
        pic_num: usize,
        pic_offset: usize,
        pic_width: u32,
        pic_speed: u32,
        pic_data: String,
    },
}

impl DeviceCommand {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::ResetBuffer => "reset_buffer",
            Self::SendFrame(_) => "send_frame",
        }
    }

    /// JSON request body sent to `POST /post`.
    pub fn to_json(&self) -> Result<Vec<u8>, TransferError> {
        let wire = match self {
            Self::Probe => WireCommand::Probe,
            Self::ResetBuffer => WireCommand::ResetBuffer,
            Self::SendFrame(f) => WireCommand::SendFrame {
                pic_num: f.total,
                pic_offset: f.index,
                pic_width: PANEL_SIZE,
                pic_speed: f.duration_ms,
                pic_data: STANDARD.encode(f.payload.as_bytes()),
            },
        };
        serde_json::to_vec(&wire)
            .map_err(|e| TransferError::protocol(format!("encode {} command: {e}", self.kind())))
    }
}

/// Successful device response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Ack {
    /// Vendor status; `0` on success. Replies without the field count as success.
    #[serde(default)]
    pub error_code: i64,
    /// Remaining response fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Ack {
    /// Acknowledgment with no extra fields.
    pub fn ok() -> Self {
        Self {
            error_code: 0,
            fields: serde_json::Map::new(),
        }
    }

    /// Parse a JSON response body; a non-zero `error_code` is a rejection.
    pub fn from_body(body: &[u8]) -> Result<Self, TransferError> {
        let ack: Self = serde_json::from_slice(body).map_err(|e| {
            TransferError::protocol(format!(
                "unreadable response ({e}): {}",
                String::from_utf8_lossy(&body[..body.len().min(120)])
            ))
        })?;
        if ack.error_code != 0 {
            return Err(TransferError::Rejected {
                error_code: ack.error_code,
            });
        }
        Ok(ack)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/command.rs"]
mod tests;
