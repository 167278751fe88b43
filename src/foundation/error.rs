use crate::foundation::core::Phase;

/// Convenience result type used across pixoo-anim.
pub type PixooResult<T> = Result<T, PixooError>;

/// Top-level error taxonomy used by conversion and transfer APIs.
#[derive(thiserror::Error, Debug)]
pub enum PixooError {
    /// Invalid caller-provided data (frame buffers, sequences, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// Source media could not be decoded into raw frames.
    #[error("decode error: {0}")]
    Decode(String),

    /// Empty or degenerate input reaching the frame normalizer.
    #[error("normalization error: {0}")]
    Normalization(String),

    /// Empty frame list reaching the palette quantizer.
    #[error("quantization error: {0}")]
    Quantization(String),

    /// Frame count over the ceiling of the current pipeline phase.
    #[error("{phase} frame ceiling exceeded: {frames} frames, at most {ceiling} allowed")]
    ExceedsFrameCeiling {
        /// Phase whose ceiling was applied.
        phase: Phase,
        /// Frame count that was rejected.
        frames: usize,
        /// Ceiling in effect.
        ceiling: usize,
    },

    /// A device command failed; the transfer was aborted.
    #[error(
        "transfer failed at frame {failing_index} after {frames_sent} frame(s) were delivered: \
         {source}; reset the device buffer and resend the full animation"
    )]
    Transfer {
        /// Frames acknowledged by the device before the failure.
        frames_sent: usize,
        /// 1-based ordinal of the frame that failed (`0` when the reset failed).
        failing_index: usize,
        /// Command-level cause.
        #[source]
        source: TransferError,
    },

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PixooError {
    /// Build a [`PixooError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PixooError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`PixooError::Normalization`] value.
    pub fn normalization(msg: impl Into<String>) -> Self {
        Self::Normalization(msg.into())
    }

    /// Build a [`PixooError::Quantization`] value.
    pub fn quantization(msg: impl Into<String>) -> Self {
        Self::Quantization(msg.into())
    }

    /// Build a [`PixooError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Number of frames known to have reached the device, when the error came from a transfer.
    pub fn frames_delivered(&self) -> Option<usize> {
        match self {
            Self::Transfer { frames_sent, .. } => Some(*frames_sent),
            Self::ExceedsFrameCeiling {
                phase: Phase::Transfer,
                ..
            } => Some(0),
            _ => None,
        }
    }
}

/// Failure of a single device command.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    /// The device did not answer within the per-command timeout.
    #[error("device command timed out")]
    Timeout,

    /// Socket-level failure (refused, reset, closed).
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with a non-success HTTP status.
    #[error("device answered HTTP {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// The device answered but reported a command error.
    #[error("device rejected command with error_code {error_code}")]
    Rejected {
        /// Vendor error code from the response body.
        error_code: i64,
    },

    /// The response could not be understood.
    #[error("device protocol error: {0}")]
    Protocol(String),

    /// The connection lock was poisoned by a panicking holder.
    #[error("device connection is unusable after a panicked transfer")]
    Busy,
}

impl TransferError {
    /// Build a [`TransferError::Protocol`] value.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Map an I/O error, folding socket timeouts into [`TransferError::Timeout`].
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
