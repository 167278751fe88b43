use std::fmt;

use crate::{
    device::{
        command::{DeviceCommand, SendFrame},
        connection::DeviceConnection,
    },
    foundation::{
        core::{FrameSequence, Phase},
        error::{PixooError, PixooResult, TransferError},
    },
};

/// Position of the transfer state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing sent yet.
    Idle,
    /// Buffer reset in flight.
    Resetting,
    /// Frame `index` (1-based) of `total` in flight.
    Sending {
        /// 1-based frame ordinal.
        index: usize,
        /// Frames in the animation.
        total: usize,
    },
    /// Every frame acknowledged.
    Completed,
    /// A command failed; nothing more was sent.
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Resetting => f.write_str("resetting"),
            Self::Sending { index, total } => write!(f, "sending({index}/{total})"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of one transfer attempt.
#[derive(Debug)]
pub enum TransferResult {
    /// All frames reached the device.
    Completed {
        /// Frames acknowledged.
        frames_sent: usize,
    },
    /// The transfer stopped at the first failing command.
    Failed {
        /// Frames acknowledged before the failure.
        frames_sent: usize,
        /// 1-based ordinal of the failing frame; `0` when the reset failed.
        failing_index: usize,
        /// Command-level cause.
        cause: TransferError,
    },
}

impl TransferResult {
    /// Frames acknowledged by the device.
    pub fn frames_sent(&self) -> usize {
        match self {
            Self::Completed { frames_sent } | Self::Failed { frames_sent, .. } => *frames_sent,
        }
    }

    /// Return `true` for [`TransferResult::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Turn a failure into [`PixooError::Transfer`]; success yields the frame count.
    pub fn into_result(self) -> PixooResult<usize> {
        match self {
            Self::Completed { frames_sent } => Ok(frames_sent),
            Self::Failed {
                frames_sent,
                failing_index,
                cause,
            } => Err(PixooError::Transfer {
                frames_sent,
                failing_index,
                source: cause,
            }),
        }
    }
}

/// Progress callback: `(frames_sent, total)` after each acknowledged frame.
pub type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Drives reset-then-frames delivery of one sequence over a [`DeviceConnection`].
pub struct TransferProtocol<'a> {
    conn: &'a DeviceConnection,
    ceiling: usize,
    state: TransferState,
    progress: Option<ProgressFn<'a>>,
}

impl fmt::Debug for TransferProtocol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferProtocol")
            .field("ceiling", &self.ceiling)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> TransferProtocol<'a> {
    /// Protocol over `conn` accepting at most `ceiling` frames.
    pub fn new(conn: &'a DeviceConnection, ceiling: usize) -> Self {
        Self {
            conn,
            ceiling,
            state: TransferState::Idle,
            progress: None,
        }
    }

    /// Report progress after every acknowledged frame.
    pub fn with_progress(mut self, f: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Current state; after [`transfer`](Self::transfer) returns this is terminal or `Idle`.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Deliver `seq`: one buffer reset, then every frame in order, stopping at the first failure.
    ///
    /// A sequence over the ceiling is rejected before the connection is locked, so no traffic is
    /// generated. Command failures are reported as [`TransferResult::Failed`], not as `Err`.
    #[tracing::instrument(skip_all, fields(frames = seq.len(), ceiling = self.ceiling))]
    pub fn transfer(&mut self, seq: FrameSequence) -> PixooResult<TransferResult> {
        self.state = TransferState::Idle;
        seq.check_ceiling(Phase::Transfer, self.ceiling)?;

        let total = seq.len();
        let duration_ms = seq.frame_duration_ms();
        let conn = self.conn;
        let mut session = match conn.session() {
            Ok(s) => s,
            Err(cause) => return Ok(self.fail(0, 0, cause)),
        };

        self.enter(TransferState::Resetting);
        if let Err(cause) = session.send(&DeviceCommand::ResetBuffer) {
            return Ok(self.fail(0, 0, cause));
        }

        for (i, frame) in seq.into_frames().into_iter().enumerate() {
            let ordinal = i + 1;
            self.enter(TransferState::Sending {
                index: ordinal,
                total,
            });
            let cmd = DeviceCommand::SendFrame(SendFrame {
                index: i,
                total,
                duration_ms,
                payload: frame,
            });
            if let Err(cause) = session.send(&cmd) {
                return Ok(self.fail(i, ordinal, cause));
            }
            if let Some(progress) = self.progress.as_mut() {
                progress(ordinal, total);
            }
        }

        self.enter(TransferState::Completed);
        tracing::info!(frames_sent = total, "transfer completed");
        Ok(TransferResult::Completed { frames_sent: total })
    }

    fn enter(&mut self, next: TransferState) {
        tracing::debug!(from = %self.state, to = %next, "transfer state");
        self.state = next;
    }

    fn fail(
        &mut self,
        frames_sent: usize,
        failing_index: usize,
        cause: TransferError,
    ) -> TransferResult {
        tracing::warn!(
            state = %self.state,
            frames_sent,
            failing_index,
            error = %cause,
            "transfer aborted; reset and resend the full animation to recover"
        );
        self.state = TransferState::Failed;
        TransferResult::Failed {
            frames_sent,
            failing_index,
            cause,
        }
    }
}

/// Deliver `seq` over `conn` with no progress reporting.
pub fn transfer(
    conn: &DeviceConnection,
    seq: FrameSequence,
    ceiling: usize,
) -> PixooResult<TransferResult> {
    TransferProtocol::new(conn, ceiling).transfer(seq)
}

#[cfg(test)]
#[path = "../../tests/unit/device/transfer.rs"]
mod tests;
