use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    device::{
        command::{Ack, DeviceCommand},
        connection::DeviceLink,
    },
    foundation::error::TransferError,
};

/// Shared record of commands a [`RecordingLink`] received.
#[derive(Clone, Debug, Default)]
pub struct CommandLog(Arc<Mutex<Vec<DeviceCommand>>>);

impl CommandLog {
    /// Copy of every recorded command in arrival order.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Command kinds in arrival order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(DeviceCommand::kind)
            .collect()
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Return `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, cmd: DeviceCommand) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cmd);
    }
}

/// In-memory link that acknowledges everything, optionally failing one command.
///
/// Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingLink {
    log: CommandLog,
    fail_at: Option<(usize, fn() -> TransferError)>,
}

impl RecordingLink {
    /// Link that acknowledges every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th received command (0-based, probes included) with `err()`.
    pub fn failing_at(mut self, n: usize, err: fn() -> TransferError) -> Self {
        self.fail_at = Some((n, err));
        self
    }

    /// Handle on the command record; stays valid after the link is moved.
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl DeviceLink for RecordingLink {
    fn send(&mut self, cmd: &DeviceCommand) -> Result<Ack, TransferError> {
        let seen = self.log.len();
        self.log.push(cmd.clone());
        match self.fail_at {
            Some((n, err)) if n == seen => Err(err()),
            _ => Ok(Ack::ok()),
        }
    }
}
