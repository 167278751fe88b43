use std::sync::{Mutex, MutexGuard};

use crate::{
    device::command::{Ack, DeviceCommand},
    foundation::error::TransferError,
};

/// Transport carrying one command at a time to the panel.
pub trait DeviceLink: Send {
    /// Send `cmd` and wait for its acknowledgment.
    fn send(&mut self, cmd: &DeviceCommand) -> Result<Ack, TransferError>;
}

impl<L: DeviceLink + ?Sized> DeviceLink for Box<L> {
    fn send(&mut self, cmd: &DeviceCommand) -> Result<Ack, TransferError> {
        (**self).send(cmd)
    }
}

/// Probed connection to one panel.
///
/// The link sits behind a mutex so at most one transfer is in flight; a second caller blocks in
/// [`DeviceConnection::session`] until the first session is dropped.
pub struct DeviceConnection {
    link: Mutex<Box<dyn DeviceLink>>,
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection").finish_non_exhaustive()
    }
}

impl DeviceConnection {
    /// Probe the device over `link` and keep the link on success.
    #[tracing::instrument(skip_all)]
    pub fn open(link: impl DeviceLink + 'static) -> Result<Self, TransferError> {
        let conn = Self::unprobed(link);
        conn.session()?.send(&DeviceCommand::Probe)?;
        tracing::info!("device answered probe");
        Ok(conn)
    }

    /// Wrap `link` without probing.
    pub fn unprobed(link: impl DeviceLink + 'static) -> Self {
        Self {
            link: Mutex::new(Box::new(link)),
        }
    }

    /// Send a single command under the lock.
    pub fn send(&self, cmd: &DeviceCommand) -> Result<Ack, TransferError> {
        self.session()?.send(cmd)
    }

    /// Block until the link is free and take it exclusively.
    pub fn session(&self) -> Result<DeviceSession<'_>, TransferError> {
        let guard = self.link.lock().map_err(|_| TransferError::Busy)?;
        Ok(DeviceSession { guard })
    }
}

/// Exclusive use of a [`DeviceConnection`]; released on drop.
pub struct DeviceSession<'a> {
    guard: MutexGuard<'a, Box<dyn DeviceLink>>,
}

impl DeviceSession<'_> {
    /// Send `cmd` and wait for its acknowledgment.
    pub fn send(&mut self, cmd: &DeviceCommand) -> Result<Ack, TransferError> {
        tracing::trace!(command = cmd.kind(), "sending device command");
        self.guard.send(cmd)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/connection.rs"]
mod tests;
