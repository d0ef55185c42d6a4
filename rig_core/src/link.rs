//! Device link shared between the poller and the controller.

use rig_traits::{BoxError, ConnectionStatus, DeviceCommand, DeviceLink, Measurement};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serializes access to one device link. Clones refer to the same device.
pub struct SharedLink<L> {
    inner: Arc<Mutex<L>>,
}

impl<L> Clone for SharedLink<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: DeviceLink> SharedLink<L> {
    pub fn new(link: L) -> Self {
        Self {
            inner: Arc::new(Mutex::new(link)),
        }
    }
}

impl<L: DeviceLink> DeviceLink for SharedLink<L> {
    fn read_sensors(&mut self, timeout: Duration) -> Result<Measurement, BoxError> {
        let mut link = self
            .inner
            .lock()
            .map_err(|_| BoxError::from("device link lock poisoned"))?;
        link.read_sensors(timeout)
    }

    fn send_command(&mut self, cmd: DeviceCommand, timeout: Duration) -> Result<(), BoxError> {
        let mut link = self
            .inner
            .lock()
            .map_err(|_| BoxError::from("device link lock poisoned"))?;
        link.send_command(cmd, timeout)
    }

    fn check_connection(&mut self) -> ConnectionStatus {
        match self.inner.lock() {
            Ok(mut link) => link.check_connection(),
            Err(_) => ConnectionStatus { connected: false },
        }
    }
}
