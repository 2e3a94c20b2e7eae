//! Recording no-op implementation of the device-control channel.
//!
//! Accepts every command, touches no hardware, and keeps an in-memory log of
//! the actions it received. Backs `--dry-run` and the integration tests.

use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use super::types::{Point, ScreenSize, UnlockMethod};
use super::{DeviceControl, DeviceError};

/// One recorded device action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    Unlock,
    Click(Point),
    Scroll {
        from: Point,
        to: Point,
        duration: Duration,
    },
    ScreenOff,
    Ping,
}

/// A device that accepts everything and records what it was asked to do.
pub struct NoopDevice {
    screen: ScreenSize,
    actions: Mutex<Vec<DeviceAction>>,
}

impl NoopDevice {
    pub fn new() -> Self {
        Self::with_screen(ScreenSize::default())
    }

    pub fn with_screen(screen: ScreenSize) -> Self {
        Self {
            screen,
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of all actions received so far.
    pub fn actions(&self) -> Vec<DeviceAction> {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, action: DeviceAction) {
        debug!(?action, "noop device action");
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }
}

impl Default for NoopDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceControl for NoopDevice {
    fn unlock(&self, _method: &UnlockMethod) -> Result<(), DeviceError> {
        self.record(DeviceAction::Unlock);
        Ok(())
    }

    fn screen_size(&self) -> Result<ScreenSize, DeviceError> {
        Ok(self.screen)
    }

    fn click(&self, point: Point) -> Result<(), DeviceError> {
        self.record(DeviceAction::Click(point));
        Ok(())
    }

    fn scroll(&self, from: Point, to: Point, duration: Duration) -> Result<(), DeviceError> {
        self.record(DeviceAction::Scroll { from, to, duration });
        Ok(())
    }

    fn screen_off(&self) -> Result<(), DeviceError> {
        self.record(DeviceAction::ScreenOff);
        Ok(())
    }

    fn ping(&self) -> Result<(), DeviceError> {
        self.record(DeviceAction::Ping);
        Ok(())
    }
}
