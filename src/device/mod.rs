//! Device-control boundary.
//!
//! Everything the core needs from the controlled device goes through the
//! [`DeviceControl`] trait: unlock gestures, screen geometry, click/scroll
//! primitives, screen power, and a keep-alive ping. The concrete transport is
//! ADB ([`AdbDevice`]); a recording no-op implementation ([`NoopDevice`])
//! backs dry runs and tests.

pub mod adb;
pub mod noop;
pub mod types;

use std::time::Duration;

pub use adb::{AdbDevice, AdbTransport};
pub use noop::{DeviceAction, NoopDevice};
pub use types::{Point, Region, ScreenSize, UnlockMethod};

/// Errors from the device-control channel.
///
/// All variants are transport-level: the channel was unreachable, the tool
/// was missing, or the device rejected a command.
#[derive(Debug)]
pub enum DeviceError {
    /// The control tool (adb) was not found on the host.
    ToolMissing(String),
    /// The command could not be executed or timed out.
    Transport(String),
    /// The command ran but the device reported a failure.
    CommandFailed { command: String, detail: String },
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::ToolMissing(tool) => write!(f, "control tool not found: {tool}"),
            DeviceError::Transport(msg) => write!(f, "device transport error: {msg}"),
            DeviceError::CommandFailed { command, detail } => {
                write!(f, "device command '{command}' failed: {detail}")
            }
        }
    }
}

impl std::error::Error for DeviceError {}

/// Low-level control operations on the target device.
///
/// Failure semantics are decided by the caller: sessions treat `unlock`,
/// `click`, and `scroll` failures as fatal to the current session, while
/// `ping` and `screen_off` failures are logged and tolerated.
pub trait DeviceControl: Send + Sync {
    /// Wake and unlock the device using the configured method.
    fn unlock(&self, method: &UnlockMethod) -> Result<(), DeviceError>;

    /// Query the physical screen size.
    fn screen_size(&self) -> Result<ScreenSize, DeviceError>;

    /// Tap at a point in screen coordinates.
    fn click(&self, point: Point) -> Result<(), DeviceError>;

    /// Swipe from one point to another over the given duration.
    fn scroll(&self, from: Point, to: Point, duration: Duration) -> Result<(), DeviceError>;

    /// Turn the screen off.
    fn screen_off(&self) -> Result<(), DeviceError>;

    /// Lightweight no-op query that keeps the control channel alive.
    fn ping(&self) -> Result<(), DeviceError>;
}
