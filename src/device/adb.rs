//! ADB implementation of the device-control channel.
//!
//! Every operation shells out to the `adb` binary. Gestures use
//! `input keyevent/tap/swipe/text`; geometry comes from `wm size`; the
//! keep-alive ping is `adb devices`, the cheapest command that still touches
//! the server connection.

use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::types::{Point, ScreenSize, UnlockMethod};
use super::{DeviceControl, DeviceError};

// Android keyevent codes used by the unlock sequence.
const KEYCODE_POWER: &str = "26";
const KEYCODE_MENU: &str = "82";
const KEYCODE_ENTER: &str = "66";

/// Shared runner for `adb` invocations.
///
/// Cloned by every component that talks over the same channel (device
/// control and the screencap frame source), so serial selection and the
/// binary path are configured once.
#[derive(Debug, Clone)]
pub struct AdbTransport {
    adb_path: PathBuf,
    serial: Option<String>,
}

impl AdbTransport {
    pub fn new(adb_path: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
        }
    }

    /// Run an adb command and return its stdout as UTF-8 text.
    pub fn run(&self, args: &[&str]) -> Result<String, DeviceError> {
        let raw = self.run_raw(args)?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Run an adb command and return its raw stdout bytes.
    pub fn run_raw(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let mut command = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            command.arg("-s").arg(serial);
        }
        command.args(args);

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeviceError::ToolMissing(self.adb_path.display().to_string())
            } else {
                DeviceError::Transport(e.to_string())
            }
        })?;

        if !output.status.success() {
            return Err(DeviceError::CommandFailed {
                command: format!("adb {}", args.join(" ")),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(command = args.join(" "), "adb command ok");
        Ok(output.stdout)
    }

    fn shell_input(&self, args: &[&str]) -> Result<(), DeviceError> {
        let mut full = vec!["shell", "input"];
        full.extend_from_slice(args);
        self.run(&full).map(|_| ())
    }
}

/// ADB-backed device control.
pub struct AdbDevice {
    transport: AdbTransport,
}

impl AdbDevice {
    pub fn new(transport: AdbTransport) -> Self {
        Self { transport }
    }

    /// Access the underlying transport, e.g. to build a frame source on the
    /// same channel.
    pub fn transport(&self) -> &AdbTransport {
        &self.transport
    }

    fn wake(&self) -> Result<(), DeviceError> {
        self.transport.shell_input(&["keyevent", KEYCODE_POWER])?;
        thread::sleep(Duration::from_secs(1));
        self.transport.shell_input(&["keyevent", KEYCODE_MENU])?;
        thread::sleep(Duration::from_secs(1));
        Ok(())
    }

    fn swipe_up(&self) -> Result<(), DeviceError> {
        // Generic bottom-to-middle swipe that dismisses the lock screen.
        self.transport
            .shell_input(&["swipe", "300", "1000", "300", "500", "100"])?;
        thread::sleep(Duration::from_secs(1));
        Ok(())
    }

    fn enter_pin(&self, pin: &str) -> Result<(), DeviceError> {
        self.transport.shell_input(&["text", pin])?;
        thread::sleep(Duration::from_millis(500));
        self.transport.shell_input(&["keyevent", KEYCODE_ENTER])?;
        thread::sleep(Duration::from_millis(500));
        Ok(())
    }
}

impl DeviceControl for AdbDevice {
    fn unlock(&self, method: &UnlockMethod) -> Result<(), DeviceError> {
        debug!(?method, "unlocking device");
        self.wake()?;
        self.swipe_up()?;
        if let UnlockMethod::Pin(pin) = method {
            self.enter_pin(pin)?;
        }
        // Let the launcher settle before the first interaction.
        thread::sleep(Duration::from_secs(2));
        Ok(())
    }

    fn screen_size(&self) -> Result<ScreenSize, DeviceError> {
        let output = self.transport.run(&["shell", "wm", "size"])?;
        match parse_wm_size(&output) {
            Some(size) => Ok(size),
            None => {
                warn!(output, "could not parse screen size, using default");
                Ok(ScreenSize::default())
            }
        }
    }

    fn click(&self, point: Point) -> Result<(), DeviceError> {
        self.transport
            .shell_input(&["tap", &point.x.to_string(), &point.y.to_string()])
    }

    fn scroll(&self, from: Point, to: Point, duration: Duration) -> Result<(), DeviceError> {
        self.transport.shell_input(&[
            "swipe",
            &from.x.to_string(),
            &from.y.to_string(),
            &to.x.to_string(),
            &to.y.to_string(),
            &duration.as_millis().to_string(),
        ])
    }

    fn screen_off(&self) -> Result<(), DeviceError> {
        self.transport.shell_input(&["keyevent", KEYCODE_POWER])
    }

    fn ping(&self) -> Result<(), DeviceError> {
        self.transport.run(&["devices"]).map(|_| ())
    }
}

/// Parse the `Physical size: WxH` line printed by `wm size`.
fn parse_wm_size(output: &str) -> Option<ScreenSize> {
    let size_str = output.split("Physical size:").nth(1)?.trim();
    let size_str = size_str.lines().next()?.trim();
    let (w, h) = size_str.split_once('x')?;
    Some(ScreenSize::new(
        w.trim().parse().ok()?,
        h.trim().parse().ok()?,
    ))
}
