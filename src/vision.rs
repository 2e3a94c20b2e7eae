//! Perception boundary: frame capture and content classification.
//!
//! The core only ever sees two contracts. [`FrameSource`] produces one
//! encoded frame per engagement cycle; [`Classifier`] scores a frame against
//! an ordered label set, returning one confidence in [0, 1] per label. The
//! model itself lives outside this crate; the concrete classifier shells
//! out to a configured command, keeping the heavy dependency out of the
//! agent process.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;
use uuid::Uuid;

use crate::decision::LabelSet;
use crate::device::{AdbTransport, DeviceError};

/// One captured frame, as encoded PNG bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub png: Vec<u8>,
}

impl Frame {
    pub fn new(png: Vec<u8>) -> Self {
        Self { png }
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

/// Capture failures. Sessions log these and retry on the next cycle.
#[derive(Debug)]
pub enum CaptureError {
    /// The mirror surface / device screen could not be found.
    SurfaceNotFound(String),
    /// The capture channel failed.
    Transport(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::SurfaceNotFound(msg) => write!(f, "capture surface not found: {msg}"),
            CaptureError::Transport(msg) => write!(f, "capture transport error: {msg}"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Classifier failures. Sessions degrade these to "no label matched".
#[derive(Debug)]
pub enum ClassifierError {
    /// The classifier could not be invoked.
    Invocation(String),
    /// The classifier ran but produced unusable output.
    BadOutput(String),
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::Invocation(msg) => write!(f, "classifier invocation failed: {msg}"),
            ClassifierError::BadOutput(msg) => write!(f, "classifier output invalid: {msg}"),
        }
    }
}

impl std::error::Error for ClassifierError {}

/// Source of frames from the controlled device.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<Frame, CaptureError>;
}

/// Content classifier contract: one score per requested label, in order.
///
/// Pure from the core's perspective; no side effects.
pub trait Classifier: Send + Sync {
    fn classify(&self, frame: &Frame, labels: &LabelSet) -> Result<Vec<f64>, ClassifierError>;
}

/// Frame source reading the device screen over ADB (`screencap -p`).
pub struct AdbFrameSource {
    transport: AdbTransport,
}

impl AdbFrameSource {
    pub fn new(transport: AdbTransport) -> Self {
        Self { transport }
    }
}

impl FrameSource for AdbFrameSource {
    fn capture(&self) -> Result<Frame, CaptureError> {
        let png = self
            .transport
            .run_raw(&["exec-out", "screencap", "-p"])
            .map_err(|e| match e {
                DeviceError::CommandFailed { detail, .. } => CaptureError::SurfaceNotFound(detail),
                other => CaptureError::Transport(other.to_string()),
            })?;

        // A handful of bytes cannot be a screen; treat it as the surface
        // being gone rather than a valid frame.
        if png.len() < 8 {
            return Err(CaptureError::SurfaceNotFound(format!(
                "screencap returned {} bytes",
                png.len()
            )));
        }

        debug!(bytes = png.len(), "captured frame");
        Ok(Frame::new(png))
    }
}

/// Classifier that shells out to an external command.
///
/// The frame is written to a temporary PNG whose path is appended to the
/// configured argument list, followed by the labels. The command must print
/// JSON on stdout: either an array of scores in label order or an object
/// mapping label to score (missing labels read as 0.0).
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a config-style command line (program followed by args).
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    fn frame_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("cadence-frame-{}.png", Uuid::new_v4()))
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, frame: &Frame, labels: &LabelSet) -> Result<Vec<f64>, ClassifierError> {
        let frame_path = self.frame_path();
        std::fs::write(&frame_path, &frame.png)
            .map_err(|e| ClassifierError::Invocation(format!("writing frame: {e}")))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&frame_path)
            .args(labels.as_slice())
            .output();

        let _ = std::fs::remove_file(&frame_path);

        let output = output.map_err(|e| ClassifierError::Invocation(e.to_string()))?;
        if !output.status.success() {
            return Err(ClassifierError::Invocation(format!(
                "classifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_scores(labels, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse classifier stdout into one score per label, in label order.
fn parse_scores(labels: &LabelSet, stdout: &str) -> Result<Vec<f64>, ClassifierError> {
    let value: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| ClassifierError::BadOutput(e.to_string()))?;

    let scores = match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0))
            .collect::<Vec<f64>>(),
        serde_json::Value::Object(map) => labels
            .as_slice()
            .iter()
            .map(|label| map.get(label).and_then(|v| v.as_f64()).unwrap_or(0.0))
            .collect(),
        other => {
            return Err(ClassifierError::BadOutput(format!(
                "expected JSON array or object, got {other}"
            )))
        }
    };

    if scores.len() != labels.len() {
        return Err(ClassifierError::BadOutput(format!(
            "expected {} scores, got {}",
            labels.len(),
            scores.len()
        )));
    }
    Ok(scores)
}

/// Frame source for dry runs: an empty frame every cycle.
pub struct NoopFrameSource;

impl FrameSource for NoopFrameSource {
    fn capture(&self) -> Result<Frame, CaptureError> {
        Ok(Frame::new(Vec::new()))
    }
}

/// Classifier for dry runs: nothing ever matches, so sessions only scroll.
pub struct NoopClassifier;

impl Classifier for NoopClassifier {
    fn classify(&self, _frame: &Frame, labels: &LabelSet) -> Result<Vec<f64>, ClassifierError> {
        Ok(vec![0.0; labels.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_set(labels: &[&str]) -> LabelSet {
        LabelSet::new(labels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_scores_array() {
        let labels = label_set(&["love", "judo"]);
        let scores = parse_scores(&labels, "[0.8, 0.1]").unwrap();
        assert_eq!(scores, vec![0.8, 0.1]);
    }

    #[test]
    fn test_parse_scores_object_fills_missing_with_zero() {
        let labels = label_set(&["love", "judo", "pcb"]);
        let scores = parse_scores(&labels, r#"{"judo": 0.4, "love": 0.9}"#).unwrap();
        assert_eq!(scores, vec![0.9, 0.4, 0.0]);
    }

    #[test]
    fn test_parse_scores_rejects_wrong_arity() {
        let labels = label_set(&["love", "judo"]);
        assert!(parse_scores(&labels, "[0.8]").is_err());
    }

    #[test]
    fn test_parse_scores_rejects_non_json() {
        let labels = label_set(&["love"]);
        assert!(parse_scores(&labels, "not json").is_err());
        assert!(parse_scores(&labels, "0.5").is_err());
    }

    #[test]
    fn test_noop_classifier_scores_zero() {
        let labels = label_set(&["love", "judo"]);
        let frame = NoopFrameSource.capture().unwrap();
        let scores = NoopClassifier.classify(&frame, &labels).unwrap();
        assert_eq!(scores, vec![0.0, 0.0]);
    }
}
