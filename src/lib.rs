//! Cadence Agent - Diurnal interaction driver for remote Android devices.
//!
//! This library drives a device over adb through humanlike daily rhythms:
//! a schedule of morning, afternoon and bedtime windows is drawn each day
//! from a school profile, and when a window comes due the scheduler runs a
//! bounded interaction session that captures frames, classifies them, and
//! clicks or scrolls with heavy-tailed pauses in between.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Cadence Agent                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌────────────┐    ┌──────────────┐        │
//! │  │  Schedule  │───▶│ Scheduler  │───▶│   Session    │        │
//! │  │ (3 windows)│    │  (poll)    │    │ (cycle loop) │        │
//! │  └────────────┘    └────────────┘    └──────┬───────┘        │
//! │                          │                  │                │
//! │                          ▼                  ▼                │
//! │  ┌────────────┐    ┌────────────┐    ┌──────────────┐        │
//! │  │ Keep-alive │    │   Device   │◀───│   Decision   │        │
//! │  │   (ping)   │───▶│   (adb)    │    │ (labels/cnt) │        │
//! │  └────────────┘    └────────────┘    └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cadence_agent::agent::Agent;
//! use cadence_agent::config::Config;
//! use cadence_agent::device::{AdbDevice, AdbTransport};
//! use cadence_agent::vision::{AdbFrameSource, NoopClassifier};
//! use std::sync::Arc;
//!
//! let config = Config::load().unwrap_or_default();
//! let transport = AdbTransport::new(config.adb_path.clone(), config.device_serial.clone());
//! let device = Arc::new(AdbDevice::new(transport.clone()));
//! let frames = Arc::new(AdbFrameSource::new(transport));
//! let classifier = Arc::new(NoopClassifier);
//!
//! let agent = Agent::new(&config, device, frames, classifier).expect("agent init");
//! agent.start().expect("agent start");
//! ```

pub mod agent;
pub mod config;
pub mod counts;
pub mod decision;
pub mod device;
pub mod sampling;
pub mod schedule;
pub mod scheduler;
pub mod session;
pub mod vision;

// Re-export key types at crate root for convenience
pub use agent::{shutdown_channel, Agent, AgentError, RunState, Shutdown};
pub use config::{Config, ConfigError};
pub use counts::{LabelCounterStore, LabelCounts, PersistenceError};
pub use decision::{Decision, DecisionEngine, LabelSet, DEFAULT_THRESHOLD};
pub use device::{AdbDevice, AdbTransport, DeviceControl, DeviceError, NoopDevice, UnlockMethod};
pub use schedule::{DaySchedule, SchoolProfile, WindowKind};
pub use session::{InteractionSession, SessionConfig, SessionOutcome, SessionReport, SessionSlot};
pub use vision::{AdbFrameSource, Classifier, CommandClassifier, Frame, FrameSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
