//! Lifecycle coordination.
//!
//! The [`Agent`] owns every long-running loop: it starts the scheduler and
//! keep-alive threads, holds their handles, and on stop propagates a single
//! cancellation signal that every loop (and any in-flight session) observes
//! at its next suspension point. Shutdown waits a bounded grace period for
//! the threads to exit, then detaches stragglers with a warning rather than
//! hanging forever.
//!
//! Cancellation is a dropped channel sender: every loop sleeps in
//! `recv_timeout` on a clone of the receiver, so dropping the sender wakes
//! all of them at once. [`RunState`] is the externally visible
//! running/stopped flag and transitions only here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError};
use crate::counts::LabelCounterStore;
use crate::decision::{DecisionEngine, LabelSet};
use crate::device::{DeviceControl, UnlockMethod};
use crate::scheduler::{keep_alive_loop, Scheduler};
use crate::schedule::SchoolProfile;
use crate::session::SessionSlot;
use crate::vision::{Classifier, FrameSource};

/// Poll cadence while waiting for loops to observe the stop signal.
const JOIN_POLL: Duration = Duration::from_millis(25);

/// Process-wide running/stopped flag.
///
/// The single source of truth for whether loops should continue; it
/// transitions only through the coordinator, together with the cancellation
/// channel that actually wakes the loops.
#[derive(Clone)]
pub struct RunState {
    running: Arc<AtomicBool>,
}

impl RunState {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

/// Receiving side of the cancellation signal.
///
/// Cancellation is edge-free: once the paired sender is dropped, every call
/// observes it immediately and forever.
#[derive(Clone)]
pub struct Shutdown {
    receiver: Receiver<()>,
}

impl Shutdown {
    /// Non-blocking cancellation check, used at cycle boundaries.
    pub fn is_cancelled(&self) -> bool {
        !matches!(
            self.receiver.try_recv(),
            Err(crossbeam_channel::TryRecvError::Empty)
        )
    }

    /// Sleep for up to `timeout`, returning `true` if cancellation arrived.
    ///
    /// This doubles as the cancellable sleep every loop uses, which bounds
    /// shutdown latency to one poll interval or one in-flight action.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(self.receiver.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}

/// Create a cancellation pair. Dropping the sender cancels every clone of
/// the returned [`Shutdown`].
pub fn shutdown_channel() -> (Sender<()>, Shutdown) {
    let (sender, receiver) = bounded(0);
    (sender, Shutdown { receiver })
}

/// Coordinator errors.
#[derive(Debug)]
pub enum AgentError {
    AlreadyRunning,
    Spawn(String),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::AlreadyRunning => write!(f, "agent is already running"),
            AgentError::Spawn(e) => write!(f, "could not spawn loop thread: {e}"),
        }
    }
}

impl std::error::Error for AgentError {}

struct Running {
    shutdown_tx: Sender<()>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

/// Owns start/stop of all loops and the resources they share.
pub struct Agent {
    profile: SchoolProfile,
    unlock: UnlockMethod,
    timezone: Option<Tz>,
    poll_interval: Duration,
    keepalive_interval: Duration,
    tolerance: chrono::Duration,
    shutdown_grace: Duration,
    device: Arc<dyn DeviceControl>,
    frames: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    engine: Arc<DecisionEngine>,
    counts: Arc<LabelCounterStore>,
    slot: SessionSlot,
    run_state: RunState,
    inner: Mutex<Option<Running>>,
}

impl Agent {
    /// Build an agent from configuration and the external collaborators.
    ///
    /// Loads previously persisted label counts as the store's initial value.
    pub fn new(
        config: &Config,
        device: Arc<dyn DeviceControl>,
        frames: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, ConfigError> {
        let timezone = config.effective_timezone()?;
        let counts = Arc::new(LabelCounterStore::with_persistence(config.counts_path()));
        let labels = match &config.labels {
            Some(labels) => LabelSet::new(labels.clone()),
            None => LabelSet::default(),
        };
        let engine = Arc::new(DecisionEngine::new(
            labels,
            config.threshold,
            counts.clone(),
        ));

        Ok(Self {
            profile: config.profile,
            unlock: config.unlock.clone(),
            timezone,
            poll_interval: config.poll_interval,
            keepalive_interval: config.keepalive_interval,
            tolerance: chrono::Duration::minutes(config.tolerance_minutes as i64),
            shutdown_grace: config.shutdown_grace,
            device,
            frames,
            classifier,
            engine,
            counts,
            slot: SessionSlot::new(),
            run_state: RunState::new(),
            inner: Mutex::new(None),
        })
    }

    pub fn run_state(&self) -> RunState {
        self.run_state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    /// Whether an interaction session is currently active.
    pub fn session_active(&self) -> bool {
        self.slot.is_active()
    }

    pub fn counts(&self) -> &Arc<LabelCounterStore> {
        &self.counts
    }

    /// Start the scheduler and keep-alive loops.
    pub fn start(&self) -> Result<(), AgentError> {
        let mut inner = self.lock_inner();
        if inner.is_some() {
            return Err(AgentError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown) = shutdown_channel();

        let scheduler = Scheduler {
            profile: self.profile,
            unlock: self.unlock.clone(),
            timezone: self.timezone,
            poll_interval: self.poll_interval,
            tolerance: self.tolerance,
            initial_schedule: None,
            session_override: None,
            device: self.device.clone(),
            frames: self.frames.clone(),
            classifier: self.classifier.clone(),
            engine: self.engine.clone(),
            counts: self.counts.clone(),
            slot: self.slot.clone(),
            shutdown: shutdown.clone(),
        };
        let scheduler_handle = thread::Builder::new()
            .name("cadence-scheduler".to_string())
            .spawn(move || scheduler.run())
            .map_err(|e| AgentError::Spawn(e.to_string()))?;

        let device = self.device.clone();
        let interval = self.keepalive_interval;
        let keepalive_handle = match thread::Builder::new()
            .name("cadence-keepalive".to_string())
            .spawn(move || keep_alive_loop(device, interval, shutdown))
        {
            Ok(handle) => handle,
            Err(e) => {
                // Dropping the sender lets the scheduler thread exit on its
                // next poll.
                drop(shutdown_tx);
                return Err(AgentError::Spawn(e.to_string()));
            }
        };

        self.run_state.set_running(true);
        *inner = Some(Running {
            shutdown_tx,
            handles: vec![
                ("scheduler", scheduler_handle),
                ("keep-alive", keepalive_handle),
            ],
        });

        info!(profile = %self.profile, "agent started");
        Ok(())
    }

    /// Stop all loops and any active session.
    ///
    /// Idempotent and safe to call from a different control path than
    /// `start()` (the signal handler does). Returns once every loop has
    /// exited or the grace period has elapsed.
    pub fn stop(&self) {
        let running = self.lock_inner().take();
        let Some(running) = running else {
            debug!("stop called while not running");
            return;
        };

        info!("stopping agent");
        self.run_state.set_running(false);

        // Wake every recv_timeout at once.
        drop(running.shutdown_tx);

        let deadline = Instant::now() + self.shutdown_grace;
        for (name, handle) in running.handles {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!(loop_name = name, "loop thread panicked");
                }
            } else {
                warn!(loop_name = name, "loop did not exit within grace period, detaching");
            }
        }

        if let Err(e) = self.counts.flush() {
            warn!("final count flush failed: {e}");
        }
        info!("agent stopped");
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_channel_signals_all_clones() {
        let (tx, shutdown) = shutdown_channel();
        let other = shutdown.clone();

        assert!(!shutdown.is_cancelled());
        assert!(!shutdown.wait(Duration::from_millis(5)));

        drop(tx);
        assert!(shutdown.is_cancelled());
        assert!(other.is_cancelled());
        // Cancellation is sticky.
        assert!(shutdown.wait(Duration::from_millis(5)));
        assert!(shutdown.is_cancelled());
    }

    #[test]
    fn test_run_state_transitions() {
        let state = RunState::new();
        assert!(!state.is_running());
        state.set_running(true);
        assert!(state.is_running());
        state.set_running(false);
        assert!(!state.is_running());
    }
}
