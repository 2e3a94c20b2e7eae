//! Interaction sessions.
//!
//! One session is a bounded burst of simulated engagement:
//! `Unlocking → Engaging → WindingDown → Done`. While engaging, every cycle
//! runs capture → classify → decide → act → pause, strictly in that order,
//! and checks for cancellation only at cycle boundaries, never in the
//! middle of a device action.
//!
//! At most one session exists outside `Done` at any time. That invariant is
//! carried by [`SessionSlot`], an atomic check-and-set whose permit releases
//! on drop, so a panicking session thread still frees the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Shutdown;
use crate::counts::LabelCounterStore;
use crate::decision::DecisionEngine;
use crate::device::{DeviceControl, DeviceError, UnlockMethod};
use crate::sampling::{self, PauseBounds};
use crate::schedule::WindowKind;
use crate::vision::{Classifier, FrameSource};

/// Delay between the two taps of an acted decision.
const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(100);

/// Pause before retrying after a failed capture.
const CAPTURE_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unlocking,
    Engaging,
    WindingDown,
    Done,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Ran for its full sampled duration.
    Completed,
    /// Observed the stop signal at a cycle boundary.
    Cancelled,
    /// A fatal device action failed.
    Aborted(String),
}

/// Immutable per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub window: WindowKind,
    pub unlock: UnlockMethod,
    pub duration_min: Duration,
    pub duration_max: Duration,
    pub pause: PauseBounds,
}

impl SessionConfig {
    /// Configuration for a scheduled window, with that window kind's
    /// duration bounds.
    pub fn for_window(window: WindowKind, unlock: UnlockMethod) -> Self {
        let (min, max) = window.session_minutes();
        Self {
            window,
            unlock,
            duration_min: Duration::from_secs(min * 60),
            duration_max: Duration::from_secs(max * 60),
            pause: PauseBounds::default(),
        }
    }
}

/// Summary emitted when a session reaches `Done`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub window: WindowKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub cycles: u64,
    pub clicks: u64,
    pub scrolls: u64,
    pub outcome: SessionOutcome,
}

/// One bounded-duration engagement period against the device.
pub struct InteractionSession {
    device: Arc<dyn DeviceControl>,
    frames: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    engine: Arc<DecisionEngine>,
    counts: Arc<LabelCounterStore>,
    config: SessionConfig,
    shutdown: Shutdown,
    state: SessionState,
}

impl InteractionSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Arc<dyn DeviceControl>,
        frames: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        engine: Arc<DecisionEngine>,
        counts: Arc<LabelCounterStore>,
        config: SessionConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            device,
            frames,
            classifier,
            engine,
            counts,
            config,
            shutdown,
            state: SessionState::Unlocking,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// Never panics on collaborator errors: every failure mode folds into
    /// the returned report's outcome.
    pub fn run<R: Rng + ?Sized>(mut self, rng: &mut R) -> SessionReport {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut cycles: u64 = 0;
        let mut clicks: u64 = 0;
        let mut scrolls: u64 = 0;

        info!(session = %id, window = %self.config.window, "session starting");

        let outcome = match self.unlock() {
            Err(e) => {
                // Unlock failed: never enter Engaging, report and finish.
                warn!(session = %id, "unlock failed: {e}");
                self.state = SessionState::Done;
                SessionOutcome::Aborted(format!("unlock failed: {e}"))
            }
            Ok(screen) => {
                self.state = SessionState::Engaging;
                let duration = sampling::sample_session_duration(
                    rng,
                    self.config.duration_min,
                    self.config.duration_max,
                );
                info!(
                    session = %id,
                    minutes = duration.as_secs() / 60,
                    "engaging for sampled duration"
                );

                let outcome = self.engage(rng, screen, duration, &mut cycles, &mut clicks, &mut scrolls);

                self.state = SessionState::WindingDown;
                self.wind_down(id);
                outcome
            }
        };

        self.state = SessionState::Done;
        let report = SessionReport {
            id,
            window: self.config.window,
            started_at,
            ended_at: Utc::now(),
            cycles,
            clicks,
            scrolls,
            outcome,
        };
        info!(
            session = %report.id,
            cycles = report.cycles,
            clicks = report.clicks,
            scrolls = report.scrolls,
            outcome = ?report.outcome,
            "session done"
        );
        report
    }

    /// Unlock the device and learn its screen geometry.
    fn unlock(&self) -> Result<crate::device::ScreenSize, DeviceError> {
        let screen = self.device.screen_size()?;
        self.device.unlock(&self.config.unlock)?;
        Ok(screen)
    }

    /// The capture → classify → decide → act → pause loop.
    fn engage<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        screen: crate::device::ScreenSize,
        duration: Duration,
        cycles: &mut u64,
        clicks: &mut u64,
        scrolls: &mut u64,
    ) -> SessionOutcome {
        let deadline = Instant::now() + duration;

        loop {
            if self.shutdown.is_cancelled() {
                return SessionOutcome::Cancelled;
            }
            if Instant::now() >= deadline {
                return SessionOutcome::Completed;
            }

            *cycles += 1;

            let frame = match self.frames.capture() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("capture failed, retrying next cycle: {e}");
                    if self.shutdown.wait(CAPTURE_RETRY_PAUSE) {
                        return SessionOutcome::Cancelled;
                    }
                    continue;
                }
            };

            let scores = match self.classifier.classify(&frame, self.engine.labels()) {
                Ok(scores) => scores,
                Err(e) => {
                    // Safe default: nothing matched this cycle.
                    warn!("classifier failed, treating as no match: {e}");
                    vec![0.0; self.engine.labels().len()]
                }
            };

            let decision = self.engine.decide(&scores, screen, rng);
            let action = if let (true, Some(point)) = (decision.act, decision.point) {
                *clicks += 1;
                self.device.click(point).and_then(|_| {
                    std::thread::sleep(DOUBLE_CLICK_GAP);
                    self.device.click(point)
                })
            } else {
                let (from, to, swipe) = sampling::sample_scroll(rng, screen);
                *scrolls += 1;
                self.device.scroll(from, to, swipe)
            };

            if let Err(e) = action {
                return SessionOutcome::Aborted(format!("device action failed: {e}"));
            }

            let pause = sampling::sample_pause(rng, &self.config.pause, decision.extend_pause);
            if self.shutdown.wait(pause) {
                return SessionOutcome::Cancelled;
            }
        }
    }

    /// Best-effort teardown: screen off, flush counters.
    fn wind_down(&self, id: Uuid) {
        if let Err(e) = self.device.screen_off() {
            warn!(session = %id, "screen off failed: {e}");
        }
        if let Err(e) = self.counts.flush() {
            warn!(session = %id, "count flush failed, retaining in memory: {e}");
        }
    }
}

/// Guard enforcing the at-most-one-session invariant.
///
/// `try_acquire` atomically claims the slot; the returned permit releases it
/// when dropped, including on unwind.
#[derive(Clone)]
pub struct SessionSlot {
    active: Arc<AtomicBool>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the slot if no session holds it.
    pub fn try_acquire(&self) -> Option<SessionPermit> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SessionPermit {
                active: self.active.clone(),
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of slot ownership for one running session.
pub struct SessionPermit {
    active: Arc<AtomicBool>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_single_acquire() {
        let slot = SessionSlot::new();
        assert!(!slot.is_active());

        let permit = slot.try_acquire();
        assert!(permit.is_some());
        assert!(slot.is_active());
        assert!(slot.try_acquire().is_none());

        drop(permit);
        assert!(!slot.is_active());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn test_slot_race_single_winner() {
        let slot = SessionSlot::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let slot = slot.clone();
            // Return the permit itself so losers cannot sneak in after an
            // early winner drops.
            handles.push(std::thread::spawn(move || slot.try_acquire()));
        }

        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().ok().flatten())
            .collect();
        assert_eq!(permits.len(), 1, "exactly one contender may win the slot");
    }

    #[test]
    fn test_session_config_for_window() {
        let config = SessionConfig::for_window(WindowKind::Afternoon, UnlockMethod::Swipe);
        assert_eq!(config.duration_min, Duration::from_secs(160 * 60));
        assert_eq!(config.duration_max, Duration::from_secs(180 * 60));
    }
}
